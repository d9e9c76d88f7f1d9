//! Timeouts for vendor transports

use lazy_static::lazy_static;
use std::env;
use std::time::Duration;

fn env_secs(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .unwrap_or(default)
}

/// Timeouts for adb invocations
#[derive(Debug, Clone)]
pub struct AdbTimingConfig {
    pub command_timeout: f64,
    pub connect_timeout: f64,
    pub screenshot_timeout: f64,
}

impl Default for AdbTimingConfig {
    fn default() -> Self {
        Self {
            command_timeout: env_secs("DEVICE_HUB_ADB_COMMAND_TIMEOUT", 10.0),
            connect_timeout: env_secs("DEVICE_HUB_ADB_CONNECT_TIMEOUT", 10.0),
            screenshot_timeout: env_secs("DEVICE_HUB_ADB_SCREENSHOT_TIMEOUT", 10.0),
        }
    }
}

/// Timeouts for WebDriverAgent requests
#[derive(Debug, Clone)]
pub struct WdaTimingConfig {
    pub request_timeout: f64,
    /// `/source` can be slow on deep hierarchies
    pub source_timeout: f64,
}

impl Default for WdaTimingConfig {
    fn default() -> Self {
        Self {
            request_timeout: env_secs("DEVICE_HUB_WDA_REQUEST_TIMEOUT", 15.0),
            source_timeout: env_secs("DEVICE_HUB_WDA_SOURCE_TIMEOUT", 60.0),
        }
    }
}

/// Timeouts for the game SDK RPC socket
#[derive(Debug, Clone)]
pub struct GameTimingConfig {
    pub connect_timeout: f64,
    pub call_timeout: f64,
}

impl Default for GameTimingConfig {
    fn default() -> Self {
        Self {
            connect_timeout: env_secs("DEVICE_HUB_GAME_CONNECT_TIMEOUT", 5.0),
            call_timeout: env_secs("DEVICE_HUB_GAME_CALL_TIMEOUT", 30.0),
        }
    }
}

/// Master timing configuration
#[derive(Debug, Clone, Default)]
pub struct TimingConfig {
    pub adb: AdbTimingConfig,
    pub wda: WdaTimingConfig,
    pub game: GameTimingConfig,
}

lazy_static! {
    /// Global timing configuration instance
    pub static ref TIMING_CONFIG: TimingConfig = TimingConfig::default();
}

/// Convert a seconds value from the config into a `Duration`
///
/// Negative values clamp to zero, values too large for a `Duration` to
/// `Duration::MAX`.
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_secs_fallback() {
        assert_eq!(env_secs("DEVICE_HUB_TEST_UNSET_TIMEOUT", 7.5), 7.5);
    }

    #[test]
    fn test_negative_secs_clamped() {
        assert_eq!(secs(-1.0), Duration::ZERO);
        assert_eq!(secs(1.5), Duration::from_millis(1500));
    }

    #[test]
    fn test_unbounded_secs_saturate() {
        assert_eq!(secs(f64::INFINITY), Duration::MAX);
        assert_eq!(secs(1e300), Duration::MAX);
        assert_eq!(secs(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn test_env_secs_rejects_non_finite() {
        env::set_var("DEVICE_HUB_TEST_INF_TIMEOUT", "inf");
        assert_eq!(env_secs("DEVICE_HUB_TEST_INF_TIMEOUT", 7.5), 7.5);

        env::set_var("DEVICE_HUB_TEST_NEG_TIMEOUT", "-3");
        assert_eq!(env_secs("DEVICE_HUB_TEST_NEG_TIMEOUT", 2.0), 2.0);

        env::set_var("DEVICE_HUB_TEST_OK_TIMEOUT", "0.25");
        assert_eq!(env_secs("DEVICE_HUB_TEST_OK_TIMEOUT", 2.0), 0.25);
    }
}
