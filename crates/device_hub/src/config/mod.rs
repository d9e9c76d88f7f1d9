//! Configuration module for device_hub
//!
//! This module contains:
//! - `timing`: Timeouts for the vendor transports

mod timing;

pub use timing::{
    secs, AdbTimingConfig, GameTimingConfig, TimingConfig, WdaTimingConfig, TIMING_CONFIG,
};

/// Path of the adb binary, overridable for non-standard SDK installs
pub fn adb_path() -> String {
    std::env::var("DEVICE_HUB_ADB_PATH").unwrap_or_else(|_| "adb".to_string())
}
