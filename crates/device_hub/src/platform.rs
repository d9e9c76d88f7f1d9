//! Platform tags and composite device ids

use crate::error::{DeviceError, Result};
use std::fmt;

/// Address used for game targets when none is supplied
pub const DEFAULT_GAME_ADDRESS: &str = "localhost";

/// Kind of device behind an id
///
/// Any tag other than `android` or `ios` selects [`Platform::Game`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Android,
    Ios,
    Game,
}

impl Platform {
    /// Map a raw platform tag to a variant. Never fails.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "android" => Self::Android,
            "ios" => Self::Ios,
            _ => Self::Game,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Game => "game",
        }
    }

    /// Address actually handed to the vendor connector
    pub fn resolve_address<'a>(&self, address: &'a str) -> &'a str {
        match self {
            Self::Game if address.is_empty() => DEFAULT_GAME_ADDRESS,
            _ => address,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Composite cache key `<platform tag>:<address>`
///
/// Built from the raw tag and raw address, so `game:` and `foo:` are distinct
/// ids even though both reach the same game target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(platform_tag: &str, address: &str) -> Self {
        Self(format!("{}:{}", platform_tag, address))
    }

    /// Split on the first `:` only; addresses may contain `:` themselves.
    pub fn parts(&self) -> Result<(&str, &str)> {
        self.0
            .split_once(':')
            .ok_or_else(|| DeviceError::MalformedId(self.0.clone()))
    }

    pub fn platform(&self) -> Result<Platform> {
        self.parts().map(|(tag, _)| Platform::from_tag(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tags_fall_back_to_game() {
        assert_eq!(Platform::from_tag("android"), Platform::Android);
        assert_eq!(Platform::from_tag("ios"), Platform::Ios);
        assert_eq!(Platform::from_tag("neco"), Platform::Game);
        assert_eq!(Platform::from_tag(""), Platform::Game);
        assert_eq!(Platform::from_tag("Android"), Platform::Game);
    }

    #[test]
    fn test_split_on_first_colon() {
        let id = DeviceId::from("totally-unknown-tag:1.2.3.4:5555");
        assert_eq!(id.parts().unwrap(), ("totally-unknown-tag", "1.2.3.4:5555"));
        assert_eq!(id.platform().unwrap(), Platform::Game);
    }

    #[test]
    fn test_empty_address_keeps_platform() {
        let id = DeviceId::from("android:");
        assert_eq!(id.parts().unwrap(), ("android", ""));
        assert_eq!(id.platform().unwrap(), Platform::Android);
    }

    #[test]
    fn test_missing_separator_is_malformed() {
        let err = DeviceId::from("emulator-5554").parts().unwrap_err();
        assert!(matches!(err, DeviceError::MalformedId(ref s) if s == "emulator-5554"));
    }

    #[test]
    fn test_game_default_address() {
        assert_eq!(Platform::Game.resolve_address(""), "localhost");
        assert_eq!(Platform::Game.resolve_address("10.0.0.2"), "10.0.0.2");
        assert_eq!(Platform::Android.resolve_address(""), "");
    }

    #[test]
    fn test_id_is_built_from_raw_parts() {
        assert_eq!(DeviceId::new("game", "").as_str(), "game:");
        assert_eq!(
            DeviceId::new("ios", "http://10.0.0.3:8100").as_str(),
            "ios:http://10.0.0.3:8100"
        );
    }
}
