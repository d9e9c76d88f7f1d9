//! Error types for device operations

use crate::adapter::Capability;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Malformed device id (expected <platform>:<address>): {0:?}")]
    MalformedId(String),

    #[error("{platform} device does not support {capability}")]
    Unsupported {
        platform: &'static str,
        capability: Capability,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
