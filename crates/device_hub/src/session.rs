//! Vendor session interfaces wrapped by the device adapters
//!
//! Each platform has its own session trait because the vendors expose
//! different raw material: uiautomator XML on Android, WebDriverAgent JSON and
//! a display scale on iOS, a ready-made JSON tree on game targets. The
//! [`DeviceConnector`] opens sessions by address.

use crate::error::Result;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt::Debug;

/// Screen size in pixels as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

/// App currently in the foreground
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForegroundApp {
    /// Android package name or iOS bundle id
    pub package: String,
    /// Android activity; iOS has no equivalent
    pub activity: Option<String>,
}

#[async_trait]
pub trait AndroidSession: Debug + Send + Sync {
    async fn screenshot(&self) -> Result<DynamicImage>;

    /// Raw uiautomator XML
    async fn dump_hierarchy(&self) -> Result<String>;

    async fn app_current(&self) -> Result<ForegroundApp>;

    async fn window_size(&self) -> Result<WindowSize>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
pub trait AppleSession: Debug + Send + Sync {
    async fn screenshot(&self) -> Result<DynamicImage>;

    /// WebDriverAgent source tree, rects in points
    async fn source(&self) -> Result<Value>;

    /// Points-to-pixels ratio of the main display
    async fn scale(&self) -> Result<f64>;

    async fn window_size(&self) -> Result<WindowSize>;

    async fn active_app(&self) -> Result<ForegroundApp>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
pub trait GameSession: Debug + Send + Sync {
    async fn screenshot(&self) -> Result<DynamicImage>;

    /// Structured dump produced by the game SDK itself
    async fn dump_hierarchy(&self) -> Result<Value>;

    fn as_any(&self) -> &dyn Any;
}

/// Opens vendor sessions by address
///
/// A failed open must not leave anything behind; the registry only caches
/// adapters whose session opened successfully.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    async fn connect_android(&self, address: &str) -> Result<Box<dyn AndroidSession>>;

    async fn connect_apple(&self, address: &str) -> Result<Box<dyn AppleSession>>;

    async fn connect_game(&self, address: &str) -> Result<Box<dyn GameSession>>;
}
