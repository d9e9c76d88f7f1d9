//! ADB (Android Debug Bridge) transport for Android devices
//!
//! This module provides:
//! - `connection`: adb server interaction (remote connect, device listing)
//! - `device`: the [`AdbDevice`] session used by the Android adapter
//! - `screenshot`: Screenshot capture

mod connection;
mod device;
mod screenshot;

pub use connection::{list_devices, AdbConnection, ConnectionType, DeviceInfo};
pub use device::AdbDevice;
pub use screenshot::capture_screenshot;
