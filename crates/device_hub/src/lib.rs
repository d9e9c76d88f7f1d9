//! device_hub: uniform device handles for UI automation
//!
//! This library puts Android devices, iOS devices and game builds behind one
//! adapter type:
//! - ADB for Android devices
//! - WebDriverAgent (XCTest) for iOS devices
//! - An in-game automation SDK's RPC server for game targets
//!
//! Devices are addressed by an id of the form `<platform>:<address>` and
//! cached in a [`DeviceRegistry`]; looking up an unknown id connects it.
//!
//! # Example
//!
//! ```no_run
//! use device_hub::{connect_device, get_device, Capability};
//!
//! #[tokio::main]
//! async fn main() -> device_hub::Result<()> {
//!     let id = connect_device("android", "emulator-5554").await?;
//!     let device = get_device(id.as_str()).await?;
//!
//!     let screen = device.screenshot().await?;
//!     println!("{}x{}", screen.width(), screen.height());
//!
//!     if device.supports(Capability::ExtendedHierarchy) {
//!         let dump = device.dump_hierarchy_extended().await?;
//!         println!("{:?} {:?}", dump.package_name, dump.window_size);
//!     }
//!     Ok(())
//! }
//! ```

// Core modules
pub mod error;

// Configuration module
pub mod config;

// Vendor transports
pub mod adb;
pub mod game;
pub mod xctest;

// Core functionality
pub mod adapter;
pub mod connector;
pub mod hierarchy;
pub mod platform;
pub mod registry;
pub mod screenshot_saver;
pub mod session;

pub use error::{DeviceError, Result};

pub use config::{TimingConfig, TIMING_CONFIG};

pub use adapter::{
    AndroidDevice, AppleDevice, Capabilities, Capability, DeviceAdapter, DeviceHandle,
    GameDevice, HierarchyDump,
};
pub use connector::VendorConnector;
pub use platform::{DeviceId, Platform, DEFAULT_GAME_ADDRESS};
pub use registry::{connect_device, get_device, global_registry, DeviceRegistry};
pub use screenshot_saver::ScreenshotSaver;
pub use session::{
    AndroidSession, AppleSession, DeviceConnector, ForegroundApp, GameSession, WindowSize,
};
