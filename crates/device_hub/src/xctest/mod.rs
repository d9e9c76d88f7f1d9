//! XCTest module for iOS device control
//!
//! iOS devices are driven through WebDriverAgent, the XCTest runner that
//! exposes the device over HTTP (usually forwarded with `iproxy 8100 8100`).

mod client;

pub use client::{normalize_url, WdaClient, DEFAULT_WDA_URL};
