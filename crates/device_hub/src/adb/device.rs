//! Android session backed by the adb command line

use super::connection::{adb_command, combined_output, run, AdbConnection};
use super::screenshot::capture_screenshot;
use crate::config::{secs, TIMING_CONFIG};
use crate::error::{DeviceError, Result};
use crate::session::{AndroidSession, ForegroundApp, WindowSize};
use async_trait::async_trait;
use image::DynamicImage;
use lazy_static::lazy_static;
use regex::Regex;
use std::any::Any;
use tracing::{debug, info};

const DUMP_PATH: &str = "/sdcard/window_dump.xml";

lazy_static! {
    static ref COMPONENT_RE: Regex =
        Regex::new(r"([A-Za-z0-9_.]+)/([A-Za-z0-9_.$]+)").expect("component regex is valid");
    static ref SIZE_RE: Regex =
        Regex::new(r"(Physical|Override) size:\s*(\d+)x(\d+)").expect("size regex is valid");
}

/// A device reachable through the local adb server
#[derive(Debug, Clone)]
pub struct AdbDevice {
    adb_path: String,
    /// `None` targets the only attached device
    serial: Option<String>,
}

impl AdbDevice {
    /// Open a session for `address`
    ///
    /// `host:port` addresses are attached with `adb connect` first. An empty
    /// address targets the default device. Fails unless adb reports the
    /// device in the `device` state.
    pub async fn open(connection: &AdbConnection, address: &str) -> Result<Self> {
        if address.contains(':') {
            connection.connect(address).await?;
        }

        let serial = (!address.is_empty()).then(|| address.to_string());
        let state = connection.get_state(serial.as_deref()).await?;
        if state != "device" {
            return Err(DeviceError::ConnectionFailed {
                address: address.to_string(),
                reason: format!("device is {}", state),
            });
        }

        info!("adb session open for {:?}", serial);
        Ok(Self {
            adb_path: connection.adb_path().to_string(),
            serial,
        })
    }

    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    /// Run a shell command on the device and return its stdout
    pub async fn shell(&self, args: &[&str]) -> Result<String> {
        let mut cmd = adb_command(&self.adb_path, self.serial.as_deref());
        cmd.arg("shell").args(args);

        let output = run(cmd, secs(TIMING_CONFIG.adb.command_timeout), "adb shell").await?;
        if !output.status.success() {
            return Err(DeviceError::CommandFailed(
                combined_output(&output).trim().to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn exec_out(&self, args: &[&str]) -> Result<Vec<u8>> {
        let mut cmd = adb_command(&self.adb_path, self.serial.as_deref());
        cmd.arg("exec-out").args(args);

        let output = run(cmd, secs(TIMING_CONFIG.adb.command_timeout), "adb exec-out").await?;
        if !output.status.success() {
            return Err(DeviceError::CommandFailed(
                combined_output(&output).trim().to_string(),
            ));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl AndroidSession for AdbDevice {
    async fn screenshot(&self) -> Result<DynamicImage> {
        capture_screenshot(&self.adb_path, self.serial.as_deref()).await
    }

    async fn dump_hierarchy(&self) -> Result<String> {
        let out = self.shell(&["uiautomator", "dump", DUMP_PATH]).await?;
        debug!("uiautomator dump: {}", out.trim());

        let xml = String::from_utf8(self.exec_out(&["cat", DUMP_PATH]).await?)
            .map_err(|e| DeviceError::ParseError(format!("hierarchy is not UTF-8: {}", e)))?;

        if !xml.contains("<hierarchy") {
            return Err(DeviceError::CommandFailed(format!(
                "uiautomator dump produced no hierarchy: {}",
                out.trim()
            )));
        }

        Ok(xml)
    }

    async fn app_current(&self) -> Result<ForegroundApp> {
        let stdout = self.shell(&["dumpsys", "window"]).await?;
        parse_focused_app(&stdout)
    }

    async fn window_size(&self) -> Result<WindowSize> {
        let stdout = self.shell(&["wm", "size"]).await?;
        parse_wm_size(&stdout)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Find the focused component in `dumpsys window` output
fn parse_focused_app(dumpsys: &str) -> Result<ForegroundApp> {
    let line = dumpsys
        .lines()
        .find(|l| l.contains("mCurrentFocus") && COMPONENT_RE.is_match(l))
        .or_else(|| {
            dumpsys
                .lines()
                .find(|l| l.contains("mFocusedApp") && COMPONENT_RE.is_match(l))
        })
        .ok_or_else(|| DeviceError::ParseError("no focused app in dumpsys window".to_string()))?;

    let caps = COMPONENT_RE
        .captures(line)
        .ok_or_else(|| DeviceError::ParseError(line.trim().to_string()))?;

    let package = caps[1].to_string();
    let activity = if caps[2].starts_with('.') {
        format!("{}{}", package, &caps[2])
    } else {
        caps[2].to_string()
    };

    Ok(ForegroundApp {
        package,
        activity: Some(activity),
    })
}

/// Parse `wm size`; an override size wins over the physical one
fn parse_wm_size(output: &str) -> Result<WindowSize> {
    let mut physical = None;
    let mut overridden = None;

    for caps in SIZE_RE.captures_iter(output) {
        let size = WindowSize {
            width: caps[2]
                .parse()
                .map_err(|_| DeviceError::ParseError(caps[0].to_string()))?,
            height: caps[3]
                .parse()
                .map_err(|_| DeviceError::ParseError(caps[0].to_string()))?,
        };
        match &caps[1] {
            "Override" => overridden = Some(size),
            _ => physical = Some(size),
        }
    }

    overridden.or(physical).ok_or_else(|| {
        DeviceError::ParseError(format!("unexpected wm size output: {}", output.trim()))
    })
}
