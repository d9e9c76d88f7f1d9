//! adb server interaction: remote connects, device listing, state checks

use crate::config::{adb_path, secs, TIMING_CONFIG};
use crate::error::{DeviceError, Result};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Type of adb transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Usb,
    Emulator,
    Remote,
}

/// One line of `adb devices -l`
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub serial: String,
    pub status: String,
    pub connection_type: ConnectionType,
    pub model: Option<String>,
}

/// Build adb command with optional device specifier
pub(crate) fn adb_command(adb_path: &str, serial: Option<&str>) -> Command {
    let mut cmd = Command::new(adb_path);
    if let Some(serial) = serial {
        cmd.arg("-s").arg(serial);
    }
    cmd.kill_on_drop(true);
    cmd
}

/// Run an adb command with a timeout and collect its output
pub(crate) async fn run(mut cmd: Command, timeout: Duration, what: &str) -> Result<Output> {
    tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| DeviceError::Timeout(format!("{} timeout after {:?}", what, timeout)))?
        .map_err(DeviceError::Io)
}

pub(crate) fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{}{}", stdout, stderr)
}

/// Manages the local adb server's view of devices
#[derive(Debug, Clone)]
pub struct AdbConnection {
    adb_path: String,
}

impl AdbConnection {
    /// Create a connection manager using the configured adb binary
    pub fn new() -> Self {
        Self {
            adb_path: adb_path(),
        }
    }

    /// Create a connection manager with custom adb path
    pub fn with_path(adb_path: impl Into<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
        }
    }

    pub fn adb_path(&self) -> &str {
        &self.adb_path
    }

    /// Attach a network device (`host:port`) to the adb server
    pub async fn connect(&self, address: &str) -> Result<String> {
        let mut cmd = adb_command(&self.adb_path, None);
        cmd.arg("connect").arg(address);

        let output = run(
            cmd,
            secs(TIMING_CONFIG.adb.connect_timeout),
            "adb connect",
        )
        .await?;

        let combined = combined_output(&output);
        debug!("adb connect {}: {}", address, combined.trim());

        parse_connect_output(address, &combined)
    }

    /// State of a device as seen by the adb server (`device`, `offline`, ...)
    pub async fn get_state(&self, serial: Option<&str>) -> Result<String> {
        let mut cmd = adb_command(&self.adb_path, serial);
        cmd.arg("get-state");

        let output = run(
            cmd,
            secs(TIMING_CONFIG.adb.command_timeout),
            "adb get-state",
        )
        .await?;

        if !output.status.success() {
            return Err(DeviceError::ConnectionFailed {
                address: serial.unwrap_or_default().to_string(),
                reason: combined_output(&output).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// List all devices known to the adb server
    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>> {
        let mut cmd = adb_command(&self.adb_path, None);
        cmd.arg("devices").arg("-l");

        let output = run(cmd, secs(TIMING_CONFIG.adb.command_timeout), "adb devices").await?;

        Ok(parse_devices_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for AdbConnection {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_connect_output(address: &str, combined: &str) -> Result<String> {
    let lower = combined.to_lowercase();
    if lower.contains("already connected") {
        Ok(format!("Already connected to {}", address))
    } else if lower.contains("connected to") {
        Ok(format!("Connected to {}", address))
    } else {
        Err(DeviceError::ConnectionFailed {
            address: address.to_string(),
            reason: combined.trim().to_string(),
        })
    }
}

fn parse_devices_output(stdout: &str) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();

    // Skip "List of devices attached"
    for line in stdout.lines().skip(1) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let serial = parts[0].to_string();
        let connection_type = if serial.contains(':') {
            ConnectionType::Remote
        } else if serial.starts_with("emulator-") {
            ConnectionType::Emulator
        } else {
            ConnectionType::Usb
        };

        let model = parts[2..]
            .iter()
            .find_map(|part| part.strip_prefix("model:"))
            .map(str::to_string);

        devices.push(DeviceInfo {
            serial,
            status: parts[1].to_string(),
            connection_type,
            model,
        });
    }

    devices
}

/// Quick helper to list connected devices
pub async fn list_devices() -> Result<Vec<DeviceInfo>> {
    AdbConnection::new().list_devices().await
}
