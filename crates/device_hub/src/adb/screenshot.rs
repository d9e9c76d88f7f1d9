//! Screen capture for Android devices

use super::connection::{adb_command, combined_output, run};
use crate::config::{secs, TIMING_CONFIG};
use crate::error::{DeviceError, Result};
use image::DynamicImage;
use tracing::debug;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

/// Capture the framebuffer with `screencap -p` streamed over `exec-out`
///
/// Secure windows make screencap fail or emit nothing; that surfaces as an
/// error rather than a placeholder image.
pub async fn capture_screenshot(adb_path: &str, serial: Option<&str>) -> Result<DynamicImage> {
    debug!("Capturing screenshot with serial: {:?}", serial);

    let mut cmd = adb_command(adb_path, serial);
    cmd.arg("exec-out").arg("screencap").arg("-p");

    let output = run(
        cmd,
        secs(TIMING_CONFIG.adb.screenshot_timeout),
        "Screenshot",
    )
    .await?;

    if !output.status.success() {
        return Err(DeviceError::CommandFailed(format!(
            "screencap failed: {}",
            combined_output(&output).trim()
        )));
    }

    decode_png(&output.stdout)
}

/// Decode screencap output, skipping any warning text adb put before the PNG
fn decode_png(bytes: &[u8]) -> Result<DynamicImage> {
    let start = bytes
        .windows(PNG_SIGNATURE.len())
        .position(|w| w == PNG_SIGNATURE)
        .ok_or_else(|| {
            DeviceError::CommandFailed(format!(
                "screencap returned no PNG data ({} bytes)",
                bytes.len()
            ))
        })?;

    let img = image::load_from_memory_with_format(&bytes[start..], image::ImageFormat::Png)?;
    debug!("Screenshot dimensions: {}x{}", img.width(), img.height());
    Ok(img)
}
