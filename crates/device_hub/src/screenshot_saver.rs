//! Screenshot saving utilities for persisting captures to disk

use chrono::{DateTime, Local};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{DeviceError, Result};

fn timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d_%H-%M-%S-%3f").to_string()
}

/// Saves screenshots into a timestamped session directory
#[derive(Debug, Clone)]
pub struct ScreenshotSaver {
    /// Session directory (created at session start with timestamp)
    session_dir: PathBuf,
    /// Counter for ordering screenshots
    shot_count: usize,
}

impl ScreenshotSaver {
    /// Create a saver with a new `yyyy-mm-dd_HH-MM-SS-mmm` session directory
    /// under `base_dir`
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let session_dir = base_dir.as_ref().join(timestamp(Local::now()));

        fs::create_dir_all(&session_dir)
            .await
            .map_err(DeviceError::Io)?;

        info!("Screenshot session directory: {}", session_dir.display());

        Ok(Self {
            session_dir,
            shot_count: 0,
        })
    }

    /// Save a capture as `shot_NNN_yyyy-mm-dd_HH-MM-SS-mmm.png`
    ///
    /// Encoding runs on the blocking pool; large framebuffers take a while.
    pub async fn save(&mut self, image: DynamicImage) -> Result<PathBuf> {
        self.shot_count += 1;

        let filename = format!("shot_{:03}_{}.png", self.shot_count, timestamp(Local::now()));
        let file_path = self.session_dir.join(&filename);

        let target = file_path.clone();
        tokio::task::spawn_blocking(move || {
            image.save_with_format(&target, image::ImageFormat::Png)
        })
        .await
        .map_err(|e| DeviceError::CommandFailed(format!("encoder task failed: {}", e)))??;

        debug!("Saved screenshot: {}", file_path.display());

        Ok(file_path)
    }

    /// Get the session directory path
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Get the number of screenshots saved so far
    pub fn shot_count(&self) -> usize {
        self.shot_count
    }
}
