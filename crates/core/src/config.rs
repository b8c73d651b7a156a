//! Runtime configuration shared by the downloader, dispatcher and listing.
//! The config is built once at start-up and handed to each component.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// File name used for videos fetched from a URL.
pub const DOWNLOAD_FILE_NAME: &str = "video.mp4";

/// Directory layout and tool locations for one deployment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Holds the downloaded video and every produced `.srt` file.
    pub data_dir: PathBuf,
    /// Staging area for copies handed out by the listing.
    pub temp_dir: PathBuf,
    /// Bundled demo video.
    pub demo_video: PathBuf,
    /// Python interpreter that has the OCR library installed.
    pub python: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            temp_dir: PathBuf::from("temp_gradio_files"),
            demo_video: PathBuf::from("demo.mp4"),
            python: "python3".to_string(),
        }
    }
}

impl AppConfig {
    /// Read a JSON config file. Missing keys fall back to the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        trace!("AppConfig::load path={}", path.display());
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;
        debug!("loaded config {:?}", config);
        Ok(config)
    }

    /// Fixed destination of every URL download.
    pub fn download_path(&self) -> PathBuf {
        self.data_dir.join(DOWNLOAD_FILE_NAME)
    }

    /// Create the data and temp directories if they do not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        fs::create_dir_all(&self.temp_dir)?;
        Ok(())
    }
}
