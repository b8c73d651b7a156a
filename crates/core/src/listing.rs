//! Stage produced subtitle files into the temp directory for hand-out.

use crate::config::AppConfig;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, trace, warn};

fn is_srt(name: &str) -> bool {
    name.ends_with(".srt")
}

fn stage_srt_files(config: &AppConfig) -> io::Result<Vec<PathBuf>> {
    fs::create_dir_all(&config.temp_dir)?;
    let mut staged = Vec::new();
    for entry in fs::read_dir(&config.data_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_srt(name) || !entry.file_type()?.is_file() {
            continue;
        }
        let dest = config.temp_dir.join(name);
        fs::copy(entry.path(), &dest)?;
        debug!("staged {}", dest.display());
        staged.push(dest);
    }
    staged.sort();
    Ok(staged)
}

/// Copy every `.srt` in the data directory into the temp directory and
/// return the copies. Failures are logged and produce an empty list.
pub fn list_srt_files(config: &AppConfig) -> Vec<PathBuf> {
    trace!("list_srt_files data_dir={}", config.data_dir.display());
    match stage_srt_files(config) {
        Ok(paths) => paths,
        Err(err) => {
            warn!("Error listing files: {}", err);
            Vec::new()
        }
    }
}
