//! Request dispatch: resolve a local video, run the OCR backend and report.
//! Every failure comes back as a typed [`DispatchError`]; callers render it
//! once with [`status_message`].

use crate::config::AppConfig;
use crate::download::{download_video, DownloadError, DownloadProgress, DownloadSummary};
use crate::extractor::{ExtractionParams, SubtitleExtractor};
use crate::srt;
use reqwest::Client;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Suffix every output file name ends with.
pub const SRT_SUFFIX: &str = ".srt";

/// Where the video to process comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSource {
    /// A file the user already has locally.
    Upload(PathBuf),
    /// A remote video fetched into the data directory first.
    Url(String),
    /// The bundled demo video.
    Demo,
}

/// One extraction submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRequest {
    pub source: VideoSource,
    pub output_name: String,
    pub params: ExtractionParams,
}

/// Why a submission did not produce a subtitle file.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Please provide a video URL")]
    MissingUrl,
    #[error("Please upload a video file")]
    MissingUpload,
    #[error("Demo video not found at {}", .0.display())]
    DemoNotFound(PathBuf),
    #[error("Error downloading video: {0}")]
    Download(#[from] DownloadError),
    #[error("{0:#}")]
    Extraction(anyhow::Error),
    #[error("extraction finished but {} was not written", .0.display())]
    MissingOutput(PathBuf),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A finished extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub output_path: PathBuf,
    /// Contents of the written file, `None` if it did not parse.
    pub stats: Option<srt::Stats>,
    /// Present when the video was fetched from a URL.
    pub download: Option<DownloadSummary>,
}

impl fmt::Display for Extracted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Subtitle extraction completed! File saved to {}",
            self.output_path.display()
        )
    }
}

/// Human readable status line for a dispatch outcome.
pub fn status_message(result: &Result<Extracted, DispatchError>) -> String {
    match result {
        Ok(done) => done.to_string(),
        Err(err) => format!("Error: {err}"),
    }
}

/// Append `.srt` unless the name already ends with it.
pub fn ensure_srt_suffix(name: &str) -> String {
    if name.ends_with(SRT_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{SRT_SUFFIX}")
    }
}

/// Turn the requested source into a local video path, downloading if needed.
pub async fn resolve_video<F>(
    config: &AppConfig,
    client: &Client,
    source: &VideoSource,
    on_progress: F,
) -> Result<(PathBuf, Option<DownloadSummary>), DispatchError>
where
    F: FnMut(DownloadProgress),
{
    trace!("resolve_video source={:?}", source);
    match source {
        VideoSource::Demo => {
            if !config.demo_video.is_file() {
                return Err(DispatchError::DemoNotFound(config.demo_video.clone()));
            }
            Ok((config.demo_video.clone(), None))
        }
        VideoSource::Url(url) => {
            if url.trim().is_empty() {
                return Err(DispatchError::MissingUrl);
            }
            let dest = config.download_path();
            let summary = download_video(client, url, &dest, on_progress).await?;
            Ok((dest, Some(summary)))
        }
        VideoSource::Upload(path) => {
            if path.as_os_str().is_empty() {
                return Err(DispatchError::MissingUpload);
            }
            Ok((path.clone(), None))
        }
    }
}

/// Summarize the produced file. The format belongs to the OCR
/// library, so a parse failure is only worth a warning.
fn subtitle_stats(path: &Path) -> Option<srt::Stats> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!("could not read {}: {}", path.display(), err);
            return None;
        }
    };
    match srt::parse(&text) {
        Ok(cues) => Some(srt::Stats::of(&cues)),
        Err(err) => {
            warn!("{} does not look like SRT: {:#}", path.display(), err);
            None
        }
    }
}

/// Run one extraction request to completion.
pub async fn run_extraction<E, F>(
    config: &AppConfig,
    client: &Client,
    extractor: &E,
    request: &ExtractionRequest,
    on_progress: F,
) -> Result<Extracted, DispatchError>
where
    E: SubtitleExtractor + ?Sized,
    F: FnMut(DownloadProgress),
{
    trace!("run_extraction request={:?}", request);
    fs::create_dir_all(&config.data_dir)?;
    let (video, download) = resolve_video(config, client, &request.source, on_progress).await?;
    let output_path = config
        .data_dir
        .join(ensure_srt_suffix(&request.output_name));
    info!(
        "extracting subtitles from {} into {}",
        video.display(),
        output_path.display()
    );
    extractor
        .save_subtitles(&video, &output_path, &request.params)
        .await
        .map_err(DispatchError::Extraction)?;
    if !output_path.is_file() {
        return Err(DispatchError::MissingOutput(output_path));
    }
    let stats = subtitle_stats(&output_path);
    debug!("{} holds {:?}", output_path.display(), stats);
    Ok(Extracted {
        output_path,
        stats,
        download,
    })
}
