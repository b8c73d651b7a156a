//! Streamed HTTP download of a remote video into a fixed local path.
//! The body is written slice by slice so memory stays bounded and callers
//! receive progress notifications as bytes land on disk.

use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Url};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace};

/// Size of each slice written to the destination file.
pub const CHUNK_SIZE: usize = 1024;

/// Failures of a single download attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Please provide a valid URL (got {0:?})")]
    InvalidUrl(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Progress notification emitted after every written slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// `None` when the server did not advertise a usable length.
    pub total: Option<u64>,
}

/// Outcome of a finished download.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadSummary {
    pub path: PathBuf,
    /// Size of the file on disk after the transfer.
    pub total_bytes: u64,
    /// Length reported by the HEAD request, if any.
    pub advertised_bytes: Option<u64>,
    pub elapsed: Duration,
}

impl DownloadSummary {
    /// Average throughput in bytes per second, 0 when no time elapsed.
    pub fn average_speed(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.total_bytes as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Video successfully downloaded to {}", self.path.display())?;
        writeln!(f, "Total size: {}", format_size(self.total_bytes as f64))?;
        write!(f, "Average speed: {}/s", format_size(self.average_speed()))
    }
}

/// Render a byte count in the largest unit under which it stays below 1024.
pub fn format_size(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes;
    for unit in &UNITS[..UNITS.len() - 1] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} {}", UNITS[UNITS.len() - 1])
}

/// HTTP client shared by every download of one process.
pub fn http_client() -> Result<Client, DownloadError> {
    Ok(Client::builder()
        .user_agent(concat!("hardsub/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Check that `url` is non-empty and carries a scheme.
pub fn validate_url(url: &str) -> Result<Url, DownloadError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(DownloadError::InvalidUrl(url.to_string()));
    }
    match Url::parse(trimmed) {
        Ok(parsed) if !parsed.scheme().is_empty() => Ok(parsed),
        _ => Err(DownloadError::InvalidUrl(url.to_string())),
    }
}

/// Ask the server for the body length without downloading it.
/// Any failure here only costs us the progress total.
async fn probe_length(client: &Client, url: &Url) -> Option<u64> {
    trace!("probe_length url={}", url);
    let resp = match client.head(url.clone()).send().await {
        Ok(resp) => resp,
        Err(err) => {
            debug!("HEAD request failed, total size unknown: {}", err);
            return None;
        }
    };
    if !resp.status().is_success() {
        debug!("HEAD answered {}, total size unknown", resp.status());
        return None;
    }
    // `Response::content_length` reports the (empty) HEAD body, so read the header.
    resp.headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|len| *len > 0)
}

/// Download `url` into `dest`, overwriting whatever is there.
/// `on_progress` is called after each slice of at most [`CHUNK_SIZE`] bytes.
pub async fn download_video<F>(
    client: &Client,
    url: &str,
    dest: &Path,
    mut on_progress: F,
) -> Result<DownloadSummary, DownloadError>
where
    F: FnMut(DownloadProgress),
{
    trace!("download_video url={} dest={}", url, dest.display());
    let url = validate_url(url)?;
    let total = probe_length(client, &url).await;
    debug!("advertised size: {:?}", total);

    let begin = Instant::now();
    let resp = client.get(url.clone()).send().await?.error_for_status()?;
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut file = File::create(dest).await?;
    let mut downloaded: u64 = 0;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        for slice in chunk.chunks(CHUNK_SIZE) {
            file.write_all(slice).await?;
            downloaded += slice.len() as u64;
            on_progress(DownloadProgress { downloaded, total });
        }
    }
    file.flush().await?;
    drop(file);
    let elapsed = begin.elapsed();

    let total_bytes = fs::metadata(dest).await?.len();
    let summary = DownloadSummary {
        path: dest.to_path_buf(),
        total_bytes,
        advertised_bytes: total,
        elapsed,
    };
    info!(
        "downloaded {} to {} in {:.2}s",
        format_size(total_bytes as f64),
        dest.display(),
        elapsed.as_secs_f64()
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use httpmock::Method::HEAD;
    use tempfile::tempdir;

    #[test]
    fn formats_sizes_at_unit_boundaries() {
        assert_eq!(format_size(0.0), "0.00 B");
        assert_eq!(format_size(1023.0), "1023.00 B");
        assert_eq!(format_size(1536.0), "1.50 KB");
        assert_eq!(format_size(1_048_576.0), "1.00 MB");
        assert_eq!(format_size(1024f64.powi(5) * 2.0), "2048.00 TB");
    }

    #[test]
    fn rejects_urls_without_scheme() {
        assert!(matches!(validate_url(""), Err(DownloadError::InvalidUrl(_))));
        assert!(matches!(
            validate_url("/videos/clip.mp4"),
            Err(DownloadError::InvalidUrl(_))
        ));
        assert!(validate_url("https://example.com/clip.mp4").is_ok());
    }

    #[test]
    fn speed_is_zero_without_elapsed_time() {
        let summary = DownloadSummary {
            path: PathBuf::from("data/video.mp4"),
            total_bytes: 2048,
            advertised_bytes: None,
            elapsed: Duration::ZERO,
        };
        assert_eq!(summary.average_speed(), 0.0);
        assert!(summary.to_string().contains("Total size: 2.00 KB"));
    }

    /// No request reaches the server when the URL has no scheme.
    #[tokio::test]
    async fn invalid_url_makes_no_request() {
        let server = MockServer::start_async().await;
        let any = server
            .mock_async(|when, then| {
                when.path("/video.mp4");
                then.status(200).body("data");
            })
            .await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.mp4");
        let url = format!("{}/video.mp4", server.address());
        let err = download_video(&Client::new(), &url, &dest, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl(_)));
        any.assert_hits_async(0).await;
        assert!(!dest.exists());
    }

    /// The body lands on disk in bounded slices and is reported as it goes.
    #[tokio::test]
    async fn streams_body_to_destination() {
        let server = MockServer::start_async().await;
        let body: Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/clip.mp4");
                then.status(200).header("content-length", "3000");
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/clip.mp4");
                then.status(200).body(&body);
            })
            .await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("data").join("video.mp4");
        let mut updates = Vec::new();
        let summary = download_video(&Client::new(), &server.url("/clip.mp4"), &dest, |p| {
            updates.push(p)
        })
        .await
        .unwrap();
        get.assert_async().await;
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert_eq!(summary.total_bytes, 3000);
        assert!(summary.average_speed() >= 0.0);
        assert!(updates.len() >= 3);
        assert!(updates.windows(2).all(|w| w[0].downloaded < w[1].downloaded));
        assert_eq!(updates.last().unwrap().downloaded, 3000);
        assert!(updates.iter().all(|p| p.total == Some(3000)));
        assert_eq!(summary.advertised_bytes, Some(3000));
    }

    /// A zero content length counts as unknown.
    #[tokio::test]
    async fn zero_content_length_is_unknown() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/clip.mp4");
                then.status(200).header("content-length", "0");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/clip.mp4");
                then.status(200).body("abc");
            })
            .await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.mp4");
        let mut updates = Vec::new();
        let summary = download_video(&Client::new(), &server.url("/clip.mp4"), &dest, |p| {
            updates.push(p)
        })
        .await
        .unwrap();
        assert_eq!(summary.advertised_bytes, None);
        assert_eq!(summary.total_bytes, 3);
        assert!(!updates.is_empty());
        assert!(updates.iter().all(|p| p.total.is_none()));
    }

    /// A missing HEAD answer only affects the reported totals.
    #[tokio::test]
    async fn tolerates_missing_content_length() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/clip.mp4");
                then.status(200).body("tiny");
            })
            .await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.mp4");
        std::fs::write(&dest, "stale contents from an older run").unwrap();
        let summary = download_video(&Client::new(), &server.url("/clip.mp4"), &dest, |_| {})
            .await
            .unwrap();
        assert_eq!(summary.total_bytes, 4);
        assert_eq!(summary.advertised_bytes, None);
        assert!(summary.average_speed() >= 0.0);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "tiny");
    }

    #[tokio::test]
    async fn fails_on_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.mp4");
                then.status(404);
            })
            .await;
        let dir = tempdir().unwrap();
        let dest = dir.path().join("video.mp4");
        let err = download_video(&Client::new(), &server.url("/gone.mp4"), &dest, |_| {})
            .await
            .unwrap_err();
        match err {
            DownloadError::Http(e) => assert_eq!(e.status().map(|s| s.as_u16()), Some(404)),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
