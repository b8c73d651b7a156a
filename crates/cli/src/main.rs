//! Binary entry point for the hardsub extractor.

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use hardsub_core::config::AppConfig;
use hardsub_core::dispatch::{run_extraction, status_message, ExtractionRequest, VideoSource};
use hardsub_core::download::{download_video, http_client, DownloadProgress};
use hardsub_core::extractor::{BackendParams, CropRect, ExtractionParams, PythonVideocr};
use hardsub_core::listing::list_srt_files;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Command line options for the binary.
#[derive(Parser)]
#[command(version, about = "Extract hardcoded subtitles from videos into SRT files")]
struct Cli {
    /// JSON file with directory and interpreter settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for downloaded videos and produced subtitles.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Directory the listing copies subtitles into.
    #[arg(long, global = true)]
    temp_dir: Option<PathBuf>,

    /// Location of the bundled demo video.
    #[arg(long, global = true)]
    demo_video: Option<PathBuf>,

    /// Python interpreter with the OCR library installed.
    #[arg(long, global = true)]
    python: Option<String>,

    /// Enable verbose debug and trace logs.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download a video into the data directory.
    Download {
        /// Remote video URL.
        url: String,
    },
    /// Run OCR on a video and write an SRT file.
    Extract(ExtractArgs),
    /// Stage the produced SRT files and print their paths.
    List,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Upload,
    Url,
    Demo,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// videocr with GPU toggle and crop rectangle.
    Videocr,
    /// videocr_paddle with brightness threshold and full-frame mode.
    PaddleFullframe,
    /// videocr_paddle with crop rectangle.
    PaddleCrop,
}

#[derive(Args)]
struct ExtractArgs {
    /// Where the video comes from.
    #[arg(long, value_enum, default_value_t = SourceKind::Upload)]
    source: SourceKind,

    /// Local video path, used with `--source upload`.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Remote video URL, used with `--source url`.
    #[arg(long)]
    url: Option<String>,

    /// Name of the subtitle file written to the data directory.
    #[arg(long, default_value = "subtitle.srt")]
    output_name: String,

    /// OCR language code.
    #[arg(long, default_value = "ch")]
    lang: String,

    /// Start of the processed window (HH:MM:SS).
    #[arg(long, default_value = "00:00:00")]
    start: String,

    /// End of the processed window (HH:MM:SS), omitted for the whole video.
    #[arg(long)]
    end: Option<String>,

    #[arg(long, default_value_t = 75.0)]
    conf_threshold: f64,

    #[arg(long, default_value_t = 80.0)]
    sim_threshold: f64,

    /// OCR backend and the knobs it understands.
    #[arg(long, value_enum, default_value_t = Backend::Videocr)]
    backend: Backend,

    /// Run the videocr backend on the CPU.
    #[arg(long)]
    no_gpu: bool,

    /// Frames skipped between OCR passes. The videocr backend uses 0 when
    /// omitted; the paddle backends leave it to the library.
    #[arg(long)]
    frames_to_skip: Option<u32>,

    #[arg(long, default_value_t = 0)]
    crop_x: u32,
    #[arg(long, default_value_t = 0)]
    crop_y: u32,
    #[arg(long, default_value_t = 0)]
    crop_width: u32,
    #[arg(long, default_value_t = 0)]
    crop_height: u32,

    /// Brightness cut-off for the paddle-fullframe backend.
    #[arg(long)]
    brightness_threshold: Option<f64>,

    /// OCR the whole frame (paddle-fullframe backend).
    #[arg(long)]
    fullframe: bool,
}

impl ExtractArgs {
    fn source(&self) -> VideoSource {
        match self.source {
            SourceKind::Upload => VideoSource::Upload(self.input.clone().unwrap_or_default()),
            SourceKind::Url => VideoSource::Url(self.url.clone().unwrap_or_default()),
            SourceKind::Demo => VideoSource::Demo,
        }
    }

    fn params(&self) -> ExtractionParams {
        let crop = CropRect {
            x: self.crop_x,
            y: self.crop_y,
            width: self.crop_width,
            height: self.crop_height,
        };
        let backend = match self.backend {
            Backend::Videocr => BackendParams::Videocr {
                use_gpu: !self.no_gpu,
                frames_to_skip: self.frames_to_skip.unwrap_or(0),
                crop,
            },
            Backend::PaddleFullframe => BackendParams::PaddleFullFrame {
                brightness_threshold: self.brightness_threshold,
                use_fullframe: self.fullframe,
                frames_to_skip: self.frames_to_skip,
            },
            Backend::PaddleCrop => BackendParams::PaddleCrop {
                frames_to_skip: self.frames_to_skip,
                crop,
            },
        };
        ExtractionParams {
            lang: self.lang.clone(),
            time_start: self.start.clone(),
            time_end: self.end.clone().unwrap_or_default(),
            conf_threshold: self.conf_threshold,
            sim_threshold: self.sim_threshold,
            backend,
        }
    }

    fn request(&self) -> ExtractionRequest {
        ExtractionRequest {
            source: self.source(),
            output_name: self.output_name.clone(),
            params: self.params(),
        }
    }
}

/// Merge the optional config file with command line overrides.
fn build_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &cli.temp_dir {
        config.temp_dir = dir.clone();
    }
    if let Some(path) = &cli.demo_video {
        config.demo_video = path.clone();
    }
    if let Some(python) = &cli.python {
        config.python = python.clone();
    }
    Ok(config)
}

/// Progress bar fed by the downloader's progress notifications.
fn download_bar() -> Result<ProgressBar> {
    let pb = ProgressBar::no_length();
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}",
        )?
        .progress_chars("#>-"),
    );
    pb.set_message("Downloading video");
    Ok(pb)
}

fn update_bar(pb: &ProgressBar, progress: DownloadProgress) {
    if let Some(total) = progress.total {
        pb.set_length(total);
    }
    pb.set_position(progress.downloaded);
}

fn print_listing(config: &AppConfig) {
    let files = list_srt_files(config);
    if files.is_empty() {
        println!("No .srt files in {}", config.data_dir.display());
        return;
    }
    println!("Subtitle files:");
    for path in files {
        println!("  {}", path.display());
    }
}

/// Application entry point which parses CLI args and performs actions.
#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let filter = if cli.debug {
        EnvFilter::default()
            .add_directive("hardsub=trace".parse()?)
            .add_directive("hardsub_core=trace".parse()?)
            .add_directive("info".parse()?)
    } else {
        EnvFilter::default()
            .add_directive("hardsub=info".parse()?)
            .add_directive("hardsub_core=info".parse()?)
            .add_directive("warn".parse()?)
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = build_config(&cli)?;
    config.ensure_dirs()?;
    debug!("using config {:?}", config);

    match &cli.command {
        Command::Download { url } => {
            let client = http_client()?;
            let pb = download_bar()?;
            let result = download_video(&client, url, &config.download_path(), |p| {
                update_bar(&pb, p)
            })
            .await;
            match result {
                Ok(summary) => {
                    pb.finish_and_clear();
                    println!("{summary}");
                }
                Err(err) => {
                    pb.abandon();
                    println!("Error downloading video: {err}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Extract(args) => {
            let client = http_client()?;
            let extractor = PythonVideocr::new(config.python.clone());
            let request = args.request();
            let pb = match request.source {
                VideoSource::Url(_) => download_bar()?,
                _ => ProgressBar::hidden(),
            };
            let result = run_extraction(&config, &client, &extractor, &request, |p| {
                update_bar(&pb, p)
            })
            .await;
            pb.finish_and_clear();
            if let Ok(Some(summary)) = result.as_ref().map(|done| done.download.as_ref()) {
                println!("{summary}");
            }
            println!("{}", status_message(&result));
            match &result {
                Ok(done) => {
                    if let Some(stats) = &done.stats {
                        println!("{stats}");
                    }
                }
                Err(_) => return Ok(ExitCode::FAILURE),
            }
            print_listing(&config);
        }
        Command::List => print_listing(&config),
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hardsub_core::extractor::kwargs;

    #[test]
    fn extract_defaults_match_the_videocr_backend() {
        let cli = Cli::parse_from(["hardsub", "extract", "--input", "clip.mp4"]);
        let Command::Extract(args) = &cli.command else {
            panic!("expected extract");
        };
        let request = args.request();
        assert_eq!(request.source, VideoSource::Upload(PathBuf::from("clip.mp4")));
        assert_eq!(request.output_name, "subtitle.srt");
        assert_eq!(request.params, ExtractionParams::default());
        let map = kwargs(&request.params);
        assert_eq!(map["frames_to_skip"].as_u64(), Some(0));
    }

    #[test]
    fn paddle_fullframe_flags_are_mapped() {
        let cli = Cli::parse_from([
            "hardsub",
            "extract",
            "--source",
            "url",
            "--url",
            "https://example.com/v.mp4",
            "--backend",
            "paddle-fullframe",
            "--brightness-threshold",
            "210",
            "--fullframe",
        ]);
        let Command::Extract(args) = &cli.command else {
            panic!("expected extract");
        };
        let request = args.request();
        assert_eq!(
            request.source,
            VideoSource::Url("https://example.com/v.mp4".to_string())
        );
        assert_eq!(
            request.params.backend,
            BackendParams::PaddleFullFrame {
                brightness_threshold: Some(210.0),
                use_fullframe: true,
                frames_to_skip: None,
            }
        );
    }

    #[test]
    fn overrides_win_over_defaults() {
        let cli = Cli::parse_from(["hardsub", "--data-dir", "/tmp/subs", "list"]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/subs"));
        assert_eq!(config.python, "python3");
    }
}
