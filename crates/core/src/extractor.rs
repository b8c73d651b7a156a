//! Bridge to the external OCR library that turns hardsubs into an SRT file.
//! Each backend variant exposes its own set of tuning knobs; they are passed
//! through as keyword arguments without further interpretation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, trace};

/// Crop rectangle in pixels. All zeros means the library's default region.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Knobs that only exist on some OCR backends.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendParams {
    /// `videocr` with GPU toggle and crop rectangle.
    Videocr {
        use_gpu: bool,
        frames_to_skip: u32,
        crop: CropRect,
    },
    /// `videocr_paddle` tuned by brightness with optional full-frame OCR.
    PaddleFullFrame {
        brightness_threshold: Option<f64>,
        use_fullframe: bool,
        frames_to_skip: Option<u32>,
    },
    /// `videocr_paddle` restricted to a crop rectangle, no GPU toggle.
    PaddleCrop {
        frames_to_skip: Option<u32>,
        crop: CropRect,
    },
}

impl BackendParams {
    /// Python module providing `save_subtitles_to_file` for this backend.
    pub fn module(&self) -> &'static str {
        match self {
            BackendParams::Videocr { .. } => "videocr",
            BackendParams::PaddleFullFrame { .. } | BackendParams::PaddleCrop { .. } => {
                "videocr_paddle"
            }
        }
    }
}

/// Everything handed to the OCR routine besides the two paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionParams {
    pub lang: String,
    /// Free-form `HH:MM:SS` strings, interpreted by the library.
    pub time_start: String,
    pub time_end: String,
    pub conf_threshold: f64,
    pub sim_threshold: f64,
    pub backend: BackendParams,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            lang: "ch".to_string(),
            time_start: "00:00:00".to_string(),
            time_end: String::new(),
            conf_threshold: 75.0,
            sim_threshold: 80.0,
            backend: BackendParams::Videocr {
                use_gpu: true,
                frames_to_skip: 0,
                crop: CropRect::default(),
            },
        }
    }
}

fn insert_crop(map: &mut Map<String, Value>, crop: &CropRect) {
    map.insert("crop_x".into(), json!(crop.x));
    map.insert("crop_y".into(), json!(crop.y));
    map.insert("crop_width".into(), json!(crop.width));
    map.insert("crop_height".into(), json!(crop.height));
}

/// Keyword arguments for `save_subtitles_to_file`, keyed by library name.
pub fn kwargs(params: &ExtractionParams) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("lang".into(), json!(params.lang));
    map.insert("time_start".into(), json!(params.time_start));
    map.insert("time_end".into(), json!(params.time_end));
    map.insert("conf_threshold".into(), json!(params.conf_threshold));
    map.insert("sim_threshold".into(), json!(params.sim_threshold));
    let skip = match &params.backend {
        BackendParams::Videocr {
            use_gpu,
            frames_to_skip,
            crop,
        } => {
            map.insert("use_gpu".into(), json!(use_gpu));
            insert_crop(&mut map, crop);
            Some(*frames_to_skip)
        }
        BackendParams::PaddleFullFrame {
            brightness_threshold,
            use_fullframe,
            frames_to_skip,
        } => {
            if let Some(threshold) = brightness_threshold {
                map.insert("brightness_threshold".into(), json!(threshold));
            }
            map.insert("use_fullframe".into(), json!(use_fullframe));
            *frames_to_skip
        }
        BackendParams::PaddleCrop {
            frames_to_skip,
            crop,
        } => {
            insert_crop(&mut map, crop);
            *frames_to_skip
        }
    };
    if let Some(n) = skip {
        map.insert("frames_to_skip".into(), json!(n));
    }
    map
}

/// Produces an SRT file at `output` from the hardsubs in `video`.
#[async_trait]
pub trait SubtitleExtractor: Send + Sync {
    async fn save_subtitles(
        &self,
        video: &Path,
        output: &Path,
        params: &ExtractionParams,
    ) -> Result<()>;
}

/// Driver run by the interpreter: `argv[1]` is the module, `argv[2]` a JSON
/// object with the two paths and the keyword arguments.
const DRIVER: &str = "\
import importlib, json, sys
mod = importlib.import_module(sys.argv[1])
args = json.loads(sys.argv[2])
mod.save_subtitles_to_file(args['video'], args['output'], **args['kwargs'])
";

/// Calls the OCR library through a Python interpreter subprocess.
#[derive(Debug, Clone)]
pub struct PythonVideocr {
    python: String,
}

impl PythonVideocr {
    pub fn new(python: impl Into<String>) -> Self {
        Self {
            python: python.into(),
        }
    }

    /// Arguments passed to the interpreter for one extraction.
    pub fn command_args(
        &self,
        video: &Path,
        output: &Path,
        params: &ExtractionParams,
    ) -> Vec<String> {
        let payload = json!({
            "video": video.display().to_string(),
            "output": output.display().to_string(),
            "kwargs": Value::Object(kwargs(params)),
        });
        vec![
            "-c".to_string(),
            DRIVER.to_string(),
            params.backend.module().to_string(),
            payload.to_string(),
        ]
    }
}

#[async_trait]
impl SubtitleExtractor for PythonVideocr {
    async fn save_subtitles(
        &self,
        video: &Path,
        output: &Path,
        params: &ExtractionParams,
    ) -> Result<()> {
        trace!(
            "save_subtitles video={} output={}",
            video.display(),
            output.display()
        );
        let args = self.command_args(video, output, params);
        debug!("{} {}", self.python, args[2..].join(" "));
        info!("running {} on {}", params.backend.module(), video.display());
        let out = Command::new(&self.python)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("failed to start {}", self.python))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let last = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no output");
            return Err(anyhow!(
                "{} exited with {}: {}",
                params.backend.module(),
                out.status,
                last.trim()
            ));
        }
        Ok(())
    }
}
