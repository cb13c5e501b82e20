//! Frame counting and stream probing with ffprobe.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::models::{ClipInfo, FrameRate, PixelFormat, Resolution};

use super::runner::run_output;
use super::{ToolCommand, ToolError};

const TOOL: &str = "ffprobe";

/// Name of the cached frame count inside a work directory.
pub const FRAME_COUNT_FILE: &str = "framecount";

/// Command counting video packets, which equals frames for the sources we take.
pub fn count_frames_command(ffprobe: &str, input: &Path) -> ToolCommand {
    ToolCommand::new(TOOL, ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v",
            "-count_packets",
            "-show_entries",
            "stream=nb_read_packets",
            "-of",
            "csv=p=0",
        ])
        .arg(input)
}

/// Parse the first line of the count output.
pub fn parse_frame_count(stdout: &str) -> Result<u32, ToolError> {
    let first = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| ToolError::parse(TOOL, "empty frame count output"))?;

    // csv output may carry a trailing separator
    let value = first.trim_end_matches(',');
    value
        .parse::<u32>()
        .map_err(|e| ToolError::parse(TOOL, format!("frame count '{}': {}", value, e)))
}

/// Count frames in `input` by reading every packet.
pub fn count_frames(ffprobe: &str, input: &Path) -> Result<u32, ToolError> {
    let cmd = count_frames_command(ffprobe, input);
    tracing::debug!("Running: {}", cmd);
    let stdout = run_output(&cmd)?;
    parse_frame_count(&stdout)
}

/// Frame count stored in a work directory so resumed jobs skip the probe.
#[derive(Debug, Clone)]
pub struct FrameCountCache {
    path: PathBuf,
}

impl FrameCountCache {
    pub fn new(work_dir: &Path) -> Self {
        Self {
            path: work_dir.join(FRAME_COUNT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached value, if present and readable.
    pub fn load(&self) -> Option<u32> {
        let content = fs::read_to_string(&self.path).ok()?;
        match parse_frame_count(&content) {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!("Ignoring bad frame count cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn store(&self, frames: u32) -> Result<(), ToolError> {
        fs::write(&self.path, frames.to_string())
            .map_err(|e| ToolError::io(format!("writing {}", self.path.display()), e))
    }

    /// Cached count, or probe `input` and cache the result.
    pub fn get_or_count(&self, ffprobe: &str, input: &Path) -> Result<u32, ToolError> {
        if let Some(frames) = self.load() {
            tracing::debug!("Using cached frame count {} from {}", frames, self.path.display());
            return Ok(frames);
        }

        let frames = count_frames(ffprobe, input)?;
        self.store(frames)?;
        Ok(frames)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Command dumping stream info as JSON.
pub fn probe_command(ffprobe: &str, input: &Path) -> ToolCommand {
    ToolCommand::new(TOOL, ffprobe)
        .args(["-v", "error", "-show_streams", "-of", "json"])
        .arg(input)
}

/// Read the first video stream of an ffprobe JSON document.
///
/// The frame count comes from `nb_frames`, then the Matroska
/// `NUMBER_OF_FRAMES` tag, then duration times frame rate.
pub fn parse_probe_json(json: &str) -> Result<ClipInfo, ToolError> {
    let probe: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| ToolError::parse(TOOL, format!("JSON parse error: {}", e)))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ToolError::parse(TOOL, "no video stream"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(ToolError::parse(TOOL, "video stream has no dimensions")),
    };

    let format = PixelFormat::parse(stream.pix_fmt.as_deref().unwrap_or(""))
        .map_err(|e| ToolError::parse(TOOL, e.to_string()))?;

    let fps = [&stream.r_frame_rate, &stream.avg_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| FrameRate::parse(rate).ok())
        .ok_or_else(|| ToolError::parse(TOOL, "video stream has no frame rate"))?;

    let num_frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u32>().ok())
        .or_else(|| {
            stream
                .tags
                .iter()
                .find(|(k, _)| k.starts_with("NUMBER_OF_FRAMES"))
                .and_then(|(_, v)| v.parse::<u32>().ok())
        })
        .or_else(|| {
            let secs = stream.duration.as_deref()?.parse::<f64>().ok()?;
            Some((secs * fps.as_f64()).round() as u32)
        })
        .unwrap_or(0);

    Ok(ClipInfo {
        resolution: Resolution::new(width, height),
        format,
        fps,
        num_frames,
    })
}

/// Probe resolution, format, frame rate and length of `input`.
pub fn probe_video(ffprobe: &str, input: &Path) -> Result<ClipInfo, ToolError> {
    let cmd = probe_command(ffprobe, input);
    tracing::debug!("Running: {}", cmd);
    let stdout = run_output(&cmd)?;
    parse_probe_json(&stdout)
}
