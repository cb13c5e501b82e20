//! Core types for the upscale job pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{split_args, ConfigError, ConfigResult, EnvOverrides, Settings, ToolSettings};
use crate::logging::{JobLogger, LogConfig};
use crate::models::FrameRange;
use crate::pipeline::PipelineConfig;

use super::pipeline::{CancelHandle, PipelineRunResult};

/// Progress callback: (step_name, percent_complete, message).
pub type ProgressCallback = Box<dyn Fn(&str, u32, &str) + Send + Sync>;

/// Concat list written next to the parts.
pub const PART_LIST_FILE: &str = "files.txt";

/// Video index cache shared by every part of a job.
pub const INDEX_CACHE_FILE: &str = "cache.lwi";

/// File the parts are concatenated into before the final move.
pub const COMBINED_FILE: &str = "combined.mkv";

/// One HD file to upscale into one UHD file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpscaleJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl UpscaleJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Display name: the output file name.
    pub fn name(&self) -> String {
        self.output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output.to_string_lossy().into_owned())
    }

    /// Per-job work directory under `temp_root`.
    ///
    /// Keyed by the input path so a restarted job finds its finished parts.
    pub fn work_dir(&self, temp_root: &Path) -> PathBuf {
        let digest = format!("{:x}", md5::compute(self.input.to_string_lossy().as_bytes()));
        let base = self
            .input
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "input".into());
        temp_root.join(&digest[..16]).join(base)
    }
}

/// Encoder settings with arguments already split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    pub frames_per_part: u32,
    pub input_args: Vec<String>,
    pub transcode_args: Vec<String>,
}

/// Everything a worker needs to run jobs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub pipeline: PipelineConfig,
    pub encode: EncodeOptions,
    pub tools: ToolSettings,
    pub temp_root: PathBuf,
    pub log_config: LogConfig,
}

impl WorkerOptions {
    /// Merge the config file with environment overrides and validate.
    pub fn from_settings(settings: &Settings, env: &EnvOverrides) -> ConfigResult<Self> {
        let pipeline = PipelineConfig::from_settings(settings, env)?;

        let mut merged = settings.clone();
        env.apply(&mut merged)?;

        if merged.encode.frames_per_part == 0 {
            return Err(ConfigError::InvalidSetting {
                key: "encode.frames_per_part".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            pipeline,
            encode: EncodeOptions {
                frames_per_part: merged.encode.frames_per_part,
                input_args: split_args(&merged.encode.ffmpeg_input_args),
                transcode_args: split_args(&merged.encode.ffmpeg_transcode_args),
            },
            tools: merged.tools.clone(),
            temp_root: PathBuf::from(&merged.paths.temp_root),
            log_config: LogConfig::from_settings(&merged.logging),
        })
    }
}

/// One chunk of the source rendered into its own file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPlan {
    pub range: FrameRange,
    /// Final name, `<start>+<frames_per_part>.mkv`.
    pub file_name: String,
    /// Name while the part is being written.
    pub work_name: String,
    pub script_name: String,
}

/// Split `[0, total)` into consecutive parts of `per_part` frames.
///
/// The last part is clamped to `total`. Returns no parts when either
/// argument is zero.
pub fn plan_parts(total: u32, per_part: u32) -> Vec<PartPlan> {
    if total == 0 || per_part == 0 {
        return Vec::new();
    }

    (0..total)
        .step_by(per_part as usize)
        .filter_map(|start| {
            let end = start.saturating_add(per_part).min(total);
            FrameRange::new(start, end).ok().map(|range| PartPlan {
                range,
                file_name: format!("{:07}+{}.mkv", start, per_part),
                work_name: format!("work-{:07}.mkv", start),
                script_name: format!("part-{:07}.vpy", start),
            })
        })
        .collect()
}

/// Read-only context passed to steps.
pub struct Context {
    pub job: UpscaleJob,
    pub job_name: String,
    pub work_dir: PathBuf,
    pub options: WorkerOptions,
    pub logger: Arc<JobLogger>,
    cancel: CancelHandle,
    progress_callback: Option<ProgressCallback>,
}

impl Context {
    pub fn new(
        job: UpscaleJob,
        options: WorkerOptions,
        work_dir: PathBuf,
        logger: Arc<JobLogger>,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            job_name: job.name(),
            job,
            work_dir,
            options,
            logger,
            cancel,
            progress_callback: None,
        }
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn report_progress(&self, step_name: &str, percent: u32, message: &str) {
        if let Some(ref callback) = self.progress_callback {
            callback(step_name, percent, message);
        }
    }

    /// Flag polled by running child processes.
    pub fn cancel_flag(&self) -> &AtomicBool {
        self.cancel.flag()
    }

    pub fn work_path(&self, name: &str) -> PathBuf {
        self.work_dir.join(name)
    }
}

/// Results accumulated by the steps of one job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    pub started_at: Option<String>,
    /// Source frame count (from Probe).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frames: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<PartsOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finalize: Option<FinalizeOutput>,
}

impl JobState {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }
}

/// Output of the UpscaleParts step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartsOutput {
    /// Every part file, in order.
    pub parts: Vec<PathBuf>,
    pub list_file: PathBuf,
    /// Parts rendered in this run.
    pub rendered: usize,
    /// Parts left over from an earlier run.
    pub reused: usize,
}

/// How the combined file reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveMethod {
    HardLink,
    Rename,
}

/// Output of the Finalize step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeOutput {
    pub output: PathBuf,
    pub method: MoveMethod,
    /// `.mkv` files removed from the work dir.
    pub cleaned: usize,
}

/// Outcome of a single step's execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    /// Nothing to do; the reason is logged.
    Skipped(String),
}

/// How a job ended when it did not fail.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed(PipelineRunResult),
    /// The output was already there; nothing was done.
    AlreadyExists,
}
