//! Settings struct with TOML-based sections.
//!
//! Each section maps to one TOML table and can be rewritten on its own by
//! `ConfigManager::update_section`.

use serde::{Deserialize, Serialize};

use crate::models::{DEFAULT_RIFE_PRESET, DEFAULT_UPSCALE_PRESET};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathSettings,

    #[serde(default)]
    pub upscale: UpscaleSettings,

    #[serde(default)]
    pub interpolation: InterpolationSettings,

    #[serde(default)]
    pub encode: EncodeSettings,

    #[serde(default)]
    pub tools: ToolSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Working directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root under which each job gets its own work directory.
    #[serde(default = "default_temp_root")]
    pub temp_root: String,

    /// Folder for the rolling application log.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Folder holding `queue.json`.
    #[serde(default = "default_queue_folder")]
    pub queue_folder: String,
}

fn default_temp_root() -> String {
    "/var/cache/upscalers".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_queue_folder() -> String {
    ".queue".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            temp_root: default_temp_root(),
            logs_folder: default_logs_folder(),
            queue_folder: default_queue_folder(),
        }
    }
}

/// Super-resolution stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpscaleSettings {
    /// Catalog preset used when no model file is configured.
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// ONNX model file. Takes precedence over `model_name` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,

    #[serde(default = "default_streams")]
    pub num_streams: u32,

    #[serde(default = "default_true")]
    pub use_cublas: bool,
}

fn default_model_name() -> String {
    DEFAULT_UPSCALE_PRESET.to_string()
}

fn default_streams() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl Default for UpscaleSettings {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            model_path: None,
            num_streams: default_streams(),
            use_cublas: true,
        }
    }
}

/// Frame interpolation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpolationSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_rife_model")]
    pub model: String,

    #[serde(default = "default_streams")]
    pub num_streams: u32,
}

fn default_rife_model() -> String {
    DEFAULT_RIFE_PRESET.to_string()
}

impl Default for InterpolationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_rife_model(),
            num_streams: default_streams(),
        }
    }
}

/// Encoder and chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncodeSettings {
    /// Frames rendered per part file.
    #[serde(default = "default_frames_per_part")]
    pub frames_per_part: u32,

    /// ffmpeg arguments placed before `-i -`, whitespace separated.
    #[serde(default = "default_ffmpeg_input_args")]
    pub ffmpeg_input_args: String,

    /// ffmpeg arguments describing the video encode, whitespace separated.
    #[serde(default = "default_ffmpeg_transcode_args")]
    pub ffmpeg_transcode_args: String,
}

fn default_frames_per_part() -> u32 {
    7200
}

fn default_ffmpeg_input_args() -> String {
    "-hide_banner -loglevel info -stats_period 10".to_string()
}

fn default_ffmpeg_transcode_args() -> String {
    "-c:v hevc_nvenc -profile:v main10 -preset:v slow -rc:v vbr -cq:v 16 \
     -temporal_aq 1 -spatial_aq 1 -g 24 -strict_gop 1"
        .to_string()
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            frames_per_part: default_frames_per_part(),
            ffmpeg_input_args: default_ffmpeg_input_args(),
            ffmpeg_transcode_args: default_ffmpeg_transcode_args(),
        }
    }
}

/// External executables, by name or absolute path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_vspipe")]
    pub vspipe: String,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,
}

fn default_vspipe() -> String {
    "vspipe".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            vspipe: default_vspipe(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    /// Collapse child-process output in job logs.
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of child-process lines shown when a command fails.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Encode progress is logged at multiples of this percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_timestamps: true,
        }
    }
}

/// Split a whitespace separated argument string.
pub fn split_args(args: &str) -> Vec<String> {
    args.split_whitespace().map(str::to_string).collect()
}

/// Config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Paths,
    Upscale,
    Interpolation,
    Encode,
    Tools,
    Logging,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 6] = [
        ConfigSection::Paths,
        ConfigSection::Upscale,
        ConfigSection::Interpolation,
        ConfigSection::Encode,
        ConfigSection::Tools,
        ConfigSection::Logging,
    ];

    /// TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Upscale => "upscale",
            ConfigSection::Interpolation => "interpolation",
            ConfigSection::Encode => "encode",
            ConfigSection::Tools => "tools",
            ConfigSection::Logging => "logging",
        }
    }

    /// Comment written above the section in generated files.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Working directories",
            ConfigSection::Upscale => "Super-resolution model and TensorRT streams",
            ConfigSection::Interpolation => "Optional RIFE frame interpolation",
            ConfigSection::Encode => "Chunking and ffmpeg encoder arguments",
            ConfigSection::Tools => "External executables",
            ConfigSection::Logging => "Logging configuration",
        }
    }
}
