//! Frame pipeline: stage sequencing, script rendering and dry-run estimation.
//!
//! The stages are fixed: load, trim, pad, upscale, optional interpolation,
//! restore, output. A `VideoCore` supplies the operations; `ScriptCore`
//! renders them as a VapourSynth script and `EstimateCore` computes their
//! shapes from metadata.

pub mod align;
mod config;
mod estimate;
mod script;
mod video_core;

pub use config::{InterpolationStage, PipelineConfig, UpscaleStage};
pub use estimate::{estimate, Estimate, EstimateCore};
pub use script::{render_script, ScriptClip, ScriptCore};
pub use video_core::{run, SourceSpec, Stage, StageError, VideoCore};
