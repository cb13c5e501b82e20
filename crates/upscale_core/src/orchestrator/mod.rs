//! Chunked upscale job orchestration.
//!
//! A job runs these steps against one input file:
//!
//! ```text
//! Pipeline
//!     ├── Step: Prepare       (check paths, create output dir)
//!     ├── Step: Probe         (frame count, cached in the work dir)
//!     ├── Step: UpscaleParts  (vspipe | ffmpeg per chunk, resumable)
//!     └── Step: Finalize      (concat + original streams, move, clean up)
//! ```
//!
//! [`run_job`] wraps the pipeline with work dir and logger setup;
//! [`QueueProcessor`] feeds it from the persistent queue.

mod errors;
mod job;
mod pipeline;
mod queue_processor;
mod step;
pub mod steps;
mod types;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use job::run_job;
pub use pipeline::{CancelHandle, Pipeline, PipelineRunResult};
pub use queue_processor::{JobResult, QueueProcessor};
pub use step::PipelineStep;
pub use steps::{FinalizeStep, PrepareStep, ProbeStep, UpscalePartsStep};
pub use types::{
    plan_parts, Context, EncodeOptions, FinalizeOutput, JobOutcome, JobState, MoveMethod,
    PartPlan, PartsOutput, ProgressCallback, StepOutcome, UpscaleJob, WorkerOptions,
    COMBINED_FILE, INDEX_CACHE_FILE, PART_LIST_FILE,
};

/// The standard upscale pipeline.
pub fn create_upscale_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(PrepareStep::new())
        .with_step(ProbeStep::new())
        .with_step(UpscalePartsStep::new())
        .with_step(FinalizeStep::new())
}
