//! Probe step: counts source frames, reusing the count cached by an
//! earlier run of the same job.

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};
use crate::tools::FrameCountCache;

pub struct ProbeStep;

impl ProbeStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProbeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for ProbeStep {
    fn name(&self) -> &str {
        "Probe"
    }

    fn description(&self) -> &str {
        "Count source frames"
    }

    fn validate_input(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        if !ctx.job.input.exists() {
            return Err(StepError::file_not_found(ctx.job.input.display().to_string()));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let cache = FrameCountCache::new(&ctx.work_dir);
        let frames = match cache.load() {
            Some(frames) => {
                ctx.logger
                    .debug(&format!("Using cached frame count from {}", cache.path().display()));
                frames
            }
            None => {
                ctx.logger.info("Counting frames with ffprobe");
                cache.get_or_count(&ctx.options.tools.ffprobe, &ctx.job.input)?
            }
        };

        ctx.logger.info(&format!("Total frames: {}", frames));
        state.frames = Some(frames);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match state.frames {
            Some(0) => Err(StepError::invalid_output("source has no video frames")),
            Some(_) => Ok(()),
            None => Err(StepError::invalid_output("frame count not recorded")),
        }
    }
}
