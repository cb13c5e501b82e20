//! Prepare step: checks the job's paths and logs what is about to run.

use std::fs;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, JobState, StepOutcome};

pub struct PrepareStep;

impl PrepareStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PrepareStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for PrepareStep {
    fn name(&self) -> &str {
        "Prepare"
    }

    fn description(&self) -> &str {
        "Prepare work directory"
    }

    fn validate_input(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        if !ctx.job.input.is_file() {
            return Err(StepError::file_not_found(ctx.job.input.display().to_string()));
        }
        if ctx.job.input == ctx.job.output {
            return Err(StepError::invalid_input("input and output are the same file"));
        }
        Ok(())
    }

    fn execute(&self, ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
        let opts = &ctx.options;
        ctx.logger.info(&format!("Input: {}", ctx.job.input.display()));
        ctx.logger.info(&format!("Output: {}", ctx.job.output.display()));
        ctx.logger.info(&format!("Work dir: {}", ctx.work_dir.display()));
        ctx.logger
            .info(&format!("Upscale model: {}", opts.pipeline.upscale.model));
        match &opts.pipeline.interpolation {
            Some(stage) => ctx
                .logger
                .info(&format!("Interpolation: RIFE {}", stage.model)),
            None => ctx.logger.debug("Interpolation: disabled"),
        }

        if let Some(parent) = ctx.job.output.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StepError::io_error("creating output directory", e))?;
            }
        }

        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, ctx: &Context, _state: &JobState) -> StepResult<()> {
        if !ctx.work_dir.is_dir() {
            return Err(StepError::invalid_output(format!(
                "work directory {} missing",
                ctx.work_dir.display()
            )));
        }
        Ok(())
    }
}
