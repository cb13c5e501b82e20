//! UpscaleParts step: renders the source in fixed-size chunks.
//!
//! Each part is piped from vspipe into ffmpeg and written under a work name,
//! then renamed once complete. Parts that already carry their final name
//! are kept, so an interrupted job resumes where it stopped.

use std::fs;
use std::path::PathBuf;

use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{
    plan_parts, Context, JobState, PartPlan, PartsOutput, StepOutcome, INDEX_CACHE_FILE,
    PART_LIST_FILE,
};
use crate::pipeline::{render_script, SourceSpec};
use crate::tools::{ffmpeg, run_piped, vspipe, ProgressTracker, ToolError};

pub struct UpscalePartsStep;

impl UpscalePartsStep {
    pub fn new() -> Self {
        Self
    }

    fn render_part(&self, ctx: &Context, source: &SourceSpec, plan: &PartPlan) -> StepResult<()> {
        let opts = &ctx.options;
        let script = render_script(source, plan.range, &opts.pipeline)?;
        let script_path = ctx.work_path(&plan.script_name);
        fs::write(&script_path, script)
            .map_err(|e| StepError::io_error(format!("writing {}", script_path.display()), e))?;

        let work_path = ctx.work_path(&plan.work_name);
        let vs = vspipe::render_command(&opts.tools.vspipe, &script_path);
        let ff = ffmpeg::part_command(
            &opts.tools.ffmpeg,
            &opts.encode.input_args,
            &opts.encode.transcode_args,
            &work_path,
        );

        let out_frames = u64::from(plan.range.len()) * opts.pipeline.frame_multiplier();
        let progress = ProgressTracker::new(Some(out_frames));
        run_piped(&vs, &ff, &ctx.logger, &progress, ctx.cancel_flag())?;

        let final_path = ctx.work_path(&plan.file_name);
        ctx.logger.debug(&format!(
            "Moving {} to {}",
            plan.work_name, plan.file_name
        ));
        fs::rename(&work_path, &final_path)
            .map_err(|e| StepError::io_error(format!("renaming {}", work_path.display()), e))?;
        Ok(())
    }
}

impl Default for UpscalePartsStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for UpscalePartsStep {
    fn name(&self) -> &str {
        "UpscaleParts"
    }

    fn description(&self) -> &str {
        "Upscale parts"
    }

    fn validate_input(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        match state.frames {
            Some(n) if n > 0 => Ok(()),
            _ => Err(StepError::precondition_failed("frame count not known")),
        }
    }

    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome> {
        let total = state
            .frames
            .ok_or_else(|| StepError::precondition_failed("frame count not known"))?;
        let plans = plan_parts(total, ctx.options.encode.frames_per_part);
        let parts: Vec<PathBuf> = plans.iter().map(|p| ctx.work_path(&p.file_name)).collect();

        let list_file = ctx.work_path(PART_LIST_FILE);
        ffmpeg::write_concat_list(&list_file, &parts)?;

        let source = SourceSpec::new(&ctx.job.input, ctx.work_path(INDEX_CACHE_FILE));
        let mut output = PartsOutput {
            parts: parts.clone(),
            list_file,
            rendered: 0,
            reused: 0,
        };

        for (i, (plan, final_path)) in plans.iter().zip(&parts).enumerate() {
            if final_path.exists() {
                ctx.logger
                    .debug(&format!("Part {} already rendered", plan.file_name));
                output.reused += 1;
                continue;
            }
            if ctx.cancel_flag().load(std::sync::atomic::Ordering::SeqCst) {
                return Err(ToolError::Cancelled {
                    tool: "vspipe".to_string(),
                }
                .into());
            }

            ctx.logger.info(&format!(
                "Upscaling part {}/{}: frames {}",
                i + 1,
                plans.len(),
                plan.range
            ));
            ctx.report_progress(
                self.name(),
                (i * 100 / plans.len()) as u32,
                &format!("Part {}/{}", i + 1, plans.len()),
            );
            self.render_part(ctx, &source, plan)?;
            output.rendered += 1;
        }

        ctx.logger.info(&format!(
            "{} parts: {} rendered, {} reused",
            parts.len(),
            output.rendered,
            output.reused
        ));
        state.parts = Some(output);
        Ok(StepOutcome::Success)
    }

    fn validate_output(&self, _ctx: &Context, state: &JobState) -> StepResult<()> {
        let parts = state
            .parts
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("parts not recorded"))?;
        if parts.parts.is_empty() {
            return Err(StepError::invalid_output("no parts planned"));
        }
        if let Some(missing) = parts.parts.iter().find(|p| !p.exists()) {
            return Err(StepError::invalid_output(format!(
                "part {} missing",
                missing.display()
            )));
        }
        Ok(())
    }
}
