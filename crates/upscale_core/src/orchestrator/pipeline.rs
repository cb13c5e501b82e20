//! Step runner with cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::errors::{PipelineError, PipelineResult};
use super::step::PipelineStep;
use super::types::{Context, JobState, StepOutcome};

/// Ordered list of steps run against one job.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
    cancelled: CancelHandle,
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            cancelled: CancelHandle::new(),
        }
    }

    /// Share an existing cancel handle, e.g. one wired to Ctrl-C.
    pub fn with_cancel_handle(mut self, handle: CancelHandle) -> Self {
        self.cancelled = handle;
        self
    }

    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Handle that stops the pipeline at the next step boundary and kills
    /// any running child process.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancelled.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_cancelled()
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run(&self, ctx: &Context, state: &mut JobState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult::default();
        let total_steps = self.steps.len().max(1);

        for (i, step) in self.steps.iter().enumerate() {
            let step_name = step.name();

            if self.is_cancelled() {
                ctx.logger
                    .warn(&format!("Cancelled before step '{}'", step_name));
                return Err(PipelineError::cancelled(&ctx.job_name));
            }

            ctx.logger.phase(step.description());
            let percent = (i * 100 / total_steps) as u32;
            ctx.report_progress(step_name, percent, &format!("Starting {}", step_name));

            if let Err(e) = step.validate_input(ctx, state) {
                ctx.logger.error(&format!("Input validation failed: {}", e));
                return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
            }

            let outcome = step.execute(ctx, state).map_err(|e| {
                ctx.logger.error(&format!("{} failed: {}", step_name, e));
                PipelineError::step_failed(&ctx.job_name, step_name, e)
            })?;

            match outcome {
                StepOutcome::Success => {
                    if let Err(e) = step.validate_output(ctx, state) {
                        ctx.logger.error(&format!("Output validation failed: {}", e));
                        return Err(PipelineError::step_failed(&ctx.job_name, step_name, e));
                    }
                    ctx.logger.success(&format!("{} completed", step_name));
                    result.steps_completed.push(step_name.to_string());
                }
                StepOutcome::Skipped(reason) => {
                    ctx.logger.info(&format!("{} skipped: {}", step_name, reason));
                    result.steps_skipped.push(step_name.to_string());
                }
            }
        }

        ctx.report_progress("Complete", 100, "Job finished");
        Ok(result)
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raw flag for code that polls it, such as the process runner.
    pub fn flag(&self) -> &AtomicBool {
        &self.flag
    }
}

/// Steps a pipeline run went through.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    pub steps_completed: Vec<String>,
    pub steps_skipped: Vec<String>,
}

impl PipelineRunResult {
    pub fn all_completed(&self) -> bool {
        self.steps_skipped.is_empty()
    }

    pub fn total_steps(&self) -> usize {
        self.steps_completed.len() + self.steps_skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvOverrides, Settings};
    use crate::logging::{JobLogger, LogConfig};
    use crate::orchestrator::errors::{StepError, StepResult};
    use crate::orchestrator::types::{UpscaleJob, WorkerOptions};
    use std::sync::atomic::AtomicUsize;
    use tempfile::tempdir;

    struct CountingStep {
        name: &'static str,
        runs: Arc<AtomicUsize>,
        outcome: Result<StepOutcome, &'static str>,
    }

    impl CountingStep {
        fn ok(name: &'static str, runs: &Arc<AtomicUsize>) -> Self {
            Self {
                name,
                runs: Arc::clone(runs),
                outcome: Ok(StepOutcome::Success),
            }
        }
    }

    impl PipelineStep for CountingStep {
        fn name(&self) -> &str {
            self.name
        }

        fn validate_input(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }

        fn execute(&self, _ctx: &Context, _state: &mut JobState) -> StepResult<StepOutcome> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone().map_err(StepError::other)
        }

        fn validate_output(&self, _ctx: &Context, _state: &JobState) -> StepResult<()> {
            Ok(())
        }
    }

    fn context(dir: &std::path::Path, cancel: CancelHandle) -> Context {
        let options =
            WorkerOptions::from_settings(&Settings::default(), &EnvOverrides::default()).unwrap();
        let logger = JobLogger::new("test", dir, LogConfig::default(), None).unwrap();
        Context::new(
            UpscaleJob::new(dir.join("in 1080p.mkv"), dir.join("in 2160p.mkv")),
            options,
            dir.to_path_buf(),
            Arc::new(logger),
            cancel,
        )
    }

    #[test]
    fn pipeline_builds_correctly() {
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep::ok("Step1", &runs))
            .with_step(CountingStep::ok("Step2", &runs));

        assert_eq!(pipeline.step_count(), 2);
        assert_eq!(pipeline.step_names(), vec!["Step1", "Step2"]);
    }

    #[test]
    fn runs_steps_and_records_skips() {
        let dir = tempdir().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep::ok("A", &runs))
            .with_step(CountingStep {
                name: "B",
                runs: Arc::clone(&runs),
                outcome: Ok(StepOutcome::Skipped("nothing to do".to_string())),
            });

        let ctx = context(dir.path(), pipeline.cancel_handle());
        let result = pipeline.run(&ctx, &mut JobState::new("job")).unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(result.steps_completed, vec!["A"]);
        assert_eq!(result.steps_skipped, vec!["B"]);
        assert!(!result.all_completed());
        assert_eq!(result.total_steps(), 2);
    }

    #[test]
    fn failure_stops_later_steps() {
        let dir = tempdir().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .with_step(CountingStep {
                name: "Broken",
                runs: Arc::clone(&runs),
                outcome: Err("boom"),
            })
            .with_step(CountingStep::ok("Never", &runs));

        let ctx = context(dir.path(), pipeline.cancel_handle());
        let err = pipeline.run(&ctx, &mut JobState::new("job")).unwrap_err();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(matches!(err, PipelineError::StepFailed { ref step_name, .. } if step_name == "Broken"));
    }

    #[test]
    fn cancelled_pipeline_runs_nothing() {
        let dir = tempdir().unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let handle = CancelHandle::new();
        let pipeline = Pipeline::new()
            .with_cancel_handle(handle.clone())
            .with_step(CountingStep::ok("A", &runs));

        handle.cancel();
        assert!(pipeline.is_cancelled());

        let ctx = context(dir.path(), pipeline.cancel_handle());
        let err = pipeline.run(&ctx, &mut JobState::new("job")).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
