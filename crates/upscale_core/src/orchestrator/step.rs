//! Pipeline step trait.

use super::errors::StepResult;
use super::types::{Context, JobState, StepOutcome};

/// One stage of an upscale job.
///
/// The pipeline calls `validate_input`, then `execute`, then
/// `validate_output` when `execute` reported [`StepOutcome::Success`].
/// Steps record what they produced in [`JobState`] so later steps can
/// pick it up.
pub trait PipelineStep: Send + Sync {
    /// Step name for logging and error context.
    fn name(&self) -> &str;

    /// Check preconditions before execution.
    fn validate_input(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    /// Do the work and record results in `state`.
    fn execute(&self, ctx: &Context, state: &mut JobState) -> StepResult<StepOutcome>;

    /// Verify the step left valid output behind.
    fn validate_output(&self, ctx: &Context, state: &JobState) -> StepResult<()>;

    fn description(&self) -> &str {
        self.name()
    }
}
