//! Error types for the upscale job pipeline.
//!
//! Errors chain context through layers: Job → Step → Tool/Stage → Detail.

use std::io;

use thiserror::Error;

use crate::pipeline::StageError;
use crate::tools::ToolError;

/// Top-level job error.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job '{job_name}' failed at step '{step_name}': {source}")]
    StepFailed {
        job_name: String,
        step_name: String,
        #[source]
        source: StepError,
    },

    /// The job was rejected before any step ran.
    #[error("Job '{job_name}' failed validation: {message}")]
    ValidationFailed { job_name: String, message: String },

    #[error("Job '{job_name}' was cancelled")]
    Cancelled { job_name: String },

    /// Work directory or logger could not be created.
    #[error("Job '{job_name}' setup failed: {message}")]
    SetupFailed { job_name: String, message: String },
}

impl PipelineError {
    /// Wrap a step failure. A cancelled tool becomes [`PipelineError::Cancelled`].
    pub fn step_failed(
        job_name: impl Into<String>,
        step_name: impl Into<String>,
        source: StepError,
    ) -> Self {
        if let StepError::Tool(ToolError::Cancelled { .. }) = source {
            return Self::cancelled(job_name);
        }
        Self::StepFailed {
            job_name: job_name.into(),
            step_name: step_name.into(),
            source,
        }
    }

    pub fn validation_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    pub fn setup_failed(job_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            job_name: job_name.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(job_name: impl Into<String>) -> Self {
        Self::Cancelled {
            job_name: job_name.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Error from a single pipeline step.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Script generation failed: {0}")]
    Stage(#[from] StageError),

    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Required file not found: {path}")]
    FileNotFound { path: String },

    #[error("Precondition not met: {0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    /// I/O error with the operation that failed.
    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

pub type StepResult<T> = Result<T, StepError>;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_displays_context() {
        let err = StepError::from(ToolError::CommandFailed {
            tool: "ffmpeg".to_string(),
            exit_code: 1,
            tail: vec!["first".to_string(), "Conversion failed!".to_string()],
        });
        let msg = err.to_string();
        assert!(msg.contains("ffmpeg"));
        assert!(msg.contains("exit code 1"));
        assert!(msg.contains("Conversion failed!"));
    }

    #[test]
    fn pipeline_error_chains_context() {
        let step_err = StepError::file_not_found("/media/show 1080p.mkv");
        let err = PipelineError::step_failed("show 2160p.mkv", "Probe", step_err);

        let msg = err.to_string();
        assert!(msg.contains("show 2160p.mkv"));
        assert!(msg.contains("Probe"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancelled_tool_becomes_cancelled_job() {
        let step_err = StepError::from(ToolError::Cancelled {
            tool: "vspipe".to_string(),
        });
        let err = PipelineError::step_failed("job", "UpscaleParts", step_err);
        assert!(err.is_cancelled());
    }
}
