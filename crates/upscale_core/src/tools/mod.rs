//! External tool plumbing: ffprobe, ffmpeg and vspipe.
//!
//! Argument building and output parsing are pure functions; the functions
//! that spawn processes are thin wrappers around them.

pub mod ffmpeg;
pub mod ffprobe;
pub mod progress;
pub mod runner;
pub mod vspipe;

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::process::Command;

use thiserror::Error;

pub use ffprobe::FrameCountCache;
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use runner::{run_logged, run_output, run_piped};

/// Errors from running or parsing external tools.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with exit code {exit_code}: {}", last_line(.tail))]
    CommandFailed {
        tool: String,
        exit_code: i32,
        tail: Vec<String>,
    },

    #[error("Failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} was cancelled")]
    Cancelled { tool: String },
}

fn last_line(tail: &[String]) -> &str {
    tail.last().map(String::as_str).unwrap_or("no output")
}

impl ToolError {
    pub fn parse(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}

/// A program plus its arguments, loggable before it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Short name used in logs and errors, e.g. `ffmpeg`.
    pub tool: String,
    /// Executable name or path.
    pub program: String,
    pub args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(tool: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
