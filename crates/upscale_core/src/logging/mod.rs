//! Logging infrastructure.
//!
//! This module provides:
//! - Global `tracing` setup, optionally with a daily rolling log file
//! - Per-job loggers writing `upscale.log` into the work directory
//! - A tail buffer of child-process output for error diagnosis
//! - A line splitter turning raw process output into log lines
//!
//! # Example
//!
//! ```no_run
//! use upscale_core::logging::{JobLogger, LogConfig};
//!
//! let logger = JobLogger::new("Show S01E01", "/var/cache/upscalers/ab12/ep.mkv",
//!     LogConfig::default(), None).unwrap();
//! logger.phase("Probe");
//! logger.command("ffprobe -v error ...");
//! logger.success("Job completed");
//! ```

mod job_logger;
mod line_splitter;
mod types;

use std::io;
use std::path::Path;

pub use job_logger::{JobLogger, CUT_MARKER, JOB_LOG_FILE};
pub use line_splitter::LineSplitter;
pub use types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// File name prefix of the rolling application log.
pub const APP_LOG_PREFIX: &str = "video-upscaler.log";

fn filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()))
}

/// Install the global subscriber writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_level`. Call once at startup.
pub fn init_tracing(default_level: LogLevel) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter(default_level))
        .init();
}

/// Like [`init_tracing`], plus a daily rolling file in `log_dir`.
///
/// The returned guard must be kept alive; dropping it flushes and stops the
/// background writer.
pub fn init_tracing_with_file(
    default_level: LogLevel,
    log_dir: impl AsRef<Path>,
) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir.as_ref())?;
    let appender = tracing_appender::rolling::daily(log_dir.as_ref(), APP_LOG_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .with(filter(default_level))
        .init();

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filter_strings() {
        assert_eq!(LogLevel::Debug.as_filter_str(), "debug");
        assert_eq!(LogLevel::Warn.as_filter_str(), "warn");
    }

    #[test]
    fn test_tracing_init_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
        tracing::warn!("visible in test output");
    }
}
