//! Per-job log file living in the job's work directory.
//!
//! The file is opened in append mode so resumed jobs keep the history of
//! earlier attempts; each session ends with a cut marker. Messages are
//! mirrored to `tracing` so the console shows the same phases.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogCallback, LogConfig, LogLevel, MessagePrefix};

/// Name of the log file inside a work directory.
pub const JOB_LOG_FILE: &str = "upscale.log";

/// Written when a logger closes, separating runs of the same job.
pub const CUT_MARKER: &str = " -------------- CUT HERE -------------- ";

/// Per-job logger writing to `upscale.log`.
pub struct JobLogger {
    job_name: String,
    log_path: PathBuf,
    file_writer: Mutex<Option<BufWriter<File>>>,
    callback: Option<LogCallback>,
    config: LogConfig,
    tail_buffer: Mutex<VecDeque<String>>,
    last_progress: Mutex<Option<u32>>,
}

impl JobLogger {
    /// Open (or create) `upscale.log` in `work_dir` for appending.
    pub fn new(
        job_name: impl Into<String>,
        work_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> io::Result<Self> {
        let work_dir = work_dir.as_ref();
        fs::create_dir_all(work_dir)?;

        let log_path = work_dir.join(JOB_LOG_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            job_name: job_name.into(),
            log_path,
            file_writer: Mutex::new(Some(BufWriter::new(file))),
            callback,
            tail_buffer: Mutex::new(VecDeque::with_capacity(config.error_tail)),
            config,
            last_progress: Mutex::new(None),
        })
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        if level < self.config.level {
            return;
        }

        match level {
            LogLevel::Error => tracing::error!(job = %self.job_name, "{}", message),
            LogLevel::Warn => tracing::warn!(job = %self.job_name, "{}", message),
            LogLevel::Info => tracing::info!(job = %self.job_name, "{}", message),
            LogLevel::Debug => tracing::debug!(job = %self.job_name, "{}", message),
            LogLevel::Trace => tracing::trace!(job = %self.job_name, "{}", message),
        }

        let formatted = self.format_message(message);
        self.output(&formatted);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, &MessagePrefix::Warning.format(message));
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, &MessagePrefix::Error.format(message));
    }

    pub fn command(&self, command: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Command.format(command));
    }

    pub fn phase(&self, phase_name: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Phase.format(phase_name));
    }

    pub fn success(&self, message: &str) {
        self.log(LogLevel::Info, &MessagePrefix::Success.format(message));
    }

    /// Log a progress percentage with an extra detail string.
    ///
    /// In compact mode only the first value past each `progress_step`
    /// boundary is logged. Returns whether the line was written.
    pub fn progress(&self, percent: u32, detail: &str) -> bool {
        let percent = percent.min(100);
        if self.config.compact {
            let step = self.config.progress_step.max(1);
            let mut last = self.last_progress.lock();
            if let Some(prev) = *last {
                if percent / step <= prev / step && !(percent == 100 && prev < 100) {
                    return false;
                }
            }
            *last = Some(percent);
        }

        self.log(LogLevel::Info, &format!("Progress: {}% ({})", percent, detail));
        true
    }

    /// Forget the last progress value, e.g. when a new part starts.
    pub fn reset_progress(&self) {
        *self.last_progress.lock() = None;
    }

    /// Record one line of child-process output.
    ///
    /// Lines always go to the tail buffer. They are only written to the
    /// file when compact mode is off.
    pub fn output_line(&self, tool: &str, line: &str) {
        {
            let mut buffer = self.tail_buffer.lock();
            if self.config.error_tail > 0 {
                if buffer.len() >= self.config.error_tail {
                    buffer.pop_front();
                }
                buffer.push_back(line.to_string());
            }
        }

        if self.config.compact {
            return;
        }
        self.output(&self.format_message(&format!("[{}] {}", tool, line)));
    }

    /// Write the tail buffer to the log, typically after a failure.
    pub fn show_tail(&self, header: &str) {
        let buffer = self.tail_buffer.lock();
        if buffer.is_empty() {
            return;
        }

        self.output(&self.format_message(&format!("[{}/tail]", header)));
        for line in buffer.iter() {
            self.output(&self.format_message(line));
        }
    }

    pub fn clear_tail(&self) {
        self.tail_buffer.lock().clear();
    }

    pub fn get_tail(&self) -> Vec<String> {
        self.tail_buffer.lock().iter().cloned().collect()
    }

    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Write the cut marker and release the file. Later calls are no-ops.
    pub fn close(&self) {
        let mut guard = self.file_writer.lock();
        if let Some(mut writer) = guard.take() {
            let _ = writeln!(writer, "{}", CUT_MARKER);
            let _ = writer.flush();
        }
    }

    fn format_message(&self, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            format!("[{}] {}", timestamp, message)
        } else {
            message.to_string()
        }
    }

    fn output(&self, formatted: &str) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }
        if let Some(ref callback) = self.callback {
            callback(formatted);
        }
    }
}

impl Drop for JobLogger {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn quiet() -> LogConfig {
        LogConfig {
            show_timestamps: false,
            ..LogConfig::default()
        }
    }

    #[test]
    fn creates_log_in_work_dir() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("job", dir.path().join("work"), quiet(), None).unwrap();
        assert_eq!(logger.log_path(), dir.path().join("work").join("upscale.log"));
        assert!(logger.log_path().exists());
    }

    #[test]
    fn appends_across_sessions_with_cut_marker() {
        let dir = tempdir().unwrap();
        {
            let logger = JobLogger::new("job", dir.path(), quiet(), None).unwrap();
            logger.phase("First");
        }
        {
            let logger = JobLogger::new("job", dir.path(), quiet(), None).unwrap();
            logger.phase("Second");
            logger.close();
            logger.close();
        }

        let content = fs::read_to_string(dir.path().join(JOB_LOG_FILE)).unwrap();
        let first = content.find("=== First ===").unwrap();
        let second = content.find("=== Second ===").unwrap();
        assert!(first < second);
        assert_eq!(content.matches(CUT_MARKER).count(), 2);
    }

    #[test]
    fn calls_callback() {
        let dir = tempdir().unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let callback: LogCallback = Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let logger = JobLogger::new("job", dir.path(), quiet(), Some(callback)).unwrap();
        logger.info("one");
        logger.debug("filtered by level");
        logger.success("two");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn compact_mode_filters_progress() {
        let dir = tempdir().unwrap();
        let logger = JobLogger::new("job", dir.path(), quiet(), None).unwrap();

        assert!(logger.progress(3, "a"));
        assert!(!logger.progress(10, "b"));
        assert!(logger.progress(21, "c"));
        assert!(!logger.progress(39, "d"));
        assert!(logger.progress(40, "e"));
        assert!(logger.progress(100, "f"));
        assert!(!logger.progress(100, "g"));

        logger.reset_progress();
        assert!(logger.progress(0, "h"));
    }

    #[test]
    fn tail_buffer_keeps_last_lines() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            error_tail: 3,
            ..quiet()
        };
        let logger = JobLogger::new("job", dir.path(), config, None).unwrap();

        for i in 0..6 {
            logger.output_line("ffmpeg", &format!("line {}", i));
        }
        assert_eq!(logger.get_tail(), vec!["line 3", "line 4", "line 5"]);

        logger.show_tail("ffmpeg");
        logger.flush();
        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("[ffmpeg/tail]"));
        // Compact mode keeps raw lines out of the file except via the tail.
        assert_eq!(content.matches("line 0").count(), 0);
    }

    #[test]
    fn verbose_mode_writes_child_output() {
        let dir = tempdir().unwrap();
        let config = LogConfig {
            compact: false,
            ..quiet()
        };
        let logger = JobLogger::new("job", dir.path(), config, None).unwrap();
        logger.output_line("vspipe", "Script evaluation done");
        logger.flush();

        let content = fs::read_to_string(logger.log_path()).unwrap();
        assert!(content.contains("[vspipe] Script evaluation done"));
    }
}
