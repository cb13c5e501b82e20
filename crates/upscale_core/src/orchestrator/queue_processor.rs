//! Drains the persistent job queue one job at a time.

use std::path::PathBuf;

use crate::jobs::{JobQueue, JobQueueEntry, JobStatus, QueueError};

use super::job::run_job;
use super::pipeline::CancelHandle;
use super::types::{JobOutcome, UpscaleJob, WorkerOptions};

/// Result of processing a single queue entry.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_id: String,
    pub status: JobStatus,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub steps_completed: Vec<String>,
}

impl JobResult {
    pub fn success(job_id: String, output_path: PathBuf, steps_completed: Vec<String>) -> Self {
        Self {
            job_id,
            status: JobStatus::Done,
            output_path: Some(output_path),
            error: None,
            steps_completed,
        }
    }

    /// The output already existed so nothing ran.
    pub fn skipped(job_id: String, output_path: PathBuf) -> Self {
        Self {
            job_id,
            status: JobStatus::Skipped,
            output_path: Some(output_path),
            error: None,
            steps_completed: Vec::new(),
        }
    }

    pub fn failure(job_id: String, error: impl Into<String>) -> Self {
        Self {
            job_id,
            status: JobStatus::Failed,
            output_path: None,
            error: Some(error.into()),
            steps_completed: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status != JobStatus::Failed
    }
}

/// Runs queued jobs through the upscale pipeline.
pub struct QueueProcessor {
    options: WorkerOptions,
    cancel: CancelHandle,
}

impl QueueProcessor {
    pub fn new(options: WorkerOptions, cancel: CancelHandle) -> Self {
        Self { options, cancel }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Run one entry and describe how it ended.
    pub fn process_job(&self, entry: &JobQueueEntry) -> JobResult {
        let job = UpscaleJob::new(&entry.input, &entry.output);
        match run_job(&job, &self.options, &self.cancel, None) {
            Ok(JobOutcome::Completed(run)) => {
                JobResult::success(entry.id.clone(), job.output, run.steps_completed)
            }
            Ok(JobOutcome::AlreadyExists) => JobResult::skipped(entry.id.clone(), job.output),
            Err(e) => JobResult::failure(entry.id.clone(), e.to_string()),
        }
    }

    /// Process pending jobs until none are left or cancellation is requested.
    ///
    /// Each job is marked running before it starts, so a crashed worker's
    /// job is found by [`JobQueue::requeue_interrupted`] on the next start.
    /// A cancelled job goes back to pending. Every status change re-reads
    /// the queue file, so jobs added while one renders are kept and picked
    /// up in the same drain.
    pub fn drain(&self, queue: &mut JobQueue) -> Result<Vec<JobResult>, QueueError> {
        queue.update(|q| Ok(q.requeue_interrupted()))?;

        let mut results = Vec::new();
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Queue processing cancelled");
                break;
            }

            queue.reload();
            let Some(id) = queue.next_pending() else {
                break;
            };
            let Some(entry) = queue.get_by_id(&id).cloned() else {
                break;
            };
            tracing::info!(
                "Processing job {} ({} pending): {}",
                entry.id,
                queue.pending_count(),
                entry.name()
            );

            match queue.update(|q| q.set_status(&id, JobStatus::Running)) {
                Ok(()) => {}
                Err(QueueError::NotFound(_)) => {
                    tracing::warn!("Job {} left the queue before it started", id);
                    continue;
                }
                Err(e) => return Err(e),
            }

            let result = self.process_job(&entry);
            let recorded = match (&result.status, &result.error) {
                (JobStatus::Failed, Some(message)) if self.cancel.is_cancelled() => {
                    tracing::warn!("Job {} interrupted: {}", id, message);
                    queue.update(|q| q.set_status(&id, JobStatus::Pending))
                }
                (JobStatus::Failed, message) => {
                    let message = message.clone().unwrap_or_default();
                    tracing::error!("Job {} failed: {}", id, message);
                    queue.update(|q| q.set_error(&id, message))
                }
                (status, _) => {
                    let status = *status;
                    tracing::info!("Job {} finished: {}", id, status.as_str());
                    queue.update(|q| q.set_status(&id, status))
                }
            };
            match recorded {
                Err(QueueError::NotFound(_)) => {
                    tracing::warn!("Job {} was removed from the queue while running", id);
                }
                other => other?,
            }
            results.push(result);
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EnvOverrides, Settings};
    use crate::jobs::Priority;
    use std::fs;
    use tempfile::tempdir;

    fn processor(temp_root: &std::path::Path) -> QueueProcessor {
        let mut settings = Settings::default();
        settings.paths.temp_root = temp_root.to_string_lossy().into_owned();
        let options = WorkerOptions::from_settings(&settings, &EnvOverrides::default()).unwrap();
        QueueProcessor::new(options, CancelHandle::new())
    }

    #[test]
    fn job_result_constructors() {
        let ok = JobResult::success("a".into(), PathBuf::from("/o.mkv"), vec!["Probe".into()]);
        assert!(ok.is_success());
        assert_eq!(ok.status, JobStatus::Done);

        let failed = JobResult::failure("b".into(), "boom");
        assert!(!failed.is_success());
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.output_path.is_none());
    }

    #[test]
    fn drain_records_skips_and_failures() {
        crate::logging::init_test_tracing();
        let dir = tempdir().unwrap();
        let root = dir.path();

        let exists_in = root.join("a 1080p.mkv");
        let exists_out = root.join("a 2160p.mkv");
        fs::write(&exists_in, b"").unwrap();
        fs::write(&exists_out, b"").unwrap();

        let mut queue = JobQueue::new(&root.join("queue"));
        let skipped = JobQueueEntry::new(&exists_in, &exists_out, Priority::Critical);
        let missing = JobQueueEntry::new(root.join("b 1080p.mkv"), root.join("b 2160p.mkv"), Priority::Default);
        let (skipped_id, missing_id) = (skipped.id.clone(), missing.id.clone());
        queue.enqueue(skipped, false).unwrap();
        queue.enqueue(missing, false).unwrap();

        let results = processor(&root.join("tmp")).drain(&mut queue).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].job_id, skipped_id);

        assert_eq!(queue.get_by_id(&skipped_id).unwrap().status, JobStatus::Skipped);
        let failed = queue.get_by_id(&missing_id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error_message.as_deref().unwrap().contains("not found"));

        let reloaded = JobQueue::new(&root.join("queue"));
        assert_eq!(reloaded.jobs(), queue.jobs());
        assert_eq!(reloaded.next_pending(), None);
    }

    #[test]
    fn drain_sees_jobs_added_by_another_handle() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let qdir = root.join("queue");

        let mut worker_queue = JobQueue::new(&qdir);
        let first = JobQueueEntry::new(root.join("a 1080p.mkv"), root.join("a 2160p.mkv"), Priority::Default);
        worker_queue.enqueue(first, false).unwrap();
        worker_queue.save().unwrap();

        let mut cli_queue = JobQueue::new(&qdir);
        let second = JobQueueEntry::new(root.join("b 1080p.mkv"), root.join("b 2160p.mkv"), Priority::Low);
        let second_id = second.id.clone();
        cli_queue.enqueue(second, false).unwrap();
        cli_queue.save().unwrap();

        let results = processor(&root.join("tmp")).drain(&mut worker_queue).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].job_id, second_id);

        let reloaded = JobQueue::new(&qdir);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.jobs().iter().all(|j| j.status == JobStatus::Failed));
    }

    #[test]
    fn cancelled_processor_leaves_jobs_pending() {
        let dir = tempdir().unwrap();
        let mut queue = JobQueue::in_memory();
        queue
            .enqueue(JobQueueEntry::new("/x 1080p.mkv", "/x 2160p.mkv", Priority::Default), false)
            .unwrap();

        let processor = processor(&dir.path().join("tmp"));
        processor.cancel_handle().cancel();
        assert!(processor.drain(&mut queue).unwrap().is_empty());
        assert_eq!(queue.pending_count(), 1);
    }
}
