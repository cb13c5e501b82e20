//! Persistent upscale job queue.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{JobQueueEntry, JobStatus};

/// File the queue is persisted to inside the queue folder.
pub const QUEUE_FILE: &str = "queue.json";

const QUEUE_VERSION: u32 = 1;

/// Errors from queue operations.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Job '{id}' is already queued ({status}); use force to replace it")]
    Conflict { id: String, status: &'static str },

    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error("Failed to write queue file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to serialize queue: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueState {
    version: u32,
    jobs: Vec<JobQueueEntry>,
}

/// Job queue kept in memory and saved to `queue.json`.
#[derive(Debug)]
pub struct JobQueue {
    jobs: Vec<JobQueueEntry>,
    queue_file: PathBuf,
}

impl JobQueue {
    /// Open the queue stored in `queue_folder`, starting empty if none exists.
    ///
    /// An unreadable queue file is logged and replaced on the next save.
    pub fn new(queue_folder: &Path) -> Self {
        let queue_file = queue_folder.join(QUEUE_FILE);
        Self {
            jobs: load_jobs(&queue_file),
            queue_file,
        }
    }

    /// Queue that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            jobs: Vec::new(),
            queue_file: PathBuf::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.queue_file
    }

    /// Persist the queue via a temp file and rename.
    pub fn save(&self) -> Result<(), QueueError> {
        if self.queue_file.as_os_str().is_empty() {
            return Ok(());
        }

        let io_err = |source| QueueError::Io {
            path: self.queue_file.clone(),
            source,
        };

        if let Some(parent) = self.queue_file.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let state = QueueState {
            version: QUEUE_VERSION,
            jobs: self.jobs.clone(),
        };
        let json = serde_json::to_string_pretty(&state)?;

        let temp_file = self.queue_file.with_extension("json.tmp");
        fs::write(&temp_file, json).map_err(io_err)?;
        fs::rename(&temp_file, &self.queue_file).map_err(io_err)?;

        tracing::debug!("Saved {} jobs to {}", self.jobs.len(), QUEUE_FILE);
        Ok(())
    }

    /// Replace the in-memory jobs with the current contents of the file.
    pub fn reload(&mut self) {
        if self.queue_file.as_os_str().is_empty() {
            return;
        }
        self.jobs = load_jobs(&self.queue_file);
    }

    /// Re-read the file, apply `change`, then save.
    ///
    /// The CLI and a running worker share `queue.json`; entries written by
    /// the other side since this queue was loaded are kept.
    pub fn update<T>(
        &mut self,
        change: impl FnOnce(&mut Self) -> Result<T, QueueError>,
    ) -> Result<T, QueueError> {
        self.reload();
        let value = change(self)?;
        self.save()?;
        Ok(value)
    }

    pub fn jobs(&self) -> &[JobQueueEntry] {
        &self.jobs
    }

    pub fn get_by_id(&self, id: &str) -> Option<&JobQueueEntry> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn get_by_id_mut(&mut self, id: &str) -> Option<&mut JobQueueEntry> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Add a job.
    ///
    /// A job with the same id is a conflict unless `force` is set, in which
    /// case the old entry is dropped and the new one goes to the back.
    pub fn enqueue(&mut self, entry: JobQueueEntry, force: bool) -> Result<(), QueueError> {
        if let Some(pos) = self.jobs.iter().position(|j| j.id == entry.id) {
            if !force {
                return Err(QueueError::Conflict {
                    id: entry.id,
                    status: self.jobs[pos].status.as_str(),
                });
            }
            tracing::info!("Replacing queued job {}", entry.id);
            self.jobs.remove(pos);
        }

        tracing::info!(
            "Enqueued {} ({}) -> {}",
            entry.id,
            entry.priority,
            entry.output.display()
        );
        self.jobs.push(entry);
        Ok(())
    }

    /// Remove a job by id.
    pub fn remove(&mut self, id: &str) -> Result<JobQueueEntry, QueueError> {
        let pos = self
            .jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        Ok(self.jobs.remove(pos))
    }

    /// Id of the next job to run: most urgent priority, oldest first.
    pub fn next_pending(&self) -> Option<String> {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by_key(|j| j.priority)
            .map(|j| j.id.clone())
    }

    /// Count of jobs still waiting to run.
    pub fn pending_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count()
    }

    pub fn set_status(&mut self, id: &str, status: JobStatus) -> Result<(), QueueError> {
        let job = self
            .get_by_id_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        job.status = status;
        if status != JobStatus::Failed {
            job.error_message = None;
        }
        Ok(())
    }

    /// Mark a job failed with a message.
    pub fn set_error(&mut self, id: &str, message: impl Into<String>) -> Result<(), QueueError> {
        let job = self
            .get_by_id_mut(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        job.status = JobStatus::Failed;
        job.error_message = Some(message.into());
        Ok(())
    }

    /// Return jobs left `Running` by an interrupted worker to `Pending`.
    pub fn requeue_interrupted(&mut self) -> usize {
        let mut count = 0;
        for job in self.jobs.iter_mut().filter(|j| j.status == JobStatus::Running) {
            tracing::warn!("Requeueing interrupted job {}", job.id);
            job.status = JobStatus::Pending;
            count += 1;
        }
        count
    }

    /// Drop finished jobs. Returns how many were removed.
    pub fn clear_finished(&mut self) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|j| !j.status.is_finished());
        before - self.jobs.len()
    }
}

fn load_jobs(queue_file: &Path) -> Vec<JobQueueEntry> {
    if !queue_file.exists() {
        return Vec::new();
    }
    let content = match fs::read_to_string(queue_file) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", queue_file.display(), e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<QueueState>(&content) {
        Ok(state) => {
            tracing::debug!("Loaded {} jobs from {}", state.jobs.len(), QUEUE_FILE);
            state.jobs
        }
        Err(e) => {
            tracing::warn!("Failed to parse {}: {}", queue_file.display(), e);
            Vec::new()
        }
    }
}
