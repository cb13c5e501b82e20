//! Upscale job queue and library scanning.
//!
//! Jobs are kept in a JSON file in the queue folder. The scanner and the
//! `add` command feed it; the worker drains it through
//! [`crate::orchestrator::QueueProcessor`].

mod naming;
mod queue;
mod scanner;
mod types;

pub use naming::{derive_output, is_hd, is_uhd, season_episode, uhd_name, NamingError};
pub use queue::{JobQueue, QueueError, QUEUE_FILE};
pub use scanner::{Candidate, Scanner, MARKER_FILE, RECENT_WINDOW};
pub use types::{job_id, JobQueueEntry, JobStatus, Priority};
