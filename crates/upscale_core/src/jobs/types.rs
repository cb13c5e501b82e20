//! Job queue types.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Queue priority. Ordered from most to least urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    #[default]
    Default,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::Default => "default",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "critical" => Ok(Priority::Critical),
            "default" => Ok(Priority::Default),
            "low" => Ok(Priority::Low),
            other => Err(format!(
                "unknown priority '{}' (expected critical, default or low)",
                other
            )),
        }
    }
}

/// Status of a job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Done,
    /// The output already existed when the job ran.
    Skipped,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Done => "Done",
            Self::Skipped => "Skipped",
            Self::Failed => "Failed",
        }
    }

    /// Whether the job will not run again without intervention.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped | Self::Failed)
    }
}

/// A single upscale job in the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobQueueEntry {
    pub id: String,
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
    /// RFC 3339 timestamp.
    pub added_at: String,
}

impl JobQueueEntry {
    /// New pending job; the id is derived from `output`.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, priority: Priority) -> Self {
        let output = output.into();
        Self {
            id: job_id(&output),
            input: input.into(),
            output,
            priority,
            status: JobStatus::Pending,
            error_message: None,
            added_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Output file name for display.
    pub fn name(&self) -> String {
        self.output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.output.to_string_lossy().into_owned())
    }
}

/// Stable job id for an output path.
///
/// The output's file name with every run of non-alphanumeric characters
/// replaced by `_`, a dash, and the first 12 hex digits of the SHA-256 of the
/// full path.
pub fn job_id(output: &Path) -> String {
    let base = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut name = String::with_capacity(base.len());
    let mut in_run = false;
    for c in base.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c);
            in_run = false;
        } else if !in_run {
            name.push('_');
            in_run = true;
        }
    }

    let digest = Sha256::digest(output.to_string_lossy().as_bytes());
    let hex: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", name, hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_most_urgent_first() {
        assert!(Priority::Critical < Priority::Default);
        assert!(Priority::Default < Priority::Low);
        assert_eq!("critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert!("high".parse::<Priority>().is_err());
        assert_eq!(Priority::Low.to_string(), "low");
    }

    #[test]
    fn job_id_is_sanitized_and_stable() {
        let out = Path::new("/media/Show/Show - S01E01 [2160p].mkv");
        let id = job_id(out);
        let (name, hash) = id.rsplit_once('-').unwrap();
        assert_eq!(name, "Show_S01E01_2160p_mkv");
        assert_eq!(hash.len(), 12);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, job_id(out));
    }

    #[test]
    fn job_id_differs_by_directory() {
        let a = job_id(Path::new("/a/ep.mkv"));
        let b = job_id(Path::new("/b/ep.mkv"));
        assert_ne!(a, b);
        assert!(a.starts_with("ep_mkv-"));
    }

    #[test]
    fn entry_serializes_lowercase_enums() {
        let entry = JobQueueEntry::new("/in 1080p.mkv", "/in 2160p.mkv", Priority::Critical);
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"priority\":\"critical\""));
        assert!(json.contains("\"status\":\"pending\""));
        assert!(!json.contains("error_message"));
        assert_eq!(entry.name(), "in 2160p.mkv");
    }
}
