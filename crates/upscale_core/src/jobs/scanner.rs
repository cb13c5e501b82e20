//! Library scanner: finds HD episodes that have no UHD counterpart yet.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use walkdir::{DirEntry, WalkDir};

use super::naming::{is_hd, is_uhd, season_episode, uhd_name};
use super::types::Priority;

/// Marker file that opts a directory tree into upscaling.
pub const MARKER_FILE: &str = ".upscale";

/// Files modified this recently are queued as critical.
pub const RECENT_WINDOW: Duration = Duration::from_secs(6 * 60 * 60);

/// An HD file that should be upscaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub input: PathBuf,
    pub output: PathBuf,
    pub priority: Priority,
}

#[derive(Debug, Clone)]
pub struct Scanner {
    root: PathBuf,
    now: SystemTime,
}

#[derive(Default)]
struct Episode {
    hd: Option<PathBuf>,
    has_uhd: bool,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            now: SystemTime::now(),
        }
    }

    /// Reference time for the recency check.
    pub fn with_now(mut self, now: SystemTime) -> Self {
        self.now = now;
        self
    }

    /// Walk the tree and collect candidates.
    ///
    /// A directory holding a marker file, and everything below it, is
    /// active. Dot entries are skipped. Each directory's candidates come
    /// before its subdirectories', which are visited in name order.
    pub fn scan(&self) -> io::Result<Vec<Candidate>> {
        let mut active: HashSet<PathBuf> = HashSet::new();
        let mut by_dir: BTreeMap<PathBuf, Vec<(String, PathBuf)>> = BTreeMap::new();

        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() > 0 => {
                    tracing::warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let path = entry.path();
            let parent_active = path.parent().is_some_and(|p| active.contains(p));

            if entry.file_type().is_dir() {
                let marked = path.join(MARKER_FILE).is_file();
                if marked && !parent_active {
                    tracing::info!("Marker file {} found in {}", MARKER_FILE, path.display());
                }
                if marked || parent_active {
                    active.insert(path.to_path_buf());
                }
                continue;
            }

            if !parent_active || !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !name.ends_with(".mkv") {
                continue;
            }
            if let Some(dir) = path.parent() {
                by_dir
                    .entry(dir.to_path_buf())
                    .or_default()
                    .push((name.into_owned(), path.to_path_buf()));
            }
        }

        // Path order puts a directory before its children.
        Ok(by_dir
            .into_values()
            .flat_map(|files| self.candidates(files))
            .collect())
    }

    fn candidates(&self, files: Vec<(String, PathBuf)>) -> Vec<Candidate> {
        let mut episodes: BTreeMap<String, Episode> = BTreeMap::new();

        for (name, path) in files {
            let Some(key) = season_episode(&name) else {
                continue;
            };
            let episode = episodes.entry(key).or_default();
            if is_hd(&name) {
                if let Some(prev) = &episode.hd {
                    tracing::debug!(
                        "Duplicate HD file for episode: {} and {}",
                        prev.display(),
                        path.display()
                    );
                }
                episode.hd = Some(path);
            } else if is_uhd(&name) {
                episode.has_uhd = true;
            }
        }

        let mut found: Vec<Candidate> = episodes
            .into_values()
            .filter(|e| !e.has_uhd)
            .filter_map(|e| e.hd)
            .map(|input| Candidate {
                output: uhd_name(&input),
                priority: self.priority_for(&input),
                input,
            })
            .collect();
        found.sort_by(|a, b| a.input.cmp(&b.input));
        found
    }

    fn priority_for(&self, path: &Path) -> Priority {
        let modified = fs::metadata(path).and_then(|m| m.modified());
        match modified {
            Ok(mtime) => match self.now.duration_since(mtime) {
                Ok(age) if age > RECENT_WINDOW => Priority::Default,
                _ => Priority::Critical,
            },
            Err(e) => {
                tracing::warn!("Cannot read mtime of {}: {}", path.display(), e);
                Priority::Default
            }
        }
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().as_encoded_bytes().first() == Some(&b'.')
}
