//! Migration progress record.
//!
//! `MigrationState` is the payload persisted by the checkpoint. It is the only
//! source of truth for which files a run has already moved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Progress of one source → destination migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationState {
    /// Root source directory
    pub source_path: PathBuf,

    /// Actual destination directory (destination / source name)
    pub destination_path: PathBuf,

    /// Bytes to migrate, fixed by the scan at job start
    pub total_size: u64,

    /// Bytes moved so far (display only)
    pub copied_size: u64,

    /// Source-relative paths already copied
    pub copied_files: BTreeSet<String>,

    /// Source-relative path -> failure reason
    #[serde(default)]
    pub failed_files: BTreeMap<String, String>,

    /// When the job was first started
    pub start_time: DateTime<Utc>,
}

impl MigrationState {
    /// Fresh state with nothing copied and `start_time` set to now.
    pub fn new(
        source_path: impl Into<PathBuf>,
        destination_path: impl Into<PathBuf>,
        total_size: u64,
    ) -> Self {
        MigrationState {
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            total_size,
            copied_size: 0,
            copied_files: BTreeSet::new(),
            failed_files: BTreeMap::new(),
            start_time: Utc::now(),
        }
    }

    /// True if this state belongs to the given source/destination pair.
    pub fn matches_paths(&self, source: &Path, destination: &Path) -> bool {
        self.source_path == source && self.destination_path == destination
    }

    pub fn is_copied(&self, relative: &str) -> bool {
        self.copied_files.contains(relative)
    }

    /// Record a successful copy of `bytes` bytes.
    ///
    /// A path is only counted once; a stale failure entry for it is dropped.
    pub fn record_copied(&mut self, relative: impl Into<String>, bytes: u64) {
        let relative = relative.into();
        self.failed_files.remove(&relative);
        if self.copied_files.insert(relative) {
            self.copied_size += bytes;
        }
    }

    /// Record a failed attempt. Ignored for paths already copied.
    pub fn record_failed(&mut self, relative: impl Into<String>, reason: impl Into<String>) {
        let relative = relative.into();
        if !self.copied_files.contains(&relative) {
            self.failed_files.insert(relative, reason.into());
        }
    }

    /// Files that were attempted, successfully or not.
    pub fn total_files(&self) -> usize {
        self.copied_files.len() + self.failed_files.len()
    }

    /// Percentage of attempted files that were copied.
    pub fn success_rate(&self) -> f64 {
        match self.total_files() {
            0 => 0.0,
            n => self.copied_files.len() as f64 / n as f64 * 100.0,
        }
    }

    /// Byte progress against the scanned budget, clamped to 100.
    pub fn progress_percent(&self) -> f64 {
        if self.total_size == 0 {
            return 100.0;
        }
        (self.copied_size as f64 / self.total_size as f64 * 100.0).min(100.0)
    }

    /// Wall-clock time since the job was first started.
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.start_time)
    }
}

/// Portable key for a source-relative path: normal components joined by `/`.
pub fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Stages of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    /// Validating paths, loading a checkpoint
    Initializing,
    /// Computing the byte budget
    Scanning,
    /// Transferring pending files
    Copying,
    /// Persisting the final checkpoint
    Finalizing,
    /// Every file copied; checkpoint removed
    Completed,
    /// Some files failed; checkpoint retained for a later resume
    CompletedWithFailures,
}

impl MigrationPhase {
    /// Returns true if no further transitions happen from this phase.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MigrationPhase::Completed | MigrationPhase::CompletedWithFailures
        )
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationPhase::Initializing => "initializing",
            MigrationPhase::Scanning => "scanning",
            MigrationPhase::Copying => "copying",
            MigrationPhase::Finalizing => "finalizing",
            MigrationPhase::Completed => "completed",
            MigrationPhase::CompletedWithFailures => "completed with failures",
        };
        f.write_str(name)
    }
}

/// Terminal status of a run that was not aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    Completed,
    CompletedWithFailures,
}

impl From<MigrationStatus> for MigrationPhase {
    fn from(status: MigrationStatus) -> Self {
        match status {
            MigrationStatus::Completed => MigrationPhase::Completed,
            MigrationStatus::CompletedWithFailures => MigrationPhase::CompletedWithFailures,
        }
    }
}
