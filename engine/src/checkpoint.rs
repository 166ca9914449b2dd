//! Durable storage for `MigrationState`.
//!
//! The checkpoint is a single JSON document. Saves go through a temp file in
//! the same directory followed by a rename, so a crash mid-write leaves either
//! the previous checkpoint or the new one, never a truncated file.

use crate::error::EngineError;
use crate::state::MigrationState;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default checkpoint location, relative to the working directory.
pub const DEFAULT_CHECKPOINT_FILE: &str = ".migration_state.json";

/// Save/load/delete of a migration checkpoint at a fixed path.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    path: PathBuf,
}

impl Checkpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Checkpoint { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Atomically replace the checkpoint with `state`.
    pub fn save(&self, state: &MigrationState) -> Result<(), EngineError> {
        let body = serde_json::to_vec_pretty(state)
            .map_err(|e| self.persistence_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        atomic_write(&self.path, &body).map_err(|e| self.persistence_error(e))?;

        tracing::debug!(
            path = %self.path.display(),
            copied = state.copied_files.len(),
            failed = state.failed_files.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    /// Load the checkpoint, or `None` if there is none.
    pub fn load(&self) -> Result<Option<MigrationState>, EngineError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.corruption_error(e.to_string())),
        };

        let state = serde_json::from_slice::<MigrationState>(&raw)
            .map_err(|e| self.corruption_error(e.to_string()))?;

        tracing::debug!(
            path = %self.path.display(),
            copied = state.copied_files.len(),
            "checkpoint loaded"
        );
        Ok(Some(state))
    }

    /// Remove the checkpoint. Failures are ignored.
    pub fn cleanup(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "checkpoint removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %e,
                    "could not remove checkpoint"
                )
            }
        }
    }

    fn persistence_error(&self, source: io::Error) -> EngineError {
        EngineError::Persistence {
            path: self.path.clone(),
            source,
        }
    }

    fn corruption_error(&self, reason: String) -> EngineError {
        EngineError::StateCorruption {
            path: self.path.clone(),
            reason,
        }
    }
}

impl Default for Checkpoint {
    fn default() -> Self {
        Checkpoint::new(DEFAULT_CHECKPOINT_FILE)
    }
}

/// Write to a uniquely named sibling temp file, fsync, then rename over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => {
            fs::create_dir_all(p)?;
            p.to_path_buf()
        }
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "checkpoint path has no file name",
            )
        })?;
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));

    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}
