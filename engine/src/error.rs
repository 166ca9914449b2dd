//! Error types for the migration engine.
//!
//! Two layers of errors exist:
//! - `EngineError` is job-level. It stops the migration (validation, checkpoint
//!   corruption, checkpoint persistence, interruption, configuration).
//! - `TransferError` is file-level. It is recorded in the state's failure map
//!   and the migration moves on to the next file.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a migration run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source directory does not exist
    #[error("Source directory not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Source exists but is a file (or something else)
    #[error("Source is not a directory: {}", path.display())]
    SourceNotADirectory { path: PathBuf },

    /// Source directory cannot be inspected (permissions)
    #[error("Source directory access denied: {}", path.display())]
    SourceAccessDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Destination path cannot be made absolute
    #[error("Invalid destination {}: {source}", path.display())]
    DestinationInvalid {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Checkpoint file exists but cannot be read back
    #[error("Checkpoint {} is unreadable: {reason}", path.display())]
    StateCorruption { path: PathBuf, reason: String },

    /// Checkpoint could not be written; progress tracking is unreliable
    #[error("Failed to save checkpoint {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Interrupt signal observed; progress was saved before stopping
    #[error("Migration interrupted (checkpoint: {})", checkpoint.display())]
    Interrupted { checkpoint: PathBuf },

    /// Configuration file or values are invalid
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl EngineError {
    /// True for validation failures (nothing was attempted, no state created).
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. }
                | Self::SourceNotADirectory { .. }
                | Self::SourceAccessDenied { .. }
                | Self::DestinationInvalid { .. }
        )
    }

    /// True if the run stopped because of an interrupt signal.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// Per-file failures. These never abort a migration.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Failed to read from source file
    #[error("Failed to read {}: {source}", path.display())]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write to destination file
    #[error("Failed to write {}: {source}", path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to create a destination directory
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Copy finished but source and destination digests differ
    #[error(
        "Checksum verification failed for {}: source and destination differ",
        path.display()
    )]
    VerificationFailed { path: PathBuf },

    /// Copy stopped at a chunk boundary because an interrupt was raised
    #[error("Copy of {} stopped by interrupt", path.display())]
    Interrupted { path: PathBuf },
}

impl TransferError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::DirectoryCreationFailed { source, .. } => source.raw_os_error(),
            Self::VerificationFailed { .. } | Self::Interrupted { .. } => None,
        }
    }
}
