//! # Migrator Engine - Resumable Project Migration
//!
//! A headless engine that copies a project directory to a new location while
//! leaving build artifacts and dependency caches behind, and that can pick up
//! exactly where it stopped after a crash or Ctrl-C.
//!
//! ## Overview
//!
//! - Include/exclude path filtering with sensible defaults for many ecosystems
//! - Progress tracking by cumulative byte size
//! - Chunked file copy with optional checksum verification
//! - Atomic checkpoint persistence for exact resumption
//! - Per-file error isolation: one bad file never aborts the run
//! - Progress reporting via callbacks (decoupled from UI technology)
//!
//! ## Basic Usage
//!
//! ```no_run
//! use migrator_engine::{MigrationConfig, Migrator};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let migrator = Migrator::new(MigrationConfig::default())?;
//!
//! // Copies /work/project into /backup/project
//! let report = migrator.migrate(Path::new("/work/project"), Path::new("/backup"), true, false)?;
//!
//! println!("{} files copied", report.state.copied_files.len());
//! for (file, reason) in &report.state.failed_files {
//!     println!("{}: {}", file, reason);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **filter**: Include/exclude decisions for source-relative paths
//! - **checksums**: Digest computation and copy verification
//! - **state**: The migration progress record and run phases
//! - **checkpoint**: Durable save/load of the progress record
//! - **fs_ops**: Tree walking and chunked file copy
//! - **scanner**: Byte budget of a filtered tree
//! - **migrator**: Run orchestration (the state machine)
//! - **progress**: Progress callback trait
//! - **config**: Migration settings
//! - **error**: Error types

pub mod checkpoint;
pub mod checksums;
pub mod config;
pub mod error;
pub mod filter;
pub mod fs_ops;
pub mod migrator;
pub mod progress;
pub mod scanner;
pub mod state;

// Re-export main types and functions
pub use checkpoint::{Checkpoint, DEFAULT_CHECKPOINT_FILE};
pub use checksums::{
    compute_file_checksum, file_digest, verify_copy, verify_copy_with, ChecksumAlgorithm,
    ChecksumValue,
};
pub use config::{MigrationConfig, DEFAULT_CHECKPOINT_INTERVAL};
pub use error::{EngineError, TransferError};
pub use filter::{PathFilter, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_INCLUDE_PATTERNS};
pub use migrator::{migrate, InterruptFlag, MigrationReport, Migrator};
pub use progress::ProgressCallback;
pub use scanner::{scan, scan_until, total_size, ScanSummary};
pub use state::{MigrationPhase, MigrationState, MigrationStatus};
