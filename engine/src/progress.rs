//! Progress reporting trait.
//!
//! This module defines the ProgressCallback trait, which keeps the migration
//! engine independent of any UI technology. The CLI renders a progress line
//! and a results table from these calls; tests record them.
//!
//! All methods are called synchronously from the migration loop and default
//! to doing nothing.

use crate::error::TransferError;
use crate::migrator::MigrationReport;
use crate::state::{MigrationPhase, MigrationState};

/// Receives progress updates from a migration run.
pub trait ProgressCallback: Send + Sync {
    /// Called on every state machine transition.
    fn on_phase_changed(&self, _phase: MigrationPhase) {}

    /// Called after a fresh scan computed the byte budget.
    fn on_scan_completed(&self, _total_bytes: u64) {}

    /// Called once before the first pending file is copied.
    fn on_copy_started(&self, _state: &MigrationState, _pending_files: usize) {}

    /// Called when a file is about to be copied.
    fn on_file_started(&self, _relative: &str, _size: u64) {}

    /// Called after every chunk written for the current file.
    ///
    /// `bytes_this_file` is the running total for the current file; `state`
    /// does not yet include it.
    fn on_file_progress(&self, _relative: &str, _bytes_this_file: u64, _state: &MigrationState) {}

    /// Called when a file is done, with the byte count or the failure.
    fn on_file_completed(
        &self,
        _relative: &str,
        _result: Result<u64, &TransferError>,
        _state: &MigrationState,
    ) {
    }

    /// Called after each checkpoint write.
    fn on_checkpoint_saved(&self, _state: &MigrationState) {}

    /// Called once when the run reaches a terminal phase.
    fn on_migration_completed(&self, _report: &MigrationReport) {}
}
