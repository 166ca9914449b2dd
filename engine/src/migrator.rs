//! Migration orchestration.
//!
//! `Migrator::migrate` drives one run through
//! `Initializing → Scanning → Copying → Finalizing → Completed | CompletedWithFailures`.
//! Resuming only changes whether `Initializing` ends with a loaded checkpoint
//! instead of a fresh scan.
//!
//! Individual file errors are recorded in the state and never stop the run.
//! Checkpoint write failures, validation failures and interrupts do.

use crate::checkpoint::Checkpoint;
use crate::checksums;
use crate::config::MigrationConfig;
use crate::error::{EngineError, TransferError};
use crate::filter::PathFilter;
use crate::fs_ops::{self, SourceFile};
use crate::progress::ProgressCallback;
use crate::scanner;
use crate::state::{MigrationPhase, MigrationState, MigrationStatus};
use std::fs;
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle used to ask a running migration to stop.
///
/// The migrator polls it while walking the tree and after every copied
/// chunk; once raised, the checkpoint is saved and `migrate` returns
/// `EngineError::Interrupted`.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a migration run that reached a terminal phase.
#[derive(Debug, Clone)]
pub struct MigrationReport {
    pub status: MigrationStatus,
    /// Final state snapshot
    pub state: MigrationState,
    /// True if the run continued from a checkpoint
    pub resumed: bool,
    /// Files copied by this run alone
    pub copied_this_run: usize,
    /// Files that failed in this run
    pub failed_this_run: usize,
}

impl MigrationReport {
    /// True when every file was copied and the checkpoint was removed.
    pub fn is_success(&self) -> bool {
        self.status == MigrationStatus::Completed
    }
}

/// Runs resumable migrations with one configuration.
pub struct Migrator {
    config: MigrationConfig,
    filter: PathFilter,
    checkpoint: Checkpoint,
    progress: Option<Arc<dyn ProgressCallback>>,
    interrupt: InterruptFlag,
}

impl Migrator {
    /// Create a migrator. Fails if the configuration is invalid.
    pub fn new(config: MigrationConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Migrator {
            filter: config.build_filter(),
            checkpoint: Checkpoint::new(config.checkpoint_path.clone()),
            config,
            progress: None,
            interrupt: InterruptFlag::new(),
        })
    }

    /// Attach a progress observer.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Share an interrupt flag with the caller (e.g. a Ctrl-C handler).
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn filter(&self) -> &PathFilter {
        &self.filter
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    /// Copy `source` into `destination / source-name`, skipping excluded paths.
    ///
    /// With `resume`, continues from a checkpoint recorded for the same paths.
    /// With `verify`, each copy is checked against the source digest and a
    /// mismatch counts as a failure for that file.
    ///
    /// # Errors
    /// Validation, checkpoint corruption/persistence and interruption. Per-file
    /// failures are reported through `MigrationReport`.
    pub fn migrate(
        &self,
        source: &Path,
        destination: &Path,
        resume: bool,
        verify: bool,
    ) -> Result<MigrationReport, EngineError> {
        self.enter(MigrationPhase::Initializing);
        let source = validate_source(source)?;
        let destination = resolve_path(destination).map_err(|e| EngineError::DestinationInvalid {
            path: destination.to_path_buf(),
            source: e,
        })?;
        let actual_destination = nested_destination(&source, &destination);
        let checkpoint_entry = self.checkpoint_entry(&source);
        let exclude =
            |p: &Path| self.filter.should_exclude(p) || checkpoint_entry.as_deref() == Some(p);
        let stop = || self.interrupt.is_interrupted();

        tracing::info!(
            source = %source.display(),
            destination = %actual_destination.display(),
            resume,
            verify,
            "starting migration"
        );

        let loaded = if resume {
            self.load_resumable(&source, &actual_destination)?
        } else {
            None
        };
        let resumed = loaded.is_some();

        let mut state = match loaded {
            Some(state) => state,
            None => {
                self.enter(MigrationPhase::Scanning);
                let Some(summary) = scanner::scan_until(&source, exclude, stop) else {
                    tracing::warn!("interrupt received during scan; nothing copied yet");
                    return Err(EngineError::Interrupted {
                        checkpoint: self.checkpoint.path().to_path_buf(),
                    });
                };
                let total = summary.total_bytes;
                self.notify(|cb| cb.on_scan_completed(total));
                MigrationState::new(source.clone(), actual_destination.clone(), total)
            }
        };

        self.enter(MigrationPhase::Copying);
        let Some(pending) = self.pending_files(&source, &state, exclude, stop) else {
            return Err(self.interrupted(&state));
        };
        // Every earlier failure is pending again and gets a fresh attempt.
        state.failed_files.clear();

        if pending.is_empty() {
            tracing::info!("all files already copied");
            self.checkpoint.cleanup();
            return Ok(self.finish(MigrationStatus::Completed, state, resumed, 0, 0));
        }

        tracing::info!(
            pending = pending.len(),
            already_copied = state.copied_files.len(),
            "copying files"
        );
        self.notify(|cb| cb.on_copy_started(&state, pending.len()));

        let interval = self.config.checkpoint_interval;
        let mut copied_this_run = 0;
        let mut failed_this_run = 0;

        for file in &pending {
            if self.interrupt.is_interrupted() {
                return Err(self.interrupted(&state));
            }

            let key = file.key();
            let dest_path = actual_destination.join(&file.relative);
            self.notify(|cb| cb.on_file_started(&key, file.size));

            match self.transfer(file, &dest_path, &key, verify, &state) {
                Ok(bytes) => {
                    state.record_copied(key.clone(), bytes);
                    copied_this_run += 1;
                    tracing::debug!(file = %key, bytes, "copied");
                    self.notify(|cb| cb.on_file_completed(&key, Ok(bytes), &state));

                    if copied_this_run % interval == 0 {
                        self.save(&state)?;
                    }
                }
                Err(TransferError::Interrupted { .. }) => {
                    return Err(self.interrupted(&state));
                }
                Err(e) => {
                    tracing::error!(file = %key, error = %e, "failed to copy");
                    state.record_failed(key.clone(), e.to_string());
                    failed_this_run += 1;
                    self.notify(|cb| cb.on_file_completed(&key, Err(&e), &state));
                }
            }
        }

        if stop() {
            return Err(self.interrupted(&state));
        }

        self.enter(MigrationPhase::Finalizing);
        self.save(&state)?;

        let status = if state.failed_files.is_empty() {
            self.checkpoint.cleanup();
            MigrationStatus::Completed
        } else {
            tracing::warn!(
                failed = state.failed_files.len(),
                checkpoint = %self.checkpoint.path().display(),
                "migration finished with failures; checkpoint kept for resume"
            );
            MigrationStatus::CompletedWithFailures
        };

        Ok(self.finish(status, state, resumed, copied_this_run, failed_this_run))
    }

    /// Load the checkpoint if it was recorded for these exact paths.
    fn load_resumable(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<Option<MigrationState>, EngineError> {
        match self.checkpoint.load()? {
            Some(state) if state.matches_paths(source, destination) => {
                tracing::info!(
                    copied = state.copied_files.len(),
                    failed = state.failed_files.len(),
                    "resuming from checkpoint"
                );
                Ok(Some(state))
            }
            Some(state) => {
                tracing::warn!(
                    recorded_source = %state.source_path.display(),
                    recorded_destination = %state.destination_path.display(),
                    "checkpoint belongs to a different migration; starting fresh"
                );
                Ok(None)
            }
            None => {
                tracing::info!("no checkpoint found; starting fresh");
                Ok(None)
            }
        }
    }

    /// Non-excluded files under `source` not yet recorded as copied, or
    /// `None` if the walk was interrupted.
    fn pending_files<F, C>(
        &self,
        source: &Path,
        state: &MigrationState,
        exclude: F,
        stop: C,
    ) -> Option<Vec<SourceFile>>
    where
        F: Fn(&Path) -> bool,
        C: Fn() -> bool,
    {
        let files = fs_ops::walk_files(source, exclude, |_, _| {}, stop)?;
        Some(
            files
                .into_iter()
                .filter(|f| !state.is_copied(&f.key()))
                .collect(),
        )
    }

    /// Location of the checkpoint relative to `source`, if it lives inside it.
    fn checkpoint_entry(&self, source: &Path) -> Option<PathBuf> {
        let checkpoint = resolve_path(self.checkpoint.path()).ok()?;
        checkpoint.strip_prefix(source).ok().map(Path::to_path_buf)
    }

    /// Copy one file and optionally verify it.
    fn transfer(
        &self,
        file: &SourceFile,
        dest_path: &Path,
        key: &str,
        verify: bool,
        state: &MigrationState,
    ) -> Result<u64, TransferError> {
        let bytes = fs_ops::copy_file_chunked(&file.path, dest_path, |n| {
            self.notify(|cb| cb.on_file_progress(key, n, state));
            if self.interrupt.is_interrupted() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;

        if verify
            && !checksums::verify_copy_with(&file.path, dest_path, self.config.checksum_algorithm)
        {
            return Err(TransferError::VerificationFailed {
                path: file.path.clone(),
            });
        }

        Ok(bytes)
    }

    fn save(&self, state: &MigrationState) -> Result<(), EngineError> {
        self.checkpoint.save(state)?;
        self.notify(|cb| cb.on_checkpoint_saved(state));
        Ok(())
    }

    /// Save what we have and build the error that stops the run.
    fn interrupted(&self, state: &MigrationState) -> EngineError {
        tracing::warn!(
            copied = state.copied_files.len(),
            "interrupt received; saving checkpoint"
        );
        if let Err(e) = self.save(state) {
            tracing::error!(error = %e, "could not save checkpoint after interrupt");
        }
        EngineError::Interrupted {
            checkpoint: self.checkpoint.path().to_path_buf(),
        }
    }

    fn finish(
        &self,
        status: MigrationStatus,
        state: MigrationState,
        resumed: bool,
        copied_this_run: usize,
        failed_this_run: usize,
    ) -> MigrationReport {
        let phase = MigrationPhase::from(status);
        debug_assert!(phase.is_terminal());
        self.enter(phase);
        let report = MigrationReport {
            status,
            state,
            resumed,
            copied_this_run,
            failed_this_run,
        };
        tracing::info!(
            status = ?report.status,
            copied = report.state.copied_files.len(),
            failed = report.state.failed_files.len(),
            bytes = report.state.copied_size,
            "migration finished"
        );
        self.notify(|cb| cb.on_migration_completed(&report));
        report
    }

    fn enter(&self, phase: MigrationPhase) {
        tracing::debug!(%phase, "phase");
        self.notify(|cb| cb.on_phase_changed(phase));
    }

    fn notify<F: FnOnce(&dyn ProgressCallback)>(&self, f: F) {
        if let Some(cb) = &self.progress {
            f(cb.as_ref());
        }
    }
}

/// Run a migration with the default configuration and no observer.
///
/// Returns whether every file was copied.
pub fn migrate(
    source: &Path,
    destination: &Path,
    resume: bool,
    verify: bool,
) -> Result<bool, EngineError> {
    let report = Migrator::new(MigrationConfig::default())?
        .migrate(source, destination, resume, verify)?;
    Ok(report.is_success())
}

/// Ensure `source` is an existing directory and return its canonical form.
fn validate_source(source: &Path) -> Result<PathBuf, EngineError> {
    match fs::metadata(source) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => {
            return Err(EngineError::SourceNotADirectory {
                path: source.to_path_buf(),
            })
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(EngineError::SourceNotFound {
                path: source.to_path_buf(),
            })
        }
        Err(e) => {
            return Err(EngineError::SourceAccessDenied {
                path: source.to_path_buf(),
                source: e,
            })
        }
    }

    fs::canonicalize(source).map_err(|e| EngineError::SourceAccessDenied {
        path: source.to_path_buf(),
        source: e,
    })
}

/// Absolute form of `path` with every existing ancestor canonicalized.
///
/// Spellings such as `./out`, `/abs/out` and `/abs/src/../out` resolve to the
/// same path whether or not the leaf exists yet.
fn resolve_path(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut existing = absolute.as_path();
    let mut missing = Vec::new();

    loop {
        if let Ok(mut resolved) = fs::canonicalize(existing) {
            resolved.extend(missing.iter().rev());
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}

/// The source directory always lands one level under the destination.
fn nested_destination(source: &Path, destination: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) => destination.join(name),
        // Filesystem root has no name
        None => destination.join("root"),
    }
}
