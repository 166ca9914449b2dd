//! smart-migrate - Command-line interface for the migration engine.
//!
//! Parses arguments, installs logging, turns Ctrl-C into an engine interrupt,
//! renders progress to stderr and maps the outcome to an exit status.

use clap::Parser;
use migrator_engine::{
    ChecksumAlgorithm, EngineError, InterruptFlag, MigrationConfig, MigrationPhase,
    MigrationReport, MigrationState, Migrator, ProgressCallback, TransferError,
};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// smart-migrate - copy a project without its build artifacts, resumably
#[derive(Parser, Debug)]
#[command(name = "smart-migrate")]
#[command(version)]
#[command(about = "Copy a project directory, skipping build artifacts and dependency caches")]
#[command(after_help = "Examples:\n  \
    smart-migrate ~/work/app /mnt/backup\n  \
    smart-migrate ~/work/app /mnt/backup --resume\n  \
    smart-migrate ~/work/app /mnt/backup --verbose --verify")]
struct Args {
    /// Source directory to migrate
    source: PathBuf,

    /// Destination directory (the source directory is placed inside it)
    destination: PathBuf,

    /// Resume from a previous checkpoint for the same paths
    #[arg(long)]
    resume: bool,

    /// Verify checksums after copying (slower but more reliable)
    #[arg(long)]
    verify: bool,

    /// Checksum algorithm for verification: crc32, md5, sha256, blake3
    #[arg(long, value_name = "ALGORITHM", requires = "verify")]
    hash: Option<String>,

    /// Checkpoint file location
    #[arg(long, value_name = "PATH")]
    checkpoint: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Extra exclude token (repeatable): name, `*.ext` or `prefix*`
    #[arg(long, value_name = "TOKEN")]
    exclude: Vec<String>,

    /// Extra include token (repeatable); always wins over excludes
    #[arg(long, value_name = "TOKEN")]
    include: Vec<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

/// How a CLI run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    CompletedWithFailures,
    Fatal,
    Interrupted,
}

impl Outcome {
    fn exit_code(self) -> i32 {
        match self {
            Outcome::Success => 0,
            Outcome::CompletedWithFailures => 1,
            Outcome::Fatal => 2,
            Outcome::Interrupted => 130,
        }
    }
}

/// CLI implementation of ProgressCallback for displaying migration progress
struct CliProgress {
    verbose: bool,
    last_progress_update: Mutex<Instant>,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            // Allow the first update to print immediately
            last_progress_update: Mutex::new(
                Instant::now()
                    .checked_sub(Duration::from_secs(1))
                    .unwrap_or_else(Instant::now),
            ),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn print_progress_bar(percent: u32) -> String {
        let filled = (percent.min(100) / 5) as usize;
        let empty = 20 - filled;
        format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(empty), percent)
    }

    fn print_results(report: &MigrationReport) {
        let state = &report.state;
        let elapsed = state.elapsed().to_std().unwrap_or_default();
        let started = state.start_time.with_timezone(&chrono::Local);

        eprintln!();
        eprintln!("Migration Results");
        eprintln!("  {:<22}{}", "Total Files", state.total_files());
        eprintln!("  {:<22}{}", "Copied Successfully", state.copied_files.len());
        eprintln!("  {:<22}{}", "Failed", state.failed_files.len());
        eprintln!("  {:<22}{:.1}%", "Success Rate", state.success_rate());
        eprintln!("  {:<22}{}", "Total Size", Self::format_bytes(state.total_size));
        eprintln!("  {:<22}{}", "Copied Size", Self::format_bytes(state.copied_size));
        eprintln!("  {:<22}{}", "Started", started.format("%Y-%m-%d %H:%M:%S"));
        eprintln!("  {:<22}{}", "Duration", Self::format_duration(elapsed));

        if !state.failed_files.is_empty() {
            eprintln!();
            eprintln!("Failed files:");
            for (file, reason) in &state.failed_files {
                eprintln!("  {}: {}", file, reason);
            }
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_phase_changed(&self, phase: MigrationPhase) {
        match phase {
            MigrationPhase::Scanning => eprintln!("Calculating total size..."),
            MigrationPhase::Finalizing if self.verbose => eprintln!("\nSaving final checkpoint..."),
            phase if phase.is_terminal() => tracing::info!(%phase, "migration finished"),
            _ => {}
        }
    }

    fn on_scan_completed(&self, total_bytes: u64) {
        eprintln!("Total size: {}", Self::format_bytes(total_bytes));
    }

    fn on_copy_started(&self, state: &MigrationState, pending_files: usize) {
        if state.copied_files.is_empty() {
            eprintln!("Copying {} files...", pending_files);
        } else {
            eprintln!(
                "Copying {} files ({} already copied)...",
                pending_files,
                state.copied_files.len()
            );
        }
    }

    fn on_file_started(&self, relative: &str, size: u64) {
        if self.verbose {
            eprintln!("Starting: {} ({})", relative, Self::format_bytes(size));
        }
    }

    fn on_file_progress(&self, _relative: &str, bytes_this_file: u64, state: &MigrationState) {
        // Throttle progress updates to avoid spam (max once per 200ms)
        let Ok(mut last) = self.last_progress_update.lock() else {
            return;
        };
        if last.elapsed().as_millis() < 200 {
            return;
        }
        *last = Instant::now();

        let copied = state.copied_size + bytes_this_file;
        let total = state.total_size.max(1);
        let percent = (copied as f64 / total as f64 * 100.0) as u32;

        eprint!(
            "\rProgress: {} | {}/{}",
            Self::print_progress_bar(percent),
            Self::format_bytes(copied),
            Self::format_bytes(state.total_size)
        );
        let _ = std::io::Write::flush(&mut std::io::stderr());
    }

    fn on_file_completed(
        &self,
        relative: &str,
        result: Result<u64, &TransferError>,
        _state: &MigrationState,
    ) {
        if self.verbose {
            match result {
                Ok(bytes) => eprintln!("Done: {} ({})", relative, Self::format_bytes(bytes)),
                Err(e) => eprintln!("Failed: {}: {}", relative, e),
            }
        }
    }

    fn on_checkpoint_saved(&self, state: &MigrationState) {
        if self.verbose {
            eprintln!("Checkpoint saved ({} files)", state.copied_files.len());
        }
    }

    fn on_migration_completed(&self, report: &MigrationReport) {
        if report.copied_this_run == 0 && report.failed_this_run == 0 {
            eprintln!("All files already copied!");
        }
        Self::print_results(report);
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(msg) = init_logging(&args) {
        eprintln!("Error: {}", msg);
        std::process::exit(Outcome::Fatal.exit_code());
    }

    let interrupt = InterruptFlag::new();
    let watcher = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received, saving progress...");
            tracing::warn!("ctrl-c received; stopping at the next chunk boundary");
            watcher.interrupt();
        }
    });

    let outcome = match tokio::task::spawn_blocking(move || run_cli(&args, interrupt)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "migration worker failed");
            eprintln!("Error: migration worker failed: {}", e);
            Outcome::Fatal
        }
    };

    std::process::exit(outcome.exit_code());
}

fn init_logging(args: &Args) -> Result<(), String> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| format!("invalid log filter: {}", e))?;

    let builder = fmt().with_env_filter(filter).with_target(false);

    let installed = match &args.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file {}: {}", path.display(), e))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    installed.map_err(|e| format!("cannot install logger: {}", e))?;
    tracing::debug!(
        level,
        log_file = ?args.log_file,
        "logging initialized"
    );
    Ok(())
}

/// Merge the config file (if any) with command-line overrides.
fn build_config(args: &Args) -> Result<MigrationConfig, String> {
    let mut config = match &args.config {
        Some(path) => MigrationConfig::from_file(path).map_err(|e| e.to_string())?,
        None => MigrationConfig::default(),
    };

    if let Some(path) = &args.checkpoint {
        config.checkpoint_path = path.clone();
    }
    if let Some(hash) = &args.hash {
        config.checksum_algorithm = hash.parse::<ChecksumAlgorithm>()?;
    }
    config.additional_exclude.extend(args.exclude.iter().cloned());
    config.additional_include.extend(args.include.iter().cloned());

    Ok(config)
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args, interrupt: InterruptFlag) -> Outcome {
    let config = match build_config(args) {
        Ok(config) => config,
        Err(msg) => {
            tracing::error!(error = %msg, "cannot build configuration");
            eprintln!("Error: {}", msg);
            return Outcome::Fatal;
        }
    };

    let migrator = match Migrator::new(config) {
        Ok(m) => m
            .with_progress(Arc::new(CliProgress::new(args.verbose)))
            .with_interrupt(interrupt),
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            eprintln!("Error: {}", e);
            return Outcome::Fatal;
        }
    };
    let checkpoint_path = migrator.checkpoint().path().to_path_buf();

    eprintln!("Smart File Migration Tool");
    eprintln!("  Source: {}", args.source.display());
    eprintln!("  Destination: {}", args.destination.display());
    eprintln!("  Resume: {}", if args.resume { "Yes" } else { "No" });
    eprintln!(
        "  Verify: {}",
        if args.verify {
            format!("Yes ({})", migrator.config().checksum_algorithm)
        } else {
            "No".to_string()
        }
    );
    if args.verbose {
        eprintln!("  Checkpoint: {}", checkpoint_path.display());
        eprintln!(
            "  Exclude tokens: {}",
            migrator
                .filter()
                .exclude_patterns()
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    eprintln!();

    match migrator.migrate(&args.source, &args.destination, args.resume, args.verify) {
        Ok(report) if report.is_success() => {
            eprintln!();
            eprintln!("Migration completed successfully!");
            Outcome::Success
        }
        Ok(_) => {
            eprintln!();
            eprintln!("Migration completed with errors");
            eprintln!(
                "Progress kept in {}; rerun with --resume to retry failed files",
                checkpoint_path.display()
            );
            Outcome::CompletedWithFailures
        }
        Err(e @ EngineError::Interrupted { .. }) => {
            tracing::warn!(checkpoint = %checkpoint_path.display(), "migration interrupted");
            eprintln!();
            eprintln!("Migration interrupted by user");
            eprintln!("{}", e);
            eprintln!("You can resume later using --resume flag");
            Outcome::Interrupted
        }
        Err(e) => {
            tracing::error!(error = %e, "migration aborted");
            eprintln!("Error: {}", e);
            Outcome::Fatal
        }
    }
}
