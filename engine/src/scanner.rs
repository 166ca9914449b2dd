//! Byte budget of a source tree.

use crate::fs_ops::walk_files;
use std::path::Path;

/// Result of a filtered scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Sum of sizes of included files
    pub total_bytes: u64,
    /// Number of included files
    pub file_count: usize,
    /// Entries skipped because they could not be read
    pub skipped: usize,
}

/// Scan `root`, summing sizes of files whose root-relative path is not
/// excluded. Unreadable entries are logged and skipped.
pub fn scan<F>(root: &Path, exclude: F) -> ScanSummary
where
    F: Fn(&Path) -> bool,
{
    scan_until(root, exclude, || false).unwrap_or_default()
}

/// Like `scan`, but abandons the walk and returns `None` once `stop` is true.
pub fn scan_until<F, C>(root: &Path, exclude: F, stop: C) -> Option<ScanSummary>
where
    F: Fn(&Path) -> bool,
    C: Fn() -> bool,
{
    let mut skipped = 0;
    let files = walk_files(root, exclude, |_, _| skipped += 1, stop)?;

    let summary = ScanSummary {
        total_bytes: files.iter().map(|f| f.size).sum(),
        file_count: files.len(),
        skipped,
    };
    tracing::info!(
        root = %root.display(),
        bytes = summary.total_bytes,
        files = summary.file_count,
        skipped = summary.skipped,
        "scan complete"
    );
    Some(summary)
}

/// Total bytes of non-excluded files under `root`.
pub fn total_size<F>(root: &Path, exclude: F) -> u64
where
    F: Fn(&Path) -> bool,
{
    scan(root, exclude).total_bytes
}
