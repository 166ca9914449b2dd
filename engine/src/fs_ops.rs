//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Walking a source tree and yielding the files a filter lets through
//! - Copying files in fixed-size chunks with metadata preservation
//! - Creating destination directories recursively

use crate::error::TransferError;
use crate::state::relative_key;
use std::fs;
use std::io::{self, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Read/write size used while copying file content.
pub const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// A regular file found under a source root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Full path to the file
    pub path: PathBuf,
    /// Path relative to the walked root
    pub relative: PathBuf,
    /// Size at the time of the walk
    pub size: u64,
}

impl SourceFile {
    /// Key used in `MigrationState`.
    pub fn key(&self) -> String {
        relative_key(&self.relative)
    }
}

/// Walk `root` and return every regular file whose root-relative path is not
/// excluded, or `None` as soon as `stop` returns true (polled per entry).
///
/// Symlinks are not followed into directories; a symlink resolving to a
/// regular file is treated as that file. Entries that cannot be read are
/// logged, passed to `on_skip` and left out.
pub fn walk_files<F, S, C>(
    root: &Path,
    exclude: F,
    mut on_skip: S,
    stop: C,
) -> Option<Vec<SourceFile>>
where
    F: Fn(&Path) -> bool,
    S: FnMut(&Path, &io::Error),
    C: Fn() -> bool,
{
    let mut files = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        if stop() {
            tracing::debug!(root = %root.display(), "walk stopped");
            return None;
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                let err = io::Error::from(e);
                tracing::warn!(path = %path.display(), error = %err, "cannot access entry");
                on_skip(&path, &err);
                continue;
            }
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }

        let metadata = if file_type.is_symlink() {
            fs::metadata(entry.path())
        } else {
            entry.metadata().map_err(io::Error::from)
        };
        let metadata = match metadata {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "cannot access entry");
                on_skip(entry.path(), &e);
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if exclude(relative) {
            tracing::trace!(path = %relative.display(), "excluded");
            continue;
        }

        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            relative: relative.to_path_buf(),
            size: metadata.len(),
        });
    }

    Some(files)
}

/// Copy `src` to `dst` in `COPY_CHUNK_SIZE` chunks and mirror its metadata.
///
/// `on_chunk` receives the running byte count for this file after every
/// chunk. Returning `ControlFlow::Break` stops the copy and yields
/// `TransferError::Interrupted`; the partial destination is left in place.
/// Returns the number of bytes copied.
pub fn copy_file_chunked<P>(
    src: &Path,
    dst: &Path,
    mut on_chunk: P,
) -> Result<u64, TransferError>
where
    P: FnMut(u64) -> ControlFlow<()>,
{
    ensure_parent_dir_exists(dst)?;

    let read_err = |e| TransferError::ReadError {
        path: src.to_path_buf(),
        source: e,
    };
    let write_err = |e| TransferError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    };

    let mut src_file = fs::File::open(src).map_err(read_err)?;
    let src_metadata = src_file.metadata().map_err(read_err)?;
    make_writable(dst).map_err(write_err)?;
    let mut dst_file = fs::File::create(dst).map_err(write_err)?;

    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
    let mut bytes_copied: u64 = 0;
    loop {
        let n = match src_file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e)),
        };
        dst_file.write_all(&buffer[..n]).map_err(write_err)?;
        bytes_copied += n as u64;
        if on_chunk(bytes_copied).is_break() {
            return Err(TransferError::Interrupted {
                path: src.to_path_buf(),
            });
        }
    }
    dst_file.flush().map_err(write_err)?;
    drop(dst_file);

    copy_metadata(&src_metadata, dst);

    Ok(bytes_copied)
}

/// Give the owner write access to an existing destination file so it can
/// be truncated and rewritten.
fn make_writable(dst: &Path) -> io::Result<()> {
    let metadata = match fs::symlink_metadata(dst) {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let mut permissions = metadata.permissions();
    if !permissions.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    permissions.set_readonly(false);

    fs::set_permissions(dst, permissions)
}

/// Mirror timestamps and permissions of a source file onto `dst`.
///
/// Best-effort: failures are logged and otherwise ignored.
pub fn copy_metadata(src_metadata: &fs::Metadata, dst: &Path) {
    if let Err(e) = fs::set_permissions(dst, src_metadata.permissions()) {
        tracing::warn!(path = %dst.display(), error = %e, "could not copy permissions");
    }

    let mtime = filetime::FileTime::from_last_modification_time(src_metadata);
    let atime = filetime::FileTime::from_last_access_time(src_metadata);
    if let Err(e) = filetime::set_file_times(dst, atime, mtime) {
        tracing::warn!(path = %dst.display(), error = %e, "could not copy timestamps");
    }
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), TransferError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    // Relative root
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(TransferError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "Parent path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(parent).map_err(|e| TransferError::DirectoryCreationFailed {
                path: parent.to_path_buf(),
                source: e,
            })
        }
        Err(e) => Err(TransferError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_exclude(_: &Path) -> bool {
        false
    }

    fn never() -> bool {
        false
    }

    #[test]
    fn test_walk_flat_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).expect("Failed to create src dir");
        fs::write(src.join("file1.txt"), b"test data 1").expect("Failed to write file1");
        fs::write(src.join("file2.txt"), b"test data 2").expect("Failed to write file2");

        let files =
            walk_files(&src, no_exclude, |_, _| {}, never).expect("Walk should finish");
        assert_eq!(files.len(), 2, "Expected 2 files, got {}", files.len());

        let total_size: u64 = files.iter().map(|f| f.size).sum();
        assert_eq!(total_size, 22);
    }

    #[test]
    fn test_walk_nested_directory_yields_relative_keys() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir_all(src.join("subdir/deeper")).expect("Failed to create dirs");
        fs::write(src.join("file1.txt"), b"data1").expect("Failed to write file1");
        fs::write(src.join("subdir/deeper/file2.txt"), b"data2").expect("Failed to write file2");

        let mut keys: Vec<String> = walk_files(&src, no_exclude, |_, _| {}, never)
            .expect("Walk should finish")
            .iter()
            .map(SourceFile::key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["file1.txt", "subdir/deeper/file2.txt"]);
    }

    #[test]
    fn test_walk_applies_filter_to_relative_path() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        // The root itself sits under a directory the filter would reject
        let src = temp_dir.path().join("build").join("project");
        fs::create_dir_all(src.join("skip")).expect("Failed to create dirs");
        fs::write(src.join("keep.txt"), b"k").expect("Failed to write keep");
        fs::write(src.join("skip/drop.txt"), b"d").expect("Failed to write drop");

        let files = walk_files(
            &src,
            |rel| rel.components().any(|c| c.as_os_str() == "build" || c.as_os_str() == "skip"),
            |_, _| {},
            never,
        )
        .expect("Walk should finish");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].key(), "keep.txt");
    }

    #[test]
    fn test_walk_missing_root_reports_skip() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut skipped = 0;
        let files = walk_files(
            &temp_dir.path().join("missing"),
            no_exclude,
            |_, _| skipped += 1,
            never,
        )
        .expect("Walk should finish");
        assert!(files.is_empty());
        assert_eq!(skipped, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_broken_symlink() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).expect("Failed to create src dir");
        fs::write(src.join("real.txt"), b"real").expect("Failed to write file");
        std::os::unix::fs::symlink(src.join("gone.txt"), src.join("dangling"))
            .expect("Failed to create symlink");

        let mut skipped = Vec::new();
        let files = walk_files(&src, no_exclude, |p, _| skipped.push(p.to_path_buf()), never)
            .expect("Walk should finish");
        assert_eq!(files.len(), 1);
        assert_eq!(skipped, vec![src.join("dangling")]);
    }

    #[test]
    fn test_copy_file_chunked_reports_progress() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("source.bin");
        let dst_file = temp_dir.path().join("out/nested/dest.bin");
        let data: Vec<u8> = (0..(COPY_CHUNK_SIZE * 2 + 10)).map(|i| (i % 256) as u8).collect();
        fs::write(&src_file, &data).expect("Failed to create source");

        let mut ticks = Vec::new();
        let bytes = copy_file_chunked(&src_file, &dst_file, |n| {
            ticks.push(n);
            ControlFlow::Continue(())
        })
        .expect("Failed to copy");

        assert_eq!(bytes, data.len() as u64);
        assert_eq!(ticks.last().copied(), Some(data.len() as u64));
        assert!(ticks.len() >= 3);
        assert_eq!(fs::read(&dst_file).expect("Failed to read dest"), data);
    }

    #[test]
    fn test_copy_preserves_mtime() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("source.txt");
        let dst_file = temp_dir.path().join("dest.txt");
        fs::write(&src_file, b"test content").expect("Failed to create source");
        let past = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src_file, past).expect("Failed to set mtime");

        copy_file_chunked(&src_file, &dst_file, |_| ControlFlow::Continue(()))
            .expect("Failed to copy");

        let meta = fs::metadata(&dst_file).expect("Failed to stat dest");
        assert_eq!(filetime::FileTime::from_last_modification_time(&meta), past);
    }

    #[test]
    fn test_copy_missing_source_is_read_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = copy_file_chunked(
            &temp_dir.path().join("missing"),
            &temp_dir.path().join("dest"),
            |_| ControlFlow::Continue(()),
        )
        .expect_err("Copy of a missing file must fail");
        assert!(matches!(err, TransferError::ReadError { .. }));
    }

    #[test]
    fn test_copy_onto_directory_is_write_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("source.txt");
        fs::write(&src_file, b"x").expect("Failed to create source");
        let dst = temp_dir.path().join("occupied");
        fs::create_dir(&dst).expect("Failed to create dir");

        let err = copy_file_chunked(&src_file, &dst, |_| ControlFlow::Continue(()))
            .expect_err("Copy onto a dir must fail");
        assert!(matches!(err, TransferError::WriteError { .. }));
    }

    #[test]
    fn test_copy_stops_at_chunk_boundary() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("big.bin");
        let dst_file = temp_dir.path().join("big.copy");
        fs::write(&src_file, vec![5u8; COPY_CHUNK_SIZE * 8]).expect("Failed to create source");

        let mut chunks = 0;
        let err = copy_file_chunked(&src_file, &dst_file, |_| {
            chunks += 1;
            ControlFlow::Break(())
        })
        .expect_err("Break must stop the copy");

        assert!(matches!(err, TransferError::Interrupted { .. }));
        assert_eq!(chunks, 1);
        let written = fs::metadata(&dst_file).expect("Partial file kept").len();
        assert!(written < (COPY_CHUNK_SIZE * 8) as u64);
    }

    #[test]
    fn test_recopy_over_read_only_destination() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src_file = temp_dir.path().join("locked.txt");
        let dst_file = temp_dir.path().join("out/locked.txt");
        fs::write(&src_file, b"first").expect("Failed to create source");
        let mut perms = fs::metadata(&src_file).expect("Failed to stat").permissions();
        perms.set_readonly(true);
        fs::set_permissions(&src_file, perms).expect("Failed to set read-only");

        copy_file_chunked(&src_file, &dst_file, |_| ControlFlow::Continue(()))
            .expect("First copy should succeed");
        assert!(fs::metadata(&dst_file).unwrap().permissions().readonly());

        // Source changes between runs; the read-only copy must still be replaced
        let mut perms = fs::metadata(&src_file).unwrap().permissions();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            perms.set_mode(0o644);
        }
        #[cfg(not(unix))]
        perms.set_readonly(false);
        fs::set_permissions(&src_file, perms).expect("Failed to unlock source");
        fs::write(&src_file, b"second").expect("Failed to rewrite source");
        let mut perms = fs::metadata(&src_file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&src_file, perms).expect("Failed to set read-only");

        copy_file_chunked(&src_file, &dst_file, |_| ControlFlow::Continue(()))
            .expect("Copy over a read-only destination should succeed");
        assert_eq!(fs::read(&dst_file).unwrap(), b"second");
        assert!(fs::metadata(&dst_file).unwrap().permissions().readonly());
    }

    #[test]
    fn test_walk_gives_up_when_stopped() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("a.txt"), b"a").expect("Failed to write file");

        let stopped = walk_files(temp_dir.path(), no_exclude, |_, _| {}, || true);
        assert!(stopped.is_none());

        let full = walk_files(temp_dir.path(), no_exclude, |_, _| {}, || false);
        assert_eq!(full.map(|f| f.len()), Some(1));
    }

    #[test]
    fn test_ensure_parent_dir_exists() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("subdir").join("file.txt");

        ensure_parent_dir_exists(&path).expect("Failed to create parent");
        assert!(temp_dir.path().join("subdir").is_dir());
    }

    #[test]
    fn test_ensure_parent_dir_rejects_file_parent() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"file").expect("Failed to write blocker");

        let err = ensure_parent_dir_exists(&blocker.join("child.txt"))
            .expect_err("A file cannot be a parent directory");
        assert!(matches!(err, TransferError::DirectoryCreationFailed { .. }));
    }
}
