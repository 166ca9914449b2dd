//! Checksum and verification functionality.
//!
//! This module provides:
//! - Multiple checksum algorithms (CRC32, MD5, SHA-256, BLAKE3)
//! - File-level checksum computation
//! - Post-copy verification of a source/destination pair
//!
//! Digests here detect accidental corruption during a copy. They are not a
//! security control.

use crate::error::TransferError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Read size used while hashing a file.
pub const HASH_CHUNK_SIZE: usize = 4 * 1024;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    /// CRC32 (fast, 32-bit)
    Crc32,
    /// MD5 (fast, 128-bit; the default for copy verification)
    #[default]
    Md5,
    /// SHA-256 (cryptographic, 256-bit)
    Sha256,
    /// BLAKE3 (modern, fast, 256-bit)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc32 => write!(f, "crc32"),
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crc32" => Ok(Self::Crc32),
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!(
                "unknown checksum algorithm '{}' (expected crc32, md5, sha256 or blake3)",
                other
            )),
        }
    }
}

/// A computed checksum value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    /// Create a new checksum value
    pub fn new(algorithm: ChecksumAlgorithm, hex: String) -> Self {
        ChecksumValue { algorithm, hex }
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    fn into_hex(self) -> String {
        self.hex
    }
}

/// Formats as `algo:hex`.
impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Incremental hasher over a byte stream
pub trait ChecksumHasher {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize and return the checksum value
    fn finalize(self: Box<Self>) -> ChecksumValue;
}

struct Crc32Hasher {
    hasher: crc32fast::Hasher,
}

impl ChecksumHasher for Crc32Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        ChecksumValue::new(
            ChecksumAlgorithm::Crc32,
            format!("{:08x}", self.hasher.finalize()),
        )
    }
}

struct Md5Hasher {
    context: md5::Context,
}

impl ChecksumHasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        let digest = self.context.compute();
        ChecksumValue::new(ChecksumAlgorithm::Md5, format!("{:x}", digest))
    }
}

struct Sha256Hasher {
    hasher: sha2::Sha256,
}

impl ChecksumHasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        use sha2::Digest;
        let digest = self.hasher.finalize();
        ChecksumValue::new(ChecksumAlgorithm::Sha256, format!("{:x}", digest))
    }
}

struct Blake3Hasher {
    hasher: blake3::Hasher,
}

impl ChecksumHasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self: Box<Self>) -> ChecksumValue {
        ChecksumValue::new(
            ChecksumAlgorithm::Blake3,
            self.hasher.finalize().to_hex().to_string(),
        )
    }
}

/// Create a new hasher for the given algorithm
pub fn create_hasher(algorithm: ChecksumAlgorithm) -> Box<dyn ChecksumHasher> {
    match algorithm {
        ChecksumAlgorithm::Crc32 => Box::new(Crc32Hasher {
            hasher: crc32fast::Hasher::new(),
        }),
        ChecksumAlgorithm::Md5 => Box::new(Md5Hasher {
            context: md5::Context::new(),
        }),
        ChecksumAlgorithm::Sha256 => Box::new(Sha256Hasher {
            hasher: sha2::Sha256::default(),
        }),
        ChecksumAlgorithm::Blake3 => Box::new(Blake3Hasher {
            hasher: blake3::Hasher::new(),
        }),
    }
}

/// Compute checksum for a file, reading it in `HASH_CHUNK_SIZE` chunks.
pub fn compute_file_checksum(
    path: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumValue, TransferError> {
    let read_err = |e| TransferError::ReadError {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).map_err(read_err)?;
    let mut hasher = create_hasher(algorithm);
    let mut buffer = [0u8; HASH_CHUNK_SIZE];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e)),
        }
    }

    Ok(hasher.finalize())
}

/// Hex digest of a file, or an empty string if the file cannot be read.
///
/// The empty string never equals a real digest, so callers can treat it as
/// "unavailable" without a separate error path.
pub fn file_digest(path: &Path, algorithm: ChecksumAlgorithm) -> String {
    match compute_file_checksum(path, algorithm) {
        Ok(value) => {
            tracing::trace!(path = %path.display(), digest = %value, "hashed");
            value.into_hex()
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "cannot hash file");
            String::new()
        }
    }
}

/// Verify a copy with the default algorithm.
pub fn verify_copy(source: &Path, destination: &Path) -> bool {
    verify_copy_with(source, destination, ChecksumAlgorithm::default())
}

/// Verify that `destination` holds the same bytes as `source`.
///
/// Returns false if the destination is missing or either digest is
/// unavailable.
pub fn verify_copy_with(source: &Path, destination: &Path, algorithm: ChecksumAlgorithm) -> bool {
    if !destination.exists() {
        return false;
    }

    let source_digest = file_digest(source, algorithm);
    if source_digest.is_empty() {
        return false;
    }
    let dest_digest = file_digest(destination, algorithm);

    !dest_digest.is_empty() && source_digest == dest_digest
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn digest_of(algorithm: ChecksumAlgorithm, data: &[u8]) -> ChecksumValue {
        let mut hasher = create_hasher(algorithm);
        hasher.update(data);
        hasher.finalize()
    }

    #[test]
    fn test_algorithm_display_and_parse() {
        for algo in [
            ChecksumAlgorithm::Crc32,
            ChecksumAlgorithm::Md5,
            ChecksumAlgorithm::Sha256,
            ChecksumAlgorithm::Blake3,
        ] {
            assert_eq!(algo.to_string().parse::<ChecksumAlgorithm>(), Ok(algo));
        }
        assert_eq!("SHA256".parse::<ChecksumAlgorithm>(), Ok(ChecksumAlgorithm::Sha256));
        assert!("whirlpool".parse::<ChecksumAlgorithm>().is_err());
        assert_eq!(ChecksumAlgorithm::default(), ChecksumAlgorithm::Md5);
    }

    #[test]
    fn test_known_digests() {
        assert_eq!(
            digest_of(ChecksumAlgorithm::Md5, b"hello").hex(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            digest_of(ChecksumAlgorithm::Sha256, b"hello").hex(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(digest_of(ChecksumAlgorithm::Crc32, b"hello").hex(), "3610a686");
        assert_eq!(digest_of(ChecksumAlgorithm::Blake3, b"hello").hex().len(), 64);
    }

    #[test]
    fn test_checksum_value_display() {
        let cs = ChecksumValue::new(ChecksumAlgorithm::Sha256, "abc123".to_string());
        assert_eq!(cs.hex(), "abc123");
        assert_eq!(cs.to_string(), "sha256:abc123");
    }

    #[test]
    fn test_file_checksum_spans_multiple_chunks() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("big.bin");
        let data: Vec<u8> = (0..(HASH_CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).expect("Failed to write file");

        let from_file =
            compute_file_checksum(&path, ChecksumAlgorithm::Sha256).expect("Failed to hash");
        assert_eq!(from_file, digest_of(ChecksumAlgorithm::Sha256, &data));
    }

    #[test]
    fn test_file_digest_unreadable_is_empty() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let missing = temp_dir.path().join("missing.txt");
        assert_eq!(file_digest(&missing, ChecksumAlgorithm::Md5), "");
    }

    #[test]
    fn test_verify_copy_missing_destination() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src.txt");
        fs::write(&src, b"data").expect("Failed to write source");
        assert!(!verify_copy(&src, &temp_dir.path().join("nope.txt")));
    }

    #[test]
    fn test_verify_copy_sizes_and_mutations() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");

        for size in [0usize, 1, 1_000_000] {
            let data: Vec<u8> = (0..size).map(|i| (i * 7 % 256) as u8).collect();
            let src = temp_dir.path().join(format!("src_{}", size));
            let dst = temp_dir.path().join(format!("dst_{}", size));
            fs::write(&src, &data).expect("Failed to write source");

            assert!(!verify_copy(&src, &dst), "missing destination, size {}", size);

            fs::write(&dst, &data).expect("Failed to write destination");
            assert!(verify_copy(&src, &dst), "identical files, size {}", size);

            let mut mutated = data.clone();
            if size == 0 {
                mutated.push(0);
            } else {
                let mid = size / 2;
                mutated[mid] ^= 0xff;
            }
            fs::write(&dst, &mutated).expect("Failed to write mutated destination");
            assert!(!verify_copy(&src, &dst), "mutated destination, size {}", size);
        }
    }

    #[test]
    fn test_verify_copy_unreadable_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dst = temp_dir.path().join("dst.txt");
        fs::write(&dst, b"").expect("Failed to write destination");
        // Both sides would otherwise hash to the empty-input digest
        assert!(!verify_copy_with(
            &temp_dir.path().join("missing"),
            &dst,
            ChecksumAlgorithm::Blake3
        ));
    }
}
