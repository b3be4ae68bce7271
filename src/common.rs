//! Common utility functions shared across stores
//!
//! Hashing and atomic JSON persistence used by the graph, mirror, ledger and
//! blueprint stores.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;

use crate::error::{ArchitectumError, Result};

/// Compute SHA-256 hash of file contents as lowercase hex.
pub fn compute_hash(source: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source);
    hex::encode(hasher.finalize())
}

/// Read a file and hash it.
pub fn hash_file(path: &Path) -> Result<String> {
    let source = std::fs::read(path).map_err(|e| ArchitectumError::io(path, e))?;
    Ok(compute_hash(&source))
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
///
/// Readers observe either the previous file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| ArchitectumError::validation(path.to_string_lossy(), "path has no parent"))?;
    std::fs::create_dir_all(parent).map_err(|e| ArchitectumError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| ArchitectumError::io(parent, e))?;
    tmp.write_all(bytes).map_err(|e| ArchitectumError::io(path, e))?;
    tmp.flush().map_err(|e| ArchitectumError::io(path, e))?;
    tmp.persist(path).map_err(|e| ArchitectumError::io(path, e.error))?;
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_vec_pretty(value).map_err(|e| ArchitectumError::corrupt(path, e))?;
    json.push(b'\n');
    write_atomic(path, &json)
}

/// Read a JSON document; `Ok(None)` when the file does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ArchitectumError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ArchitectumError::corrupt(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compute_hash_is_sha256_hex() {
        let hash = compute_hash(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(compute_hash(b"abc"), compute_hash(b"abc"));
        assert_ne!(compute_hash(b"abc"), compute_hash(b"abd"));
    }

    #[test]
    fn test_write_atomic_creates_parents_and_replaces() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("nested/dir/out.json");

        write_atomic(&target, b"first").unwrap();
        write_atomic(&target, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "second");
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1, "temp files must not linger");
    }

    #[test]
    fn test_read_json_missing_and_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope.json");
        assert!(read_json::<serde_json::Value>(&missing).unwrap().is_none());

        let corrupt = temp_dir.path().join("bad.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        let err = read_json::<serde_json::Value>(&corrupt).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }
}
