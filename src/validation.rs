//! Path validation and normalization.
//!
//! Every path that crosses a store boundary is a root-relative, `/`-separated
//! UTF-8 string. The project root itself is `"."`. Normalization is lexical:
//! it never touches the filesystem, so deleted files normalize the same way as
//! live ones.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use std::path::{Path, PathBuf};

use crate::error::{ArchitectumError, Result};

/// Normalized form of the project root.
pub const ROOT: &str = ".";

/// Error types for path validation.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    /// Path is not valid UTF-8
    #[error("path is not valid UTF-8: {0}")]
    NotUtf8(String),

    /// Resolved path escapes the project root
    #[error("path escapes project root: {0} (root: {1})")]
    OutsideRoot(String, String),
}

impl From<PathValidationError> for ArchitectumError {
    fn from(err: PathValidationError) -> Self {
        let subject = match &err {
            PathValidationError::NotUtf8(p) => p.clone(),
            PathValidationError::OutsideRoot(p, _) => p.clone(),
        };
        ArchitectumError::validation(subject, err.to_string())
    }
}

fn to_utf8(path: &Path) -> Result<&Utf8Path, PathValidationError> {
    Utf8Path::from_path(path)
        .ok_or_else(|| PathValidationError::NotUtf8(path.to_string_lossy().into_owned()))
}

/// Normalize `path` to its root-relative form.
///
/// Relative inputs are interpreted against `root`. Absolute inputs must live
/// under `root` (or its canonical form). `.` components are dropped and `..`
/// components are folded; folding past the root is an error.
pub fn normalize_path(root: &Path, path: &Path) -> Result<String> {
    let utf8 = to_utf8(path)?;

    let relative: Utf8PathBuf = if utf8.is_absolute() {
        strip_root(root, path)?
    } else {
        utf8.to_path_buf()
    };

    let mut parts: Vec<&str> = Vec::new();
    for component in relative.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(PathValidationError::OutsideRoot(
                        utf8.to_string(),
                        root.to_string_lossy().into_owned(),
                    )
                    .into());
                }
            }
            Utf8Component::Normal(part) => parts.push(part),
            Utf8Component::RootDir | Utf8Component::Prefix(_) => {
                return Err(PathValidationError::OutsideRoot(
                    utf8.to_string(),
                    root.to_string_lossy().into_owned(),
                )
                .into());
            }
        }
    }

    if parts.is_empty() {
        Ok(ROOT.to_string())
    } else {
        Ok(parts.join("/"))
    }
}

fn strip_root(root: &Path, path: &Path) -> Result<Utf8PathBuf> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Ok(to_utf8(rel)?.to_path_buf());
    }
    // Absolute inputs may come from a canonicalized walk (symlinked tmp dirs).
    if let Ok(canonical_root) = std::fs::canonicalize(root) {
        if let Ok(rel) = path.strip_prefix(&canonical_root) {
            return Ok(to_utf8(rel)?.to_path_buf());
        }
        if let Ok(canonical_path) = std::fs::canonicalize(path) {
            if let Ok(rel) = canonical_path.strip_prefix(&canonical_root) {
                return Ok(to_utf8(rel)?.to_path_buf());
            }
        }
    }
    Err(PathValidationError::OutsideRoot(
        path.to_string_lossy().into_owned(),
        root.to_string_lossy().into_owned(),
    )
    .into())
}

/// Absolute location of a normalized path.
pub fn resolve(root: &Path, rel: &str) -> PathBuf {
    if rel == ROOT {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

/// Parent directory of a normalized path; `None` for the root.
pub fn parent_of(rel: &str) -> Option<String> {
    if rel == ROOT {
        return None;
    }
    match rel.rsplit_once('/') {
        Some((parent, _)) => Some(parent.to_string()),
        None => Some(ROOT.to_string()),
    }
}

/// Chain of directories from the root down to the parent of `rel`.
pub fn ancestors(rel: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = parent_of(rel);
    while let Some(dir) = current {
        current = parent_of(&dir);
        chain.push(dir);
    }
    chain.reverse();
    chain
}

/// Join a child name onto a normalized directory.
pub fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

/// True when `rel` equals `dir` or lives below it.
pub fn is_within(rel: &str, dir: &str) -> bool {
    dir == ROOT || rel == dir || rel.starts_with(&format!("{}/", dir))
}

/// Extension of a normalized path without the dot; empty when absent.
pub fn extension_of(rel: &str) -> String {
    Utf8Path::new(rel)
        .extension()
        .map(str::to_string)
        .unwrap_or_default()
}

/// Final component of a normalized path.
pub fn file_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}
