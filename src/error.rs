//! Error taxonomy shared by every store and orchestrator.
//!
//! Library operations return [`ArchitectumError`]; each variant carries the
//! offending path or name and maps to a stable [`ErrorKind`] code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;

use crate::error_codes;

/// Result alias used throughout the library.
pub type Result<T, E = ArchitectumError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum ArchitectumError {
    #[error("relationship {source_id} -> {target_id} references missing node {missing}")]
    Reference {
        source_id: String,
        target_id: String,
        missing: String,
    },

    #[error("{entity} not found: {name}")]
    NotFound { entity: &'static str, name: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid {subject}: {message}")]
    Validation { subject: String, message: String },

    #[error("stores out of sync for {path}: {message}")]
    Consistency { path: String, message: String },
}

impl ArchitectumError {
    pub fn not_found(entity: &'static str, name: impl Into<String>) -> Self {
        ArchitectumError::NotFound {
            entity,
            name: name.into(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        ArchitectumError::Io {
            path: path.as_ref().to_string_lossy().into_owned(),
            source,
        }
    }

    /// Wrap a serde failure on a persisted document as an I/O error on that file.
    pub fn corrupt(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::io(path, io::Error::new(io::ErrorKind::InvalidData, source))
    }

    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        ArchitectumError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn validation(subject: impl Into<String>, message: impl Into<String>) -> Self {
        ArchitectumError::Validation {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn consistency(path: impl Into<String>, message: impl Into<String>) -> Self {
        ArchitectumError::Consistency {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Lock poisoning means a writer panicked mid-commit.
    pub(crate) fn poisoned(what: &str) -> Self {
        Self::consistency(what, "lock poisoned by a panicked writer")
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ArchitectumError::Reference { .. } => ErrorKind::Reference,
            ArchitectumError::NotFound { .. } => ErrorKind::NotFound,
            ArchitectumError::Io { .. } => ErrorKind::Io,
            ArchitectumError::Parse { .. } => ErrorKind::Parse,
            ArchitectumError::Validation { .. } => ErrorKind::Validation,
            ArchitectumError::Consistency { .. } => ErrorKind::Consistency,
        }
    }

    /// Path or name the error is about.
    pub fn subject(&self) -> &str {
        match self {
            ArchitectumError::Reference { missing, .. } => missing,
            ArchitectumError::NotFound { name, .. } => name,
            ArchitectumError::Io { path, .. } => path,
            ArchitectumError::Parse { path, .. } => path,
            ArchitectumError::Validation { subject, .. } => subject,
            ArchitectumError::Consistency { path, .. } => path,
        }
    }
}

/// Machine-distinguishable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Reference,
    NotFound,
    Io,
    Parse,
    Validation,
    Consistency,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Reference => error_codes::ARC_REF_001_DANGLING_ENDPOINT,
            ErrorKind::NotFound => error_codes::ARC_NF_001_NOT_FOUND,
            ErrorKind::Io => error_codes::ARC_IO_001_ACCESS,
            ErrorKind::Parse => error_codes::ARC_PARSE_001_PARSE_FAILED,
            ErrorKind::Validation => error_codes::ARC_VAL_001_INVALID_INPUT,
            ErrorKind::Consistency => error_codes::ARC_CON_001_STORES_DIVERGED,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Reference => "reference",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Io => "io",
            ErrorKind::Parse => "parse",
            ErrorKind::Validation => "validation",
            ErrorKind::Consistency => "consistency",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
