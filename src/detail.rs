//! Detail levels and the projection policy shared by both stores.
//!
//! A projection never invents data: the field set at MINIMAL is contained in
//! STANDARD, which is contained in DETAILED. Graph accessors and mirror
//! accessors both go through [`project`] so one level means the same thing
//! everywhere.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ArchitectumError;

/// Metadata keys kept at STANDARD detail, in graph nodes and mirror
/// elements alike. DETAILED keeps every key; MINIMAL keeps none.
pub const STANDARD_METADATA_KEYS: &[&str] = &[
    "signature",
    "parameters",
    "return_type",
    "visibility",
    "doc_summary",
    "decorators",
    "bases",
];

/// True when `key` survives projection to `level`.
pub fn keeps_metadata_key(level: DetailLevel, key: &str) -> bool {
    match level {
        DetailLevel::Minimal => false,
        DetailLevel::Standard => STANDARD_METADATA_KEYS.contains(&key),
        DetailLevel::Detailed => true,
    }
}

/// How much of an entity survives projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Minimal,
    Standard,
    Detailed,
}

impl DetailLevel {
    pub const ALL: [DetailLevel; 3] = [
        DetailLevel::Minimal,
        DetailLevel::Standard,
        DetailLevel::Detailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetailLevel::Minimal => "minimal",
            DetailLevel::Standard => "standard",
            DetailLevel::Detailed => "detailed",
        }
    }

    /// True when this level includes everything `other` includes.
    pub fn includes(&self, other: DetailLevel) -> bool {
        *self >= other
    }
}

impl Default for DetailLevel {
    fn default() -> Self {
        DetailLevel::Standard
    }
}

impl fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetailLevel {
    type Err = ArchitectumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(DetailLevel::Minimal),
            "standard" => Ok(DetailLevel::Standard),
            "detailed" => Ok(DetailLevel::Detailed),
            other => Err(ArchitectumError::validation(
                "detail level",
                format!("'{}' is not one of minimal, standard, detailed", other),
            )),
        }
    }
}

/// Independent levels for the relationship map and the JSON mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLevelConfig {
    pub relationship_map: DetailLevel,
    pub json_mirrors: DetailLevel,
}

impl DetailLevelConfig {
    pub fn new(relationship_map: DetailLevel, json_mirrors: DetailLevel) -> Self {
        Self {
            relationship_map,
            json_mirrors,
        }
    }

    pub fn uniform(level: DetailLevel) -> Self {
        Self::new(level, level)
    }

    /// Parse a single level applied to both stores.
    pub fn from_string(s: &str) -> Result<Self, ArchitectumError> {
        Ok(Self::uniform(s.parse()?))
    }
}

impl Default for DetailLevelConfig {
    fn default() -> Self {
        Self::uniform(DetailLevel::Standard)
    }
}

/// Entities that can be reduced to a detail level.
pub trait Project: Sized {
    fn project(&self, level: DetailLevel) -> Self;
}

/// Stateless projection entrypoint used by both stores.
pub fn project<T: Project>(entity: &T, level: DetailLevel) -> T {
    entity.project(level)
}
