//! Workspace configuration.
//!
//! Loaded from `<root>/.architectum/config.json` when present, then
//! overridden by `ARCHITECTUM_*` environment variables. Every field has a
//! default, so an empty object and a missing file are both valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::blueprint::DEFAULT_CROSS_FILE_DEPTH;
use crate::common::read_json;
use crate::detail::DetailLevel;
use crate::error::{ArchitectumError, Result};

/// Directory under the project root holding all persisted state.
pub const DEFAULT_STATE_DIR: &str = ".architectum";
pub const CONFIG_FILE: &str = "config.json";

pub const ENV_PARSE_TIMEOUT_MS: &str = "ARCHITECTUM_PARSE_TIMEOUT_MS";
pub const ENV_CROSS_FILE_DEPTH: &str = "ARCHITECTUM_CROSS_FILE_DEPTH";
pub const ENV_RESPECT_GITIGNORE: &str = "ARCHITECTUM_RESPECT_GITIGNORE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectumConfig {
    /// State directory, relative to the project root.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Bound on a single parser call.
    #[serde(default = "default_parse_timeout_ms")]
    pub parse_timeout_ms: u64,

    /// Include globs (empty = everything).
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default = "default_respect_gitignore")]
    pub respect_gitignore: bool,

    /// Level applied when the graph is exported. The stored graph stays
    /// lossless; blueprints choose their own level.
    #[serde(default = "default_graph_detail_level")]
    pub graph_detail_level: DetailLevel,

    /// Hop count used when a blueprint asks for cross-file expansion
    /// without giving one.
    #[serde(default = "default_cross_file_depth")]
    pub cross_file_depth: usize,
}

fn default_state_dir() -> String {
    DEFAULT_STATE_DIR.to_string()
}

fn default_parse_timeout_ms() -> u64 {
    30_000
}

fn default_respect_gitignore() -> bool {
    true
}

fn default_graph_detail_level() -> DetailLevel {
    DetailLevel::Detailed
}

fn default_cross_file_depth() -> usize {
    DEFAULT_CROSS_FILE_DEPTH
}

impl Default for ArchitectumConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            parse_timeout_ms: default_parse_timeout_ms(),
            include: Vec::new(),
            exclude: Vec::new(),
            respect_gitignore: default_respect_gitignore(),
            graph_detail_level: default_graph_detail_level(),
            cross_file_depth: default_cross_file_depth(),
        }
    }
}

impl ArchitectumConfig {
    /// File + environment configuration for `root`.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_with(root, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load) with an injectable environment lookup.
    pub fn load_with<F>(root: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = root.join(DEFAULT_STATE_DIR).join(CONFIG_FILE);
        let mut config = read_json::<ArchitectumConfig>(&path)?.unwrap_or_default();
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env<F>(&mut self, env: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = env(ENV_PARSE_TIMEOUT_MS) {
            self.parse_timeout_ms = raw
                .trim()
                .parse()
                .map_err(|_| ArchitectumError::validation(ENV_PARSE_TIMEOUT_MS, format!("'{}' is not a number of milliseconds", raw)))?;
        }
        if let Some(raw) = env(ENV_CROSS_FILE_DEPTH) {
            self.cross_file_depth = raw
                .trim()
                .parse()
                .map_err(|_| ArchitectumError::validation(ENV_CROSS_FILE_DEPTH, format!("'{}' is not a hop count", raw)))?;
        }
        if let Some(raw) = env(ENV_RESPECT_GITIGNORE) {
            self.respect_gitignore = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ArchitectumError::validation(
                        ENV_RESPECT_GITIGNORE,
                        format!("'{}' is not a boolean", raw),
                    ))
                }
            };
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.parse_timeout_ms == 0 {
            return Err(ArchitectumError::validation(
                "parse_timeout_ms",
                "must be greater than zero",
            ));
        }
        let state_dir = Path::new(&self.state_dir);
        if self.state_dir.is_empty() || state_dir.is_absolute() || self.state_dir.contains("..") {
            return Err(ArchitectumError::validation(
                "state_dir",
                "must be a relative path inside the project root",
            ));
        }
        Ok(())
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_millis(self.parse_timeout_ms)
    }

    pub fn state_path(&self, root: &Path) -> PathBuf {
        root.join(&self.state_dir)
    }
}
