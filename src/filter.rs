//! File filtering for gitignore-style rules and include/exclude globs.
//!
//! Provides deterministic file filtering with the following precedence:
//! 1. Hard internal ignores (hidden entries, target/, virtualenvs, ...)
//! 2. Gitignore-style rules (.gitignore, .ignore)
//! 3. Include patterns (if any provided)
//! 4. Exclude patterns
//!
//! All filtering is pure function: same inputs always produce same output.

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

use crate::diagnostics::SkipReason;
use crate::error::{ArchitectumError, Result};

/// Internal directories that are always ignored (hard-coded).
const INTERNAL_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".architectum",
    "target",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
];

/// File extensions that are always ignored (hard-coded).
const INTERNAL_IGNORE_EXTS: &[&str] = &["pyc", "pyo"];

/// True for directory names that are never synced.
pub fn is_internal_dir(name: &str) -> bool {
    INTERNAL_IGNORE_DIRS.contains(&name)
}

/// Hidden entries are skipped like internal ones.
fn is_ignored_component(name: &str) -> bool {
    name.starts_with('.') || is_internal_dir(name)
}

/// Filter configuration for sync path expansion.
#[derive(Debug)]
pub struct FileFilter {
    /// Root directory for path normalization
    root: PathBuf,
    /// Gitignore-style matcher (compiled from .gitignore/.ignore files)
    gitignore: Option<Gitignore>,
    /// Include patterns (empty = include all)
    include_patterns: Vec<globset::GlobMatcher>,
    exclude_patterns: Vec<globset::GlobMatcher>,
}

impl FileFilter {
    /// Create a new filter for the given root directory.
    ///
    /// # Arguments
    /// * `root` - Root directory for path normalization
    /// * `include_patterns` - Include globs (empty = include all)
    /// * `exclude_patterns` - Exclude globs
    /// * `respect_gitignore` - Load .gitignore/.ignore rules from `root`
    pub fn new(
        root: &Path,
        include_patterns: &[String],
        exclude_patterns: &[String],
        respect_gitignore: bool,
    ) -> Result<Self> {
        let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

        let gitignore = if respect_gitignore {
            Self::load_gitignore(&root)
        } else {
            None
        };

        Ok(Self {
            include_patterns: Self::compile_globs(include_patterns)?,
            exclude_patterns: Self::compile_globs(exclude_patterns)?,
            root,
            gitignore,
        })
    }

    /// Filter with internal ignores only.
    pub fn permissive(root: &Path) -> Self {
        Self {
            root: std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf()),
            gitignore: None,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn load_gitignore(root: &Path) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(root);

        for name in [".gitignore", ".ignore"] {
            let path = root.join(name);
            if path.exists() {
                // A malformed ignore file should not stop a sync.
                if let Some(err) = builder.add(&path) {
                    warn!(file = %path.display(), error = %err, "failed to load ignore rules");
                }
            }
        }

        match builder.build() {
            Ok(gitignore) => Some(gitignore),
            Err(err) => {
                warn!(error = %err, "ignore rules unusable, continuing without them");
                None
            }
        }
    }

    fn compile_globs(patterns: &[String]) -> Result<Vec<globset::GlobMatcher>> {
        patterns
            .iter()
            .map(|pattern| {
                globset::Glob::new(pattern)
                    .map(|glob| glob.compile_matcher())
                    .map_err(|e| ArchitectumError::validation(pattern.as_str(), e.to_string()))
            })
            .collect()
    }

    /// Check if a path should be skipped, returning the reason if so.
    ///
    /// # Returns
    /// * `None` - Path should be synced
    /// * `Some(reason)` - Path should be skipped
    pub fn should_skip(&self, path: &Path) -> Option<SkipReason> {
        if !path.is_file() {
            return Some(SkipReason::NotAFile);
        }

        if self.is_internal_ignore(path) {
            return Some(SkipReason::IgnoredInternal);
        }

        if let Some(ref gitignore) = self.gitignore {
            let check_path = self.strip_root(path);

            if gitignore.matched(check_path, false).is_ignore() {
                return Some(SkipReason::IgnoredByGitignore);
            }

            // Patterns like "build/" match the directory, not its files.
            let mut current = check_path.parent();
            while let Some(ancestor) = current {
                if ancestor.as_os_str().is_empty() {
                    break;
                }
                if gitignore.matched(ancestor, true).is_ignore() {
                    return Some(SkipReason::IgnoredByGitignore);
                }
                current = ancestor.parent();
            }
        }

        let rel_path = self.relative_path(path);
        if !self.include_patterns.is_empty()
            && !self.include_patterns.iter().any(|m| m.is_match(&rel_path))
        {
            return Some(SkipReason::ExcludedByGlob);
        }
        if self.exclude_patterns.iter().any(|m| m.is_match(&rel_path)) {
            return Some(SkipReason::ExcludedByGlob);
        }

        None
    }

    /// True when a directory should not be descended into.
    pub fn skips_directory(&self, path: &Path) -> bool {
        let rel = self.strip_root(path);
        if rel
            .components()
            .any(|c| matches!(c, Component::Normal(name) if is_ignored_component(&name.to_string_lossy())))
        {
            return true;
        }
        match self.gitignore {
            Some(ref gitignore) if !rel.as_os_str().is_empty() => {
                gitignore.matched(rel, true).is_ignore()
            }
            _ => false,
        }
    }

    fn is_internal_ignore(&self, path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            if INTERNAL_IGNORE_EXTS.contains(&ext.to_string_lossy().as_ref()) {
                return true;
            }
        }

        self.strip_root(path).components().any(|component| match component {
            Component::Normal(name) => is_ignored_component(&name.to_string_lossy()),
            _ => false,
        })
    }

    /// Path relative to the root; paths outside it are judged by file name.
    fn strip_root<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root)
            .unwrap_or_else(|_| path.file_name().map(Path::new).unwrap_or(path))
    }

    /// Get path relative to root, with forward slashes.
    fn relative_path(&self, path: &Path) -> String {
        self.strip_root(path).to_string_lossy().replace('\\', "/")
    }
}
