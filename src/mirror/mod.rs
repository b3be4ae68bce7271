//! JSON content mirror.
//!
//! One JSON document per source file under `<mirror_root>/<path>.json` and one
//! per directory under `<mirror_root>/<dir>/.directory.json`. Writes go
//! through a temp file and a rename, so a reader sees either the previous
//! entry or the complete new one.

mod schema;

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::common::{hash_file, read_json, write_json};
use crate::detail::{DetailLevel, Project};
use crate::error::{ArchitectumError, Result};
use crate::filter::is_internal_dir;
use crate::validation::{join, resolve, ROOT};

pub use schema::{CodeElement, DirectoryContent, FileContent, STANDARD_METADATA_KEYS};

const DIRECTORY_ENTRY: &str = ".directory.json";

/// On-disk mirror store.
#[derive(Debug, Clone)]
pub struct MirrorStore {
    /// Project root the mirrored paths are relative to
    root: PathBuf,
    /// Directory holding the mirror tree
    mirror_root: PathBuf,
}

impl MirrorStore {
    pub fn new(root: impl Into<PathBuf>, mirror_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mirror_root: mirror_root.into(),
        }
    }

    pub fn mirror_root(&self) -> &Path {
        &self.mirror_root
    }

    /// Location of the mirror document for a normalized file path.
    pub fn get_mirror_path(&self, path: &str) -> PathBuf {
        self.mirror_root.join(format!("{}.json", path))
    }

    /// Location of the mirror document for a normalized directory path.
    pub fn get_directory_mirror_path(&self, dir: &str) -> PathBuf {
        if dir == ROOT {
            self.mirror_root.join(DIRECTORY_ENTRY)
        } else {
            self.mirror_root.join(dir).join(DIRECTORY_ENTRY)
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.get_mirror_path(path).is_file()
    }

    /// Mirrored content of `path` projected to `level`.
    pub fn get_mirrored_content(&self, path: &str, level: DetailLevel) -> Result<FileContent> {
        let mirror_path = self.get_mirror_path(path);
        match read_json::<FileContent>(&mirror_path)? {
            Some(content) => Ok(content.project(level)),
            None => Err(ArchitectumError::not_found("mirror", path)),
        }
    }

    /// Store `content` for `path`, hashing the current source file.
    pub fn update_mirrored_content(&self, path: &str, content: FileContent) -> Result<FileContent> {
        let hash = hash_file(&resolve(&self.root, path))?;
        self.commit_content(path, content, &hash)
    }

    /// Store `content` for `path` stamped with `hash`.
    ///
    /// Used by the sync orchestrator so the stored hash is exactly the one its
    /// change detection computed.
    pub fn commit_content(&self, path: &str, mut content: FileContent, hash: &str) -> Result<FileContent> {
        if content.path != path {
            return Err(ArchitectumError::validation(
                path,
                format!("content describes {} instead", content.path),
            ));
        }
        content.content_hash = hash.to_string();
        write_json(&self.get_mirror_path(path), &content)?;
        debug!(path, hash, elements = content.elements.len(), "mirror entry written");
        Ok(content)
    }

    /// Remove the entry for `path`; `Ok(false)` when none existed.
    pub fn remove(&self, path: &str) -> Result<bool> {
        let mirror_path = self.get_mirror_path(path);
        match std::fs::remove_file(&mirror_path) {
            Ok(()) => {
                self.prune_empty_parents(&mirror_path);
                debug!(path, "mirror entry removed");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ArchitectumError::io(&mirror_path, e)),
        }
    }

    /// Every mirrored file path, sorted.
    pub fn list_all_mirrors(&self) -> Result<Vec<String>> {
        if !self.mirror_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in walkdir::WalkDir::new(&self.mirror_root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.mirror_root.clone());
                ArchitectumError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() || entry.file_name() == DIRECTORY_ENTRY {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.mirror_root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if let Some(path) = rel.strip_suffix(".json") {
                paths.push(path.to_string());
            }
        }
        paths.sort();
        Ok(paths)
    }

    pub fn get_directory_content(&self, dir: &str) -> Result<DirectoryContent> {
        read_json::<DirectoryContent>(&self.get_directory_mirror_path(dir))?
            .ok_or_else(|| ArchitectumError::not_found("directory mirror", dir))
    }

    pub fn update_directory_content(&self, content: &DirectoryContent) -> Result<()> {
        write_json(&self.get_directory_mirror_path(&content.path), content)
    }

    pub fn remove_directory(&self, dir: &str) -> Result<bool> {
        let mirror_path = self.get_directory_mirror_path(dir);
        match std::fs::remove_file(&mirror_path) {
            Ok(()) => {
                self.prune_empty_parents(&mirror_path);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ArchitectumError::io(&mirror_path, e)),
        }
    }

    /// List a source directory: hidden entries and internal ignores skipped,
    /// children sorted by name.
    pub fn scan_directory(&self, dir: &str) -> Result<DirectoryContent> {
        let abs = resolve(&self.root, dir);
        let entries = std::fs::read_dir(&abs).map_err(|e| ArchitectumError::io(&abs, e))?;

        let mut files = Vec::new();
        let mut directories = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArchitectumError::io(&abs, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || is_internal_dir(&name) {
                continue;
            }
            let file_type = entry.file_type().map_err(|e| ArchitectumError::io(entry.path(), e))?;
            if file_type.is_dir() {
                directories.push(join(dir, &name));
            } else if file_type.is_file() {
                files.push(join(dir, &name));
            }
        }
        files.sort();
        directories.sort();

        Ok(DirectoryContent {
            path: dir.to_string(),
            files,
            directories,
        })
    }

    /// Remove empty mirror directories between `entry` and the mirror root.
    fn prune_empty_parents(&self, entry: &Path) {
        let mut current = entry.parent();
        while let Some(dir) = current {
            if dir == self.mirror_root || !dir.starts_with(&self.mirror_root) {
                break;
            }
            if std::fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}
