//! Source parsers.
//!
//! A parser turns one file into the nodes, relationships and mirror content it
//! contributes. The sync orchestrator only sees the [`Parser`] trait; the
//! [`ParserRegistry`] picks an implementation by extension.

pub mod plain;
pub mod python;

pub use plain::PlainFileParser;
pub use python::PythonParser;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ArchitectumError, Result};
use crate::graph::{Node, Relationship};
use crate::mirror::FileContent;
use crate::validation::{extension_of, resolve};

/// A file handed to a parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub abs_path: PathBuf,
    /// Normalized root-relative path; node ids are built from it.
    pub rel_path: String,
    /// Extension without the dot.
    pub extension: String,
}

impl SourceFile {
    pub fn new(root: &Path, rel_path: &str) -> Self {
        Self {
            abs_path: resolve(root, rel_path),
            rel_path: rel_path.to_string(),
            extension: extension_of(rel_path),
        }
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.abs_path).map_err(|e| ArchitectumError::io(&self.rel_path, e))
    }
}

/// Everything one file contributes to the stores.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
    pub content: FileContent,
}

impl ParseOutput {
    /// Contribution with only the File node and an empty mirror entry.
    pub fn for_file(path: &str) -> Self {
        Self {
            nodes: vec![Node::file(path)],
            relationships: Vec::new(),
            content: FileContent::new(path),
        }
    }
}

/// Language-specific extractor.
///
/// Implementations must be pure with respect to the stores: they may read the
/// file (and inspect the filesystem to resolve imports) but never mutate
/// anything. Failures are reported as `ArchitectumError::Parse` or `Io`.
pub trait Parser: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, file: &SourceFile) -> Result<ParseOutput>;
}

/// Extension-keyed parser dispatch with a fallback.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: BTreeMap<String, Arc<dyn Parser>>,
    fallback: Arc<dyn Parser>,
}

impl ParserRegistry {
    /// Registry where every file goes to `fallback`.
    pub fn new(fallback: Arc<dyn Parser>) -> Self {
        Self {
            parsers: BTreeMap::new(),
            fallback,
        }
    }

    /// Python parser for `.py`/`.pyi`, plain parser for everything else.
    pub fn with_defaults(root: &Path) -> Self {
        let python: Arc<dyn Parser> = Arc::new(PythonParser::new(root));
        let mut registry = Self::new(Arc::new(PlainFileParser));
        registry.register("py", Arc::clone(&python));
        registry.register("pyi", python);
        registry
    }

    pub fn register(&mut self, extension: &str, parser: Arc<dyn Parser>) {
        self.parsers
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), parser);
    }

    pub fn for_extension(&self, extension: &str) -> Arc<dyn Parser> {
        self.parsers
            .get(&extension.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }

    /// Registered extensions, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        self.parsers.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("extensions", &self.extensions())
            .field("fallback", &self.fallback.name())
            .finish()
    }
}
