//! Shared fixtures for integration tests.
#![allow(dead_code)]

use architectum::{
    Architectum, ArchitectumConfig, ArchitectumError, CodeElement, Node, NodeId, NodeKind,
    ParseOutput, Parser, ParserRegistry, Relationship, Result, SourceFile,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Line-oriented test language:
///
/// ```text
/// # comment           ignored
/// fn NAME             function NAME at this line
/// call PATH::NAME     call from the last function
/// sleep MS            stall the parser
/// fail                parse error
/// ```
#[derive(Debug, Default)]
pub struct ScriptedParser;

impl Parser for ScriptedParser {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn parse(&self, file: &SourceFile) -> Result<ParseOutput> {
        let bytes = file.read()?;
        let text = String::from_utf8_lossy(&bytes);
        let path = file.rel_path.as_str();
        let mut output = ParseOutput::for_file(path);
        let mut current: Option<NodeId> = None;

        for (index, line) in text.lines().enumerate() {
            let line_no = index as u32 + 1;
            let words: Vec<&str> = line.split_whitespace().collect();
            match words.as_slice() {
                ["fn", name] => {
                    let id = NodeId::element(path, name);
                    output.nodes.push(Node::element(
                        path,
                        name,
                        NodeKind::Function {
                            name: name.to_string(),
                            parameters: Vec::new(),
                            return_type: None,
                            line_start: line_no,
                            line_end: line_no,
                        },
                    ));
                    output
                        .relationships
                        .push(Relationship::contains(NodeId::file(path), id.clone()));
                    output.content.elements.insert(
                        name.to_string(),
                        CodeElement::new(*name, architectum::NodeType::Function, line_no, line_no),
                    );
                    current = Some(id);
                }
                ["call", target] => {
                    let Some(source) = current.clone() else {
                        return Err(ArchitectumError::parse(path, "call outside a function"));
                    };
                    let (target_path, target_name) = target
                        .split_once("::")
                        .ok_or_else(|| ArchitectumError::parse(path, "call target needs PATH::NAME"))?;
                    output.relationships.push(Relationship::calls(
                        source,
                        NodeId::element(target_path, target_name),
                        Some(line_no),
                    ));
                }
                ["sleep", ms] => {
                    let ms: u64 = ms.parse().map_err(|_| ArchitectumError::parse(path, "bad sleep"))?;
                    std::thread::sleep(Duration::from_millis(ms));
                }
                ["fail"] => return Err(ArchitectumError::parse(path, "scripted failure")),
                _ => {}
            }
        }
        Ok(output)
    }
}

pub struct Project {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = fs::canonicalize(temp_dir.path()).unwrap();
        Self { temp_dir, root }
    }

    pub fn write(&self, rel: &str, contents: &str) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.root.join(rel)).unwrap();
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn state(&self, rel: &str) -> PathBuf {
        self.root.join(".architectum").join(rel)
    }

    /// Workspace where every file goes through [`ScriptedParser`].
    pub fn scripted(&self) -> Architectum {
        self.scripted_with(ArchitectumConfig::default())
    }

    pub fn scripted_with(&self, config: ArchitectumConfig) -> Architectum {
        let registry = ParserRegistry::new(Arc::new(ScriptedParser));
        Architectum::open_with(&self.root, config, registry).unwrap()
    }

    /// Workspace with the bundled parsers.
    pub fn bundled(&self) -> Architectum {
        Architectum::open(&self.root).unwrap()
    }
}

pub fn read_bytes(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap()
}

pub fn strings(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}
