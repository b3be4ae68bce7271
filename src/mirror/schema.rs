//! Mirror entry types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detail::{keeps_metadata_key, DetailLevel, Project};
use crate::graph::{Metadata, NodeType};

pub use crate::detail::STANDARD_METADATA_KEYS;

/// One named element of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeElement {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub line_start: u32,
    pub line_end: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl CodeElement {
    pub fn new(name: impl Into<String>, kind: NodeType, line_start: u32, line_end: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            line_start,
            line_end,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

impl Project for CodeElement {
    fn project(&self, level: DetailLevel) -> Self {
        let mut element = self.clone();
        element.metadata.retain(|key, _| keeps_metadata_key(level, key));
        element
    }
}

/// Mirrored content of one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub extension: String,
    /// Keyed by qualified element name.
    #[serde(default)]
    pub elements: BTreeMap<String, CodeElement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default)]
    pub content_hash: String,
}

impl FileContent {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            extension: crate::validation::extension_of(path),
            elements: BTreeMap::new(),
            imports: Vec::new(),
            content_hash: String::new(),
        }
    }

    /// Copy restricted to the named elements.
    pub fn retain_elements<'a, I>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keep: Vec<&str> = names.into_iter().collect();
        let mut content = self.clone();
        content.elements.retain(|name, _| keep.contains(&name.as_str()));
        content
    }
}

impl Project for FileContent {
    fn project(&self, level: DetailLevel) -> Self {
        let mut content = self.clone();
        if level < DetailLevel::Standard {
            content.imports.clear();
        }
        for element in content.elements.values_mut() {
            *element = element.project(level);
        }
        content
    }
}

/// Mirrored listing of one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryContent {
    pub path: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub directories: Vec<String>,
}

impl Project for DirectoryContent {
    fn project(&self, _level: DetailLevel) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn sample() -> FileContent {
        let mut content = FileContent::new("pkg/a.py");
        content.imports.push("pkg/b.py".to_string());
        content.content_hash = "abc".to_string();
        content.elements.insert(
            "foo".to_string(),
            CodeElement::new("foo", NodeType::Function, 1, 4)
                .with_metadata("signature", "(x: int) -> str")
                .with_metadata("docstring", "Convert x."),
        );
        content
    }

    fn keys(value: &serde_json::Value) -> BTreeSet<String> {
        value.as_object().unwrap().keys().cloned().collect()
    }

    #[test]
    fn test_file_content_projection_is_monotonic() {
        let content = sample();
        let levels: Vec<serde_json::Value> = DetailLevel::ALL
            .iter()
            .map(|level| serde_json::to_value(content.project(*level)).unwrap())
            .collect();

        for pair in levels.windows(2) {
            assert!(keys(&pair[0]).is_subset(&keys(&pair[1])));
            let lower = &pair[0]["elements"]["foo"];
            let upper = &pair[1]["elements"]["foo"];
            assert!(keys(lower).is_subset(&keys(upper)));
        }

        assert!(levels[0].get("imports").is_none());
        assert!(levels[0]["elements"]["foo"].get("metadata").is_none());
        assert_eq!(levels[1]["elements"]["foo"]["metadata"]["signature"], "(x: int) -> str");
        assert!(levels[1]["elements"]["foo"]["metadata"].get("docstring").is_none());
        assert_eq!(levels[2]["elements"]["foo"]["metadata"]["docstring"], "Convert x.");
    }

    #[test]
    fn test_content_hash_survives_every_level() {
        for level in DetailLevel::ALL {
            assert_eq!(sample().project(level).content_hash, "abc");
        }
    }

    #[test]
    fn test_retain_elements() {
        let content = sample().retain_elements(["bogus"]);
        assert!(content.elements.is_empty());
        assert_eq!(sample().retain_elements(["foo"]).elements.len(), 1);
    }
}
