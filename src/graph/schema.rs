//! Graph schema definitions for Architectum
//!
//! Nodes and relationships are closed sum types. The `type` tag and the
//! kind-specific payload are flattened into one JSON object so the persisted
//! graph reads as `{"id": .., "type": "function", "name": .., ...}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::detail::{keeps_metadata_key, DetailLevel, Project};

/// Open metadata attached to nodes, relationships and code elements.
pub type Metadata = BTreeMap<String, Value>;

/// Deterministic node identity.
///
/// | kind | id |
/// |------|----|
/// | File | `file:<path>` |
/// | Directory | `dir:<path>` |
/// | Function / Class / Method | `elem:<path>::<qualified.name>` |
/// | Feature | `feature:<name>` |
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn file(path: &str) -> Self {
        NodeId(format!("file:{}", path))
    }

    pub fn directory(path: &str) -> Self {
        NodeId(format!("dir:{}", path))
    }

    pub fn element(path: &str, qualified_name: &str) -> Self {
        NodeId(format!("elem:{}::{}", path, qualified_name))
    }

    pub fn feature(name: &str) -> Self {
        NodeId(format!("feature:{}", name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File path encoded in a `file:` or `elem:` id.
    pub fn file_path(&self) -> Option<&str> {
        if let Some(path) = self.0.strip_prefix("file:") {
            return Some(path);
        }
        self.0
            .strip_prefix("elem:")
            .and_then(|rest| rest.split_once("::"))
            .map(|(path, _)| path)
    }

    /// Qualified element name encoded in an `elem:` id.
    pub fn qualified_name(&self) -> Option<&str> {
        self.0
            .strip_prefix("elem:")
            .and_then(|rest| rest.split_once("::"))
            .map(|(_, qualname)| qualname)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// Function or method parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_optional: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_variadic: bool,
}

impl ParameterInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_hint: None,
            default_value: None,
            is_optional: false,
            is_variadic: false,
        }
    }
}

/// Class attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyInfo {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
}

/// Kind tag plus kind-specific payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    File {
        path: String,
        extension: String,
    },
    Directory {
        path: String,
    },
    Function {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        parameters: Vec<ParameterInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        return_type: Option<String>,
        line_start: u32,
        line_end: u32,
    },
    Class {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        properties: Vec<PropertyInfo>,
        line_start: u32,
        line_end: u32,
    },
    Method {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_class: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        parameters: Vec<ParameterInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        return_type: Option<String>,
        line_start: u32,
        line_end: u32,
    },
    Feature {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

/// Fieldless node kind for filtering and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    File,
    Directory,
    Function,
    Class,
    Method,
    Feature,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Directory => "directory",
            NodeType::Function => "function",
            NodeType::Class => "class",
            NodeType::Method => "method",
            NodeType::Feature => "feature",
        }
    }

    /// Functions, classes and methods.
    pub fn is_code_element(&self) -> bool {
        matches!(self, NodeType::Function | NodeType::Class | NodeType::Method)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::File { .. } => NodeType::File,
            NodeKind::Directory { .. } => NodeType::Directory,
            NodeKind::Function { .. } => NodeType::Function,
            NodeKind::Class { .. } => NodeType::Class,
            NodeKind::Method { .. } => NodeType::Method,
            NodeKind::Feature { .. } => NodeType::Feature,
        }
    }
}

/// A graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Normalized path of the file whose parse produced this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            owner: None,
            metadata: Metadata::new(),
        }
    }

    pub fn file(path: &str) -> Self {
        Self::new(
            NodeId::file(path),
            NodeKind::File {
                path: path.to_string(),
                extension: crate::validation::extension_of(path),
            },
        )
        .with_owner(path)
    }

    pub fn directory(path: &str) -> Self {
        Self::new(
            NodeId::directory(path),
            NodeKind::Directory {
                path: path.to_string(),
            },
        )
    }

    /// Function, class or method node owned by `path`.
    pub fn element(path: &str, qualified_name: &str, kind: NodeKind) -> Self {
        Self::new(NodeId::element(path, qualified_name), kind).with_owner(path)
    }

    pub fn feature(name: &str, description: Option<&str>) -> Self {
        Self::new(
            NodeId::feature(name),
            NodeKind::Feature {
                name: name.to_string(),
                description: description.map(str::to_string),
            },
        )
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn node_type(&self) -> NodeType {
        self.kind.node_type()
    }

    /// Display name: the path for files and directories, the name otherwise.
    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::File { path, .. } | NodeKind::Directory { path } => path,
            NodeKind::Function { name, .. }
            | NodeKind::Class { name, .. }
            | NodeKind::Method { name, .. }
            | NodeKind::Feature { name, .. } => name,
        }
    }

    pub fn line_range(&self) -> Option<(u32, u32)> {
        match &self.kind {
            NodeKind::Function {
                line_start,
                line_end,
                ..
            }
            | NodeKind::Class {
                line_start,
                line_end,
                ..
            }
            | NodeKind::Method {
                line_start,
                line_end,
                ..
            } => Some((*line_start, *line_end)),
            _ => None,
        }
    }
}

impl Project for Node {
    fn project(&self, level: DetailLevel) -> Self {
        let mut node = self.clone();
        node.metadata.retain(|key, _| keeps_metadata_key(level, key));
        if level < DetailLevel::Standard {
            match &mut node.kind {
                NodeKind::Function {
                    parameters,
                    return_type,
                    ..
                } => {
                    parameters.clear();
                    *return_type = None;
                }
                NodeKind::Method {
                    parent_class,
                    parameters,
                    return_type,
                    ..
                } => {
                    *parent_class = None;
                    parameters.clear();
                    *return_type = None;
                }
                NodeKind::Class { properties, .. } => properties.clear(),
                NodeKind::Feature { description, .. } => *description = None,
                NodeKind::File { .. } | NodeKind::Directory { .. } => {}
            }
        }
        node
    }
}

/// Relationship kind tag plus payload.
///
/// Directions: Contains is container → contained, Calls is caller → callee,
/// Imports is importer → imported, Inherits is child → parent, Implements is
/// code element → feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelationshipKind {
    Contains,
    Calls {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        line_number: Option<u32>,
    },
    Imports,
    Inherits,
    Implements,
}

/// Fieldless relationship kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    Contains,
    Calls,
    Imports,
    Inherits,
    Implements,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Contains => "contains",
            RelationshipType::Calls => "calls",
            RelationshipType::Imports => "imports",
            RelationshipType::Inherits => "inherits",
            RelationshipType::Implements => "implements",
        }
    }

    /// Edge kinds that cross file boundaries during blueprint expansion.
    pub fn is_cross_file(&self) -> bool {
        matches!(
            self,
            RelationshipType::Calls | RelationshipType::Imports | RelationshipType::Inherits
        )
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RelationshipKind {
    pub fn relationship_type(&self) -> RelationshipType {
        match self {
            RelationshipKind::Contains => RelationshipType::Contains,
            RelationshipKind::Calls { .. } => RelationshipType::Calls,
            RelationshipKind::Imports => RelationshipType::Imports,
            RelationshipKind::Inherits => RelationshipType::Inherits,
            RelationshipKind::Implements => RelationshipType::Implements,
        }
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_id: NodeId,
    pub target_id: NodeId,
    #[serde(flatten)]
    pub kind: RelationshipKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl Relationship {
    pub fn new(source_id: NodeId, target_id: NodeId, kind: RelationshipKind) -> Self {
        Self {
            source_id,
            target_id,
            kind,
            metadata: Metadata::new(),
        }
    }

    pub fn contains(source_id: NodeId, target_id: NodeId) -> Self {
        Self::new(source_id, target_id, RelationshipKind::Contains)
    }

    pub fn calls(source_id: NodeId, target_id: NodeId, line_number: Option<u32>) -> Self {
        Self::new(source_id, target_id, RelationshipKind::Calls { line_number })
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn relationship_type(&self) -> RelationshipType {
        self.kind.relationship_type()
    }

    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source_id == id || &self.target_id == id
    }
}

impl Project for Relationship {
    fn project(&self, level: DetailLevel) -> Self {
        let mut rel = self.clone();
        if level < DetailLevel::Detailed {
            rel.metadata.clear();
        }
        if level < DetailLevel::Standard {
            if let RelationshipKind::Calls { line_number } = &mut rel.kind {
                *line_number = None;
            }
        }
        rel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_method() -> Node {
        Node::element(
            "pkg/a.py",
            "Service.run",
            NodeKind::Method {
                name: "run".to_string(),
                parent_class: Some("elem:pkg/a.py::Service".to_string()),
                parameters: vec![ParameterInfo {
                    type_hint: Some("int".to_string()),
                    ..ParameterInfo::named("n")
                }],
                return_type: Some("str".to_string()),
                line_start: 4,
                line_end: 9,
            },
        )
        .with_metadata("docstring", "Run the service.")
    }

    #[test]
    fn test_node_id_components() {
        let id = NodeId::element("pkg/a.py", "Service.run");
        assert_eq!(id.as_str(), "elem:pkg/a.py::Service.run");
        assert_eq!(id.file_path(), Some("pkg/a.py"));
        assert_eq!(id.qualified_name(), Some("Service.run"));
        assert_eq!(NodeId::file("a.py").file_path(), Some("a.py"));
        assert_eq!(NodeId::directory("src").file_path(), None);
    }

    #[test]
    fn test_node_json_is_flat() {
        let json = serde_json::to_value(Node::file("src/a.py")).unwrap();
        assert_eq!(json["id"], "file:src/a.py");
        assert_eq!(json["type"], "file");
        assert_eq!(json["extension"], "py");
        assert_eq!(json["owner"], "src/a.py");
    }

    #[test]
    fn test_node_json_round_trip() {
        let node = sample_method();
        let text = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&text).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_relationship_json_carries_line_number() {
        let rel = Relationship::calls(
            NodeId::element("b.py", "bar"),
            NodeId::element("a.py", "foo"),
            Some(3),
        );
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"], "calls");
        assert_eq!(json["line_number"], 3);
        let back: Relationship = serde_json::from_value(json).unwrap();
        assert_eq!(back, rel);
    }

    #[test]
    fn test_node_projection_is_monotonic() {
        let node = sample_method();
        let keys = |level| {
            let value = serde_json::to_value(node.project(level)).unwrap();
            value
                .as_object()
                .unwrap()
                .keys()
                .cloned()
                .collect::<std::collections::BTreeSet<_>>()
        };
        let minimal = keys(DetailLevel::Minimal);
        let standard = keys(DetailLevel::Standard);
        let detailed = keys(DetailLevel::Detailed);

        assert!(minimal.is_subset(&standard));
        assert!(standard.is_subset(&detailed));
        assert!(!minimal.contains("parameters"));
        assert!(standard.contains("return_type"));
        assert!(!standard.contains("metadata"));
        assert!(detailed.contains("metadata"));
    }

    #[test]
    fn test_relationship_projection() {
        let rel = Relationship::calls(NodeId::from("x"), NodeId::from("y"), Some(7))
            .with_metadata("resolved_by", "import");
        assert_eq!(
            rel.project(DetailLevel::Minimal).kind,
            RelationshipKind::Calls { line_number: None }
        );
        assert!(rel.project(DetailLevel::Standard).metadata.is_empty());
        assert_eq!(rel.project(DetailLevel::Detailed), rel);
    }

    #[test]
    fn test_standard_node_keeps_signature_metadata() {
        let node = sample_method()
            .with_metadata("visibility", "public")
            .with_metadata("decorators", serde_json::json!(["staticmethod"]));

        let standard = node.project(DetailLevel::Standard);
        assert_eq!(standard.metadata["visibility"], "public");
        assert_eq!(standard.metadata["decorators"], serde_json::json!(["staticmethod"]));
        assert!(!standard.metadata.contains_key("docstring"));
        assert!(node.project(DetailLevel::Minimal).metadata.is_empty());
        assert_eq!(node.project(DetailLevel::Detailed).metadata.len(), 3);

        let element = crate::mirror::CodeElement::new("run", NodeType::Method, 4, 9)
            .with_metadata("visibility", "public")
            .with_metadata("decorators", serde_json::json!(["staticmethod"]))
            .with_metadata("docstring", "Run the service.");
        let mirrored_projection = element.project(DetailLevel::Standard);
        let mirrored: Vec<&String> = mirrored_projection.metadata.keys().collect();
        let graphed: Vec<&String> = standard.metadata.keys().collect();
        assert_eq!(mirrored, graphed);
    }
}
