//! Python extraction using tree-sitter-python.
//!
//! Extracts functions, classes and methods (nested definitions are contained
//! by their enclosing element), import statements, call sites and base
//! classes. Imports are resolved against the filesystem so that calls into
//! other project files become cross-file `Calls` edges; targets that are not
//! synced yet are left for the graph to park.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use tree_sitter::Node as SyntaxNode;

use super::{ParseOutput, Parser, SourceFile};
use crate::error::{ArchitectumError, Result};
use crate::graph::{
    Metadata, Node, NodeId, NodeKind, NodeType, ParameterInfo, PropertyInfo, Relationship,
    RelationshipKind,
};
use crate::mirror::{CodeElement, FileContent};
use crate::validation::{join, parent_of, ROOT};

/// Parser for `.py` sources.
///
/// Holds only the project root, used to resolve imports to files. A fresh
/// tree-sitter parser is built per call so one instance can serve any number
/// of worker threads.
#[derive(Debug, Clone)]
pub struct PythonParser {
    root: PathBuf,
}

impl PythonParser {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Parser for PythonParser {
    fn name(&self) -> &'static str {
        "python"
    }

    fn parse(&self, file: &SourceFile) -> Result<ParseOutput> {
        let source = file.read()?;
        if let Err(e) = std::str::from_utf8(&source) {
            return Err(ArchitectumError::parse(
                &file.rel_path,
                format!("source is not valid UTF-8: {}", e),
            ));
        }

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::language())
            .map_err(|e| ArchitectumError::parse(&file.rel_path, e.to_string()))?;
        let tree = parser
            .parse(&source, None)
            .ok_or_else(|| ArchitectumError::parse(&file.rel_path, "parser produced no tree"))?;

        let root_node = tree.root_node();
        if root_node.has_error() {
            let line = first_error_line(root_node).unwrap_or(1);
            return Err(ArchitectumError::parse(
                &file.rel_path,
                format!("syntax error near line {}", line),
            ));
        }

        let mut extraction = Extraction::new(&self.root, &file.rel_path, &source);
        extraction.visit(root_node, &mut Vec::new());
        Ok(extraction.finish())
    }
}

/// Enclosing definition while walking.
#[derive(Debug, Clone)]
struct Scope {
    qualname: String,
    kind: NodeType,
}

/// What an imported name refers to.
#[derive(Debug, Clone)]
enum Binding {
    Module(String),
    Symbol { file: String, name: String },
}

#[derive(Debug)]
struct CallSite {
    caller: String,
    callee: String,
    line: u32,
}

struct Extraction<'s> {
    root: &'s Path,
    path: &'s str,
    source: &'s [u8],
    nodes: Vec<Node>,
    relationships: Vec<Relationship>,
    content: FileContent,
    /// qualified name -> kind, for local resolution
    definitions: HashMap<String, NodeType>,
    bindings: HashMap<String, Binding>,
    imported_files: Vec<String>,
    calls: Vec<CallSite>,
    /// (class qualname, enclosing qualname, base expressions)
    bases: Vec<(String, String, Vec<String>)>,
}

impl<'s> Extraction<'s> {
    fn new(root: &'s Path, path: &'s str, source: &'s [u8]) -> Self {
        Self {
            root,
            path,
            source,
            nodes: vec![Node::file(path)],
            relationships: Vec::new(),
            content: FileContent::new(path),
            definitions: HashMap::new(),
            bindings: HashMap::new(),
            imported_files: Vec::new(),
            calls: Vec::new(),
            bases: Vec::new(),
        }
    }

    fn text(&self, node: SyntaxNode<'_>) -> String {
        node.utf8_text(self.source).unwrap_or_default().to_string()
    }

    fn field_text(&self, node: SyntaxNode<'_>, field: &str) -> Option<String> {
        node.child_by_field_name(field).map(|child| self.text(child))
    }

    fn visit(&mut self, node: SyntaxNode<'_>, scope: &mut Vec<Scope>) {
        match node.kind() {
            "function_definition" => self.define_function(node, Vec::new(), scope),
            "class_definition" => self.define_class(node, Vec::new(), scope),
            "decorated_definition" => {
                let mut decorators = Vec::new();
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() == "decorator" {
                        decorators.push(self.text(child).trim_start_matches('@').trim().to_string());
                    }
                }
                match node.child_by_field_name("definition") {
                    Some(def) if def.kind() == "function_definition" => {
                        self.define_function(def, decorators, scope)
                    }
                    Some(def) if def.kind() == "class_definition" => {
                        self.define_class(def, decorators, scope)
                    }
                    Some(def) => self.visit(def, scope),
                    None => {}
                }
            }
            "import_statement" => self.record_import(node),
            "import_from_statement" => self.record_from_import(node),
            "call" => {
                self.record_call(node, scope);
                self.visit_children(node, scope);
            }
            _ => self.visit_children(node, scope),
        }
    }

    fn visit_children(&mut self, node: SyntaxNode<'_>, scope: &mut Vec<Scope>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child, scope);
        }
    }

    fn define_function(&mut self, node: SyntaxNode<'_>, decorators: Vec<String>, scope: &mut Vec<Scope>) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let qualname = qualify(scope, &name);
        if self.definitions.contains_key(&qualname) {
            // Redefinitions (property setters, conditional defs) keep the first.
            debug!(path = self.path, qualname = %qualname, "skipping redefinition");
            return;
        }

        let (line_start, line_end) = line_range(node);
        let params_node = node.child_by_field_name("parameters");
        let parameters = params_node.map(|p| self.parameters(p)).unwrap_or_default();
        let return_type = self.field_text(node, "return_type");
        let body = node.child_by_field_name("body");
        let docstring = body.and_then(|b| self.docstring(b));

        let mut signature = params_node.map(|p| self.text(p)).unwrap_or_else(|| "()".to_string());
        if let Some(ret) = &return_type {
            signature = format!("{} -> {}", signature, ret);
        }

        let kind = match scope.last() {
            Some(parent) if parent.kind == NodeType::Class => NodeKind::Method {
                name: name.clone(),
                parent_class: Some(NodeId::element(self.path, &parent.qualname).to_string()),
                parameters: parameters.clone(),
                return_type: return_type.clone(),
                line_start,
                line_end,
            },
            _ => NodeKind::Function {
                name: name.clone(),
                parameters: parameters.clone(),
                return_type: return_type.clone(),
                line_start,
                line_end,
            },
        };

        let mut metadata = Metadata::new();
        metadata.insert("signature".to_string(), json!(signature));
        metadata.insert(
            "parameters".to_string(),
            Value::Array(parameters.iter().map(|p| json!(p.name)).collect()),
        );
        if let Some(ret) = return_type {
            metadata.insert("return_type".to_string(), json!(ret));
        }
        self.add_element(&qualname, &name, kind, scope, metadata, docstring, decorators);

        scope.push(Scope {
            qualname,
            kind: NodeType::Function,
        });
        if let Some(body) = body {
            self.visit(body, scope);
        }
        scope.pop();
    }

    fn define_class(&mut self, node: SyntaxNode<'_>, decorators: Vec<String>, scope: &mut Vec<Scope>) {
        let Some(name) = self.field_text(node, "name") else {
            return;
        };
        let qualname = qualify(scope, &name);
        if self.definitions.contains_key(&qualname) {
            debug!(path = self.path, qualname = %qualname, "skipping redefinition");
            return;
        }

        let (line_start, line_end) = line_range(node);
        let body = node.child_by_field_name("body");
        let docstring = body.and_then(|b| self.docstring(b));
        let properties = body.map(|b| self.properties(b)).unwrap_or_default();

        let mut bases = Vec::new();
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if matches!(base.kind(), "identifier" | "attribute") {
                    bases.push(self.text(base));
                }
            }
        }

        let mut metadata = Metadata::new();
        if !bases.is_empty() {
            metadata.insert("bases".to_string(), json!(bases));
        }
        let enclosing = scope.last().map(|s| s.qualname.clone()).unwrap_or_default();
        self.bases.push((qualname.clone(), enclosing, bases));

        let kind = NodeKind::Class {
            name: name.clone(),
            properties,
            line_start,
            line_end,
        };
        self.add_element(&qualname, &name, kind, scope, metadata, docstring, decorators);

        scope.push(Scope {
            qualname,
            kind: NodeType::Class,
        });
        if let Some(body) = body {
            self.visit(body, scope);
        }
        scope.pop();
    }

    #[allow(clippy::too_many_arguments)]
    fn add_element(
        &mut self,
        qualname: &str,
        name: &str,
        kind: NodeKind,
        scope: &[Scope],
        mut metadata: Metadata,
        docstring: Option<String>,
        decorators: Vec<String>,
    ) {
        let node_type = kind.node_type();
        let mut node = Node::element(self.path, qualname, kind);
        let (line_start, line_end) = node.line_range().unwrap_or((0, 0));

        metadata.insert("visibility".to_string(), json!(visibility(name)));
        node = node.with_metadata("visibility", visibility(name));
        if !decorators.is_empty() {
            metadata.insert("decorators".to_string(), json!(decorators));
            node = node.with_metadata("decorators", json!(decorators));
        }
        if let Some(doc) = docstring {
            if let Some(summary) = doc.lines().find(|line| !line.trim().is_empty()) {
                metadata.insert("doc_summary".to_string(), json!(summary.trim()));
            }
            node = node.with_metadata("docstring", doc.clone());
            metadata.insert("docstring".to_string(), json!(doc));
        }

        let container = match scope.last() {
            Some(parent) => NodeId::element(self.path, &parent.qualname),
            None => NodeId::file(self.path),
        };
        self.relationships
            .push(Relationship::contains(container, node.id.clone()));

        let mut element = CodeElement::new(name, node_type, line_start, line_end);
        element.metadata = metadata;
        self.content.elements.insert(qualname.to_string(), element);
        self.definitions.insert(qualname.to_string(), node_type);
        self.nodes.push(node);
    }

    fn parameters(&self, params: SyntaxNode<'_>) -> Vec<ParameterInfo> {
        let mut result = Vec::new();
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            let info = match param.kind() {
                "identifier" => ParameterInfo::named(self.text(param)),
                "typed_parameter" => {
                    let Some(inner) = param.named_child(0) else {
                        continue;
                    };
                    let variadic = matches!(
                        inner.kind(),
                        "list_splat_pattern" | "dictionary_splat_pattern"
                    );
                    ParameterInfo {
                        type_hint: self.field_text(param, "type"),
                        is_variadic: variadic,
                        ..ParameterInfo::named(self.text(inner).trim_start_matches('*'))
                    }
                }
                "default_parameter" | "typed_default_parameter" => {
                    let Some(name) = self.field_text(param, "name") else {
                        continue;
                    };
                    ParameterInfo {
                        type_hint: self.field_text(param, "type"),
                        default_value: self.field_text(param, "value"),
                        is_optional: true,
                        ..ParameterInfo::named(name)
                    }
                }
                "list_splat_pattern" | "dictionary_splat_pattern" => ParameterInfo {
                    is_variadic: true,
                    ..ParameterInfo::named(self.text(param).trim_start_matches('*'))
                },
                _ => continue,
            };
            result.push(info);
        }
        result
    }

    /// Class-level assignments plus `self.x = ...` in `__init__`.
    fn properties(&self, body: SyntaxNode<'_>) -> Vec<PropertyInfo> {
        let mut properties: Vec<PropertyInfo> = Vec::new();
        let mut cursor = body.walk();
        for statement in body.named_children(&mut cursor) {
            match statement.kind() {
                "expression_statement" => {
                    if let Some(assignment) = statement.named_child(0) {
                        if assignment.kind() != "assignment" {
                            continue;
                        }
                        let Some(left) = assignment.child_by_field_name("left") else {
                            continue;
                        };
                        if left.kind() == "identifier" {
                            let name = self.text(left);
                            push_property(
                                &mut properties,
                                PropertyInfo {
                                    visibility: Some(visibility(&name).to_string()),
                                    type_hint: self.field_text(assignment, "type"),
                                    is_static: true,
                                    name,
                                },
                            );
                        }
                    }
                }
                "function_definition" | "decorated_definition" => {
                    let def = if statement.kind() == "decorated_definition" {
                        match statement.child_by_field_name("definition") {
                            Some(def) => def,
                            None => continue,
                        }
                    } else {
                        statement
                    };
                    if self.field_text(def, "name").as_deref() != Some("__init__") {
                        continue;
                    }
                    if let Some(init_body) = def.child_by_field_name("body") {
                        self.instance_attributes(init_body, &mut properties);
                    }
                }
                _ => {}
            }
        }
        properties
    }

    fn instance_attributes(&self, node: SyntaxNode<'_>, properties: &mut Vec<PropertyInfo>) {
        if node.kind() == "assignment" {
            if let Some(left) = node.child_by_field_name("left") {
                let object = left.child_by_field_name("object").map(|o| self.text(o));
                if left.kind() == "attribute" && object.as_deref() == Some("self") {
                    if let Some(name) = self.field_text(left, "attribute") {
                        push_property(
                            properties,
                            PropertyInfo {
                                visibility: Some(visibility(&name).to_string()),
                                type_hint: self.field_text(node, "type"),
                                is_static: false,
                                name,
                            },
                        );
                    }
                }
            }
        }
        if matches!(node.kind(), "function_definition" | "class_definition") {
            return;
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.instance_attributes(child, properties);
        }
    }

    /// First statement of a block when it is a string literal.
    fn docstring(&self, body: SyntaxNode<'_>) -> Option<String> {
        let mut cursor = body.walk();
        let first = body
            .named_children(&mut cursor)
            .find(|child| child.kind() != "comment")?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let literal = first.named_child(0)?;
        if literal.kind() != "string" {
            return None;
        }
        Some(clean_docstring(&self.text(literal)))
    }

    fn record_import(&mut self, node: SyntaxNode<'_>) {
        let mut cursor = node.walk();
        let names: Vec<SyntaxNode<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for name in names {
            let (module, alias) = match name.kind() {
                "aliased_import" => (
                    self.field_text(name, "name").unwrap_or_default(),
                    self.field_text(name, "alias"),
                ),
                _ => (self.text(name), None),
            };
            if module.is_empty() {
                continue;
            }
            self.content.imports.push(module.clone());
            if let Some(file) = self.resolve_module(0, &module) {
                self.note_imported_file(&file);
                self.bindings
                    .insert(alias.unwrap_or(module), Binding::Module(file));
            }
        }
    }

    fn record_from_import(&mut self, node: SyntaxNode<'_>) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let written = self.text(module_node);
        let dots = written.chars().take_while(|c| *c == '.').count();
        let module = written[dots..].to_string();
        self.content.imports.push(written.clone());

        let module_file = self.resolve_module(dots, &module);
        if let Some(file) = &module_file {
            self.note_imported_file(file);
        }

        let mut cursor = node.walk();
        let names: Vec<SyntaxNode<'_>> = node.children_by_field_name("name", &mut cursor).collect();
        for name_node in names {
            let (name, alias) = match name_node.kind() {
                "aliased_import" => (
                    self.field_text(name_node, "name").unwrap_or_default(),
                    self.field_text(name_node, "alias"),
                ),
                _ => (self.text(name_node), None),
            };
            if name.is_empty() {
                continue;
            }
            let local = alias.unwrap_or_else(|| name.clone());
            let submodule = if module.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", module, name)
            };
            if let Some(file) = self.resolve_module(dots, &submodule) {
                self.note_imported_file(&file);
                self.bindings.insert(local, Binding::Module(file));
            } else if let Some(file) = &module_file {
                self.bindings.insert(
                    local,
                    Binding::Symbol {
                        file: file.clone(),
                        name,
                    },
                );
            }
        }
    }

    fn note_imported_file(&mut self, file: &str) {
        if file != self.path && !self.imported_files.iter().any(|f| f == file) {
            self.imported_files.push(file.to_string());
        }
    }

    /// Map a (possibly relative) dotted module to a project file.
    ///
    /// Relative imports start from the importing file's directory, one level
    /// up per extra dot. Absolute imports try the importing directory, then
    /// the project root.
    fn resolve_module(&self, dots: usize, module: &str) -> Option<String> {
        let here = parent_of(self.path).unwrap_or_else(|| ROOT.to_string());
        let bases = if dots > 0 {
            let mut base = here;
            for _ in 1..dots {
                base = parent_of(&base)?;
            }
            vec![base]
        } else {
            vec![here, ROOT.to_string()]
        };

        for base in bases {
            let stem = if module.is_empty() {
                base.clone()
            } else {
                join(&base, &module.replace('.', "/"))
            };
            let candidates = if module.is_empty() {
                vec![join(&stem, "__init__.py")]
            } else {
                vec![format!("{}.py", stem), join(&stem, "__init__.py")]
            };
            for candidate in candidates {
                if self.root.join(&candidate).is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }

    fn record_call(&mut self, node: SyntaxNode<'_>, scope: &[Scope]) {
        let Some(caller) = scope
            .iter()
            .rev()
            .find(|s| s.kind == NodeType::Function)
            .map(|s| s.qualname.clone())
        else {
            return;
        };
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        if !matches!(function.kind(), "identifier" | "attribute") {
            return;
        }
        let callee: String = self.text(function).split_whitespace().collect();
        self.calls.push(CallSite {
            caller,
            callee,
            line: node.start_position().row as u32 + 1,
        });
    }

    /// Resolve a name used inside `scope_qualname` to a node id.
    fn resolve_target(&self, scope_qualname: &str, expr: &str) -> Option<NodeId> {
        let Some((prefix, last)) = expr.rsplit_once('.') else {
            if let Some(local) = self.lookup_local(scope_qualname, expr) {
                return Some(NodeId::element(self.path, &local));
            }
            return match self.bindings.get(expr)? {
                Binding::Symbol { file, name } => Some(NodeId::element(file, name)),
                Binding::Module(_) => None,
            };
        };

        if prefix == "self" || prefix == "cls" {
            let class = self.enclosing_class(scope_qualname)?;
            let candidate = format!("{}.{}", class, last);
            return self
                .definitions
                .contains_key(&candidate)
                .then(|| NodeId::element(self.path, &candidate));
        }
        if let Some(local) = self.lookup_local(scope_qualname, prefix) {
            let candidate = format!("{}.{}", local, last);
            return self
                .definitions
                .contains_key(&candidate)
                .then(|| NodeId::element(self.path, &candidate));
        }
        match self.bindings.get(prefix)? {
            Binding::Module(file) => Some(NodeId::element(file, last)),
            Binding::Symbol { file, name } => Some(NodeId::element(file, &format!("{}.{}", name, last))),
        }
    }

    /// Innermost visible local definition of `name`; class bodies are not
    /// visible from the functions nested in them.
    fn lookup_local(&self, scope_qualname: &str, name: &str) -> Option<String> {
        let parts: Vec<&str> = if scope_qualname.is_empty() {
            Vec::new()
        } else {
            scope_qualname.split('.').collect()
        };
        for depth in (0..=parts.len()).rev() {
            let prefix = parts[..depth].join(".");
            if depth > 0 && depth < parts.len() && self.definitions.get(&prefix) == Some(&NodeType::Class) {
                continue;
            }
            let candidate = if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}.{}", prefix, name)
            };
            if self.definitions.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn enclosing_class(&self, scope_qualname: &str) -> Option<String> {
        let mut current = scope_qualname;
        while let Some((parent, _)) = current.rsplit_once('.') {
            if self.definitions.get(parent) == Some(&NodeType::Class) {
                return Some(parent.to_string());
            }
            current = parent;
        }
        None
    }

    fn finish(mut self) -> ParseOutput {
        let file_id = NodeId::file(self.path);
        for file in &self.imported_files {
            self.relationships.push(Relationship::new(
                file_id.clone(),
                NodeId::file(file),
                RelationshipKind::Imports,
            ));
        }

        for (class, enclosing, bases) in &self.bases {
            let class_id = NodeId::element(self.path, class);
            for base in bases {
                if let Some(target) = self.resolve_target(enclosing, base) {
                    if target != class_id {
                        self.relationships.push(Relationship::new(
                            class_id.clone(),
                            target,
                            RelationshipKind::Inherits,
                        ));
                    }
                }
            }
        }

        let mut edges = Vec::new();
        for call in &self.calls {
            if let Some(target) = self.resolve_target(&call.caller, &call.callee) {
                edges.push(Relationship::calls(
                    NodeId::element(self.path, &call.caller),
                    target,
                    Some(call.line),
                ));
            }
        }
        self.relationships.extend(edges);

        debug!(
            path = self.path,
            elements = self.content.elements.len(),
            relationships = self.relationships.len(),
            "python file extracted"
        );
        ParseOutput {
            nodes: self.nodes,
            relationships: self.relationships,
            content: self.content,
        }
    }
}

fn qualify(scope: &[Scope], name: &str) -> String {
    match scope.last() {
        Some(parent) => format!("{}.{}", parent.qualname, name),
        None => name.to_string(),
    }
}

fn line_range(node: SyntaxNode<'_>) -> (u32, u32) {
    (
        node.start_position().row as u32 + 1,
        node.end_position().row as u32 + 1,
    )
}

fn visibility(name: &str) -> &'static str {
    if name.starts_with("__") && name.ends_with("__") {
        "public"
    } else if name.starts_with("__") {
        "private"
    } else if name.starts_with('_') {
        "protected"
    } else {
        "public"
    }
}

fn push_property(properties: &mut Vec<PropertyInfo>, property: PropertyInfo) {
    if !properties.iter().any(|p| p.name == property.name) {
        properties.push(property);
    }
}

fn first_error_line(node: SyntaxNode<'_>) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row as u32 + 1);
    }
    let mut cursor = node.walk();
    let children: Vec<SyntaxNode<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error() || child.is_missing())
        .find_map(first_error_line)
}

/// Strip quotes and common indentation from a string literal.
fn clean_docstring(literal: &str) -> String {
    let body = literal.trim_start_matches(|c: char| "rRbBuUfF".contains(c));
    let body = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|quote| {
            body.strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        })
        .unwrap_or(body);

    let mut lines = body.lines();
    let first = lines.next().unwrap_or("").trim().to_string();
    let rest: Vec<&str> = lines.collect();
    let indent = rest
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned = vec![first];
    cleaned.extend(rest.iter().map(|line| {
        if line.len() >= indent {
            line[indent..].trim_end().to_string()
        } else {
            line.trim().to_string()
        }
    }));
    while cleaned.last().map_or(false, |line| line.is_empty()) {
        cleaned.pop();
    }
    while cleaned.first().map_or(false, |line| line.is_empty()) {
        cleaned.remove(0);
    }
    cleaned.join("\n")
}
