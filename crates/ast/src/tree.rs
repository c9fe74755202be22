use crate::error::{AstError, Result};
use crate::kind::CursorKind;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Index of a node inside an [`Ast`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Source position of a cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// File the cursor is spelled in, as the front end named it
    pub file: Option<String>,

    /// Line (1-indexed)
    pub line: u32,

    /// Column (1-indexed)
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: Some(file.into()),
            line,
            column,
        }
    }
}

/// Line range covered by a cursor (1-indexed, inclusive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub start_line: u32,
    pub end_line: u32,
}

impl Extent {
    pub const fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }
}

/// One AST node as stored in the arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub kind: CursorKind,

    /// Raw name (`getName`, `class Entities::Person`, the file path for the root)
    #[serde(default)]
    pub spelling: String,

    /// Static type spelling (parameters, variables, fields)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_spelling: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default)]
    pub extent: Extent,

    #[serde(default)]
    pub children: Vec<NodeId>,

    /// Enclosing scope cursor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_parent: Option<NodeId>,

    /// Declaration this node refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced: Option<NodeId>,

    /// Body-bearing counterpart of a declaration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<NodeId>,
}

impl NodeData {
    pub fn new(kind: CursorKind, spelling: impl Into<String>) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            type_spelling: None,
            location: None,
            extent: Extent::default(),
            children: Vec::new(),
            semantic_parent: None,
            referenced: None,
            definition: None,
        }
    }

    /// Builder: set location and a single-line extent
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: u32, column: u32) -> Self {
        self.location = Some(Location::new(file, line, column));
        self.extent = Extent::new(line, line);
        self
    }

    /// Builder: set the extent
    #[must_use]
    pub fn spanning(mut self, start_line: u32, end_line: u32) -> Self {
        self.extent = Extent::new(start_line, end_line);
        self
    }

    /// Builder: set the type spelling
    #[must_use]
    pub fn typed(mut self, type_spelling: impl Into<String>) -> Self {
        self.type_spelling = Some(type_spelling.into());
        self
    }
}

/// A fully resolved abstract syntax tree for one translation unit.
///
/// Nodes live in an arena and point at each other through [`NodeId`]s, so
/// the semantic-parent, referenced and definition links may form arbitrary
/// graphs while ownership stays flat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl Ast {
    /// Create a tree holding only its translation-unit root
    pub fn new(root: NodeData) -> Self {
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    /// Create a tree rooted at a translation unit named after `source_file`
    pub fn for_translation_unit(source_file: impl Into<String>) -> Self {
        Self::new(NodeData::new(CursorKind::TranslationUnit, source_file))
    }

    pub const fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> Cursor<'_> {
        Cursor {
            ast: self,
            id: self.root,
        }
    }

    pub fn cursor(&self, id: NodeId) -> Option<Cursor<'_>> {
        (id.0 < self.nodes.len()).then_some(Cursor { ast: self, id })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0)
    }

    /// Append `data` as the last child of `parent`.
    ///
    /// Panics if `parent` is not a node of this tree.
    pub fn add_child(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Add a node that is not attached to the syntactic tree (e.g. a
    /// declaration only reachable through `referenced` links)
    pub fn add_detached(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    pub fn set_semantic_parent(&mut self, node: NodeId, parent: NodeId) {
        self.nodes[node.0].semantic_parent = Some(parent);
    }

    pub fn set_referenced(&mut self, node: NodeId, target: NodeId) {
        self.nodes[node.0].referenced = Some(target);
    }

    pub fn set_definition(&mut self, node: NodeId, definition: NodeId) {
        self.nodes[node.0].definition = Some(definition);
    }

    /// Load a JSON dump and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let ast: Self = serde_json::from_str(json)?;
        ast.validate()?;
        Ok(ast)
    }

    /// Load a JSON dump from a reader and validate it
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let ast: Self = serde_json::from_reader(reader)?;
        ast.validate()?;
        Ok(ast)
    }

    /// Write the tree as a JSON dump
    pub fn to_writer(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Check structural consistency: root present and a translation unit,
    /// every link in range, every node the child of at most one parent.
    pub fn validate(&self) -> Result<()> {
        let Some(root) = self.nodes.get(self.root.0) else {
            return Err(AstError::MissingRoot(format!(
                "root id {} out of range ({} nodes)",
                self.root.0,
                self.nodes.len()
            )));
        };
        if root.kind != CursorKind::TranslationUnit {
            return Err(AstError::MissingRoot(format!(
                "root is {} instead of TRANSLATION_UNIT",
                root.kind
            )));
        }

        let mut has_parent = vec![false; self.nodes.len()];
        for (idx, node) in self.nodes.iter().enumerate() {
            for &child in &node.children {
                self.check_link(idx, "children", child)?;
                if child == self.root {
                    return Err(AstError::invalid(format!("node {idx} lists the root as a child")));
                }
                if std::mem::replace(&mut has_parent[child.0], true) {
                    return Err(AstError::invalid(format!(
                        "node {} has more than one syntactic parent",
                        child.0
                    )));
                }
            }
            for (field, link) in [
                ("semantic_parent", node.semantic_parent),
                ("referenced", node.referenced),
                ("definition", node.definition),
            ] {
                if let Some(target) = link {
                    self.check_link(idx, field, target)?;
                }
            }
        }
        Ok(())
    }

    fn check_link(&self, node: usize, field: &'static str, target: NodeId) -> Result<()> {
        if target.0 >= self.nodes.len() {
            return Err(AstError::DanglingReference {
                node,
                field,
                target: target.0,
            });
        }
        Ok(())
    }
}

/// Read-only handle to one node of an [`Ast`]
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    ast: &'a Ast,
    id: NodeId,
}

impl<'a> Cursor<'a> {
    pub const fn id(&self) -> NodeId {
        self.id
    }

    pub const fn ast(&self) -> &'a Ast {
        self.ast
    }

    fn data(&self) -> &'a NodeData {
        &self.ast.nodes[self.id.0]
    }

    fn at(&self, id: NodeId) -> Cursor<'a> {
        Cursor { ast: self.ast, id }
    }

    pub fn kind(&self) -> CursorKind {
        self.data().kind
    }

    pub fn spelling(&self) -> &'a str {
        &self.data().spelling
    }

    pub fn type_spelling(&self) -> Option<&'a str> {
        self.data().type_spelling.as_deref()
    }

    pub fn location(&self) -> Option<&'a Location> {
        self.data().location.as_ref()
    }

    /// File the node is spelled in, if the front end resolved one
    pub fn file(&self) -> Option<&'a str> {
        self.location().and_then(|loc| loc.file.as_deref())
    }

    pub fn extent(&self) -> Extent {
        self.data().extent
    }

    pub fn children(&self) -> impl Iterator<Item = Cursor<'a>> + 'a {
        let ast = self.ast;
        self.data().children.iter().map(move |&id| Cursor { ast, id })
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn semantic_parent(&self) -> Option<Cursor<'a>> {
        self.data().semantic_parent.map(|id| self.at(id))
    }

    pub fn referenced(&self) -> Option<Cursor<'a>> {
        self.data().referenced.map(|id| self.at(id))
    }

    pub fn definition(&self) -> Option<Cursor<'a>> {
        self.data().definition.map(|id| self.at(id))
    }

    /// Parameters of a callable declaration, in order
    pub fn arguments(&self) -> impl Iterator<Item = Cursor<'a>> + 'a {
        self.children()
            .filter(|child| child.kind() == CursorKind::ParmDecl)
    }

    /// This node and all of its descendants, depth first
    pub fn walk_preorder(&self) -> Vec<Cursor<'a>> {
        let mut out = Vec::new();
        let mut stack = vec![*self];
        while let Some(current) = stack.pop() {
            out.push(current);
            let children: Vec<_> = current.children().collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }
}

impl PartialEq for Cursor<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.ast, other.ast) && self.id == other.id
    }
}

impl Eq for Cursor<'_> {}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id.0)
            .field("kind", &self.kind())
            .field("spelling", &self.spelling())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Ast {
        let mut ast = Ast::for_translation_unit("main.cpp");
        let root = ast.root_id();
        let ns = ast.add_child(root, NodeData::new(CursorKind::Namespace, "app").at("main.cpp", 1, 11));
        let func = ast.add_child(
            ns,
            NodeData::new(CursorKind::FunctionDecl, "run").at("main.cpp", 2, 10).spanning(2, 4),
        );
        let param = ast.add_child(
            func,
            NodeData::new(CursorKind::ParmDecl, "count").at("main.cpp", 2, 18).typed("int"),
        );
        ast.add_child(func, NodeData::new(CursorKind::CompoundStmt, ""));
        ast.set_semantic_parent(func, ns);
        ast.set_semantic_parent(param, func);
        ast
    }

    #[test]
    fn cursor_exposes_links() {
        let ast = sample();
        let ns = ast.root().children().next().unwrap();
        let func = ns.children().next().unwrap();

        assert_eq!(func.kind(), CursorKind::FunctionDecl);
        assert_eq!(func.semantic_parent(), Some(ns));
        assert_eq!(func.extent(), Extent::new(2, 4));
        assert_eq!(func.file(), Some("main.cpp"));

        let params: Vec<_> = func.arguments().map(|p| p.spelling()).collect();
        assert_eq!(params, vec!["count"]);
    }

    #[test]
    fn preorder_visits_parent_before_children() {
        let ast = sample();
        let kinds: Vec<_> = ast.root().walk_preorder().iter().map(Cursor::kind).collect();
        assert_eq!(
            kinds,
            vec![
                CursorKind::TranslationUnit,
                CursorKind::Namespace,
                CursorKind::FunctionDecl,
                CursorKind::ParmDecl,
                CursorKind::CompoundStmt,
            ]
        );
    }

    #[test]
    fn json_dump_round_trips_through_validation() {
        let ast = sample();
        let mut buf = Vec::new();
        ast.to_writer(&mut buf).unwrap();
        let loaded = Ast::from_reader(buf.as_slice()).unwrap();
        assert_eq!(loaded, ast);
    }

    #[test]
    fn dangling_links_are_rejected() {
        let json = r#"{
            "nodes": [
                {"kind": "TRANSLATION_UNIT", "spelling": "a.cpp", "children": [1]},
                {"kind": "CALL_EXPR", "spelling": "f", "referenced": 7}
            ],
            "root": 0
        }"#;
        let err = Ast::from_json_str(json).unwrap_err();
        assert!(
            matches!(err, AstError::DanglingReference { node: 1, target: 7, .. }),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn root_must_be_a_translation_unit() {
        let json = r#"{"nodes": [{"kind": "NAMESPACE", "spelling": "x"}], "root": 0}"#;
        assert!(matches!(
            Ast::from_json_str(json),
            Err(AstError::MissingRoot(_))
        ));

        let json = r#"{"nodes": [], "root": 0}"#;
        assert!(matches!(
            Ast::from_json_str(json),
            Err(AstError::MissingRoot(_))
        ));
    }
}
