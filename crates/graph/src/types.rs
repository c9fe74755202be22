use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Coarse node classification.
///
/// Variants are ordered by strength: an existing node is only ever
/// replaced by a record of a stronger kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    /// Admitted declaration the classifier does not model (alias, enum, ...)
    Generic,
    /// Target of a call or type use seen only from a reference site
    Call,
    /// Namespace, class, struct or callable declaration
    Decl,
    /// Synthetic translation-unit root
    File,
}

impl NodeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "GENERIC",
            Self::Call => "CALL",
            Self::Decl => "DECL",
            Self::File => "FILE",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label carried by every edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    ContainsNamespace,
    ContainsClass,
    ContainsFunction,
    ContainsStruct,
    CallsFunction,
    CallsClassFunction,
    CallsClassConstructor,
    UsesCustomType,
    /// Admitted declaration of an unmodelled kind
    ContainsEntity,
}

impl Relation {
    pub const ALL: [Relation; 9] = [
        Self::ContainsNamespace,
        Self::ContainsClass,
        Self::ContainsFunction,
        Self::ContainsStruct,
        Self::CallsFunction,
        Self::CallsClassFunction,
        Self::CallsClassConstructor,
        Self::UsesCustomType,
        Self::ContainsEntity,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ContainsNamespace => "contains_namespace",
            Self::ContainsClass => "contains_class",
            Self::ContainsFunction => "contains_function",
            Self::ContainsStruct => "contains_struct",
            Self::CallsFunction => "calls_function",
            Self::CallsClassFunction => "calls_class_function",
            Self::CallsClassConstructor => "calls_class_constructor",
            Self::UsesCustomType => "uses_custom_type",
            Self::ContainsEntity => "contains_entity",
        }
    }

    /// Any `calls_*` relation
    pub const fn is_call(self) -> bool {
        matches!(
            self,
            Self::CallsFunction | Self::CallsClassFunction | Self::CallsClassConstructor
        )
    }

    /// Any `contains_*` relation
    pub const fn is_containment(self) -> bool {
        matches!(
            self,
            Self::ContainsNamespace
                | Self::ContainsClass
                | Self::ContainsFunction
                | Self::ContainsStruct
                | Self::ContainsEntity
        )
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node in the code graph: the persisted attributes of one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Identity key (`<declaration_file>#<namespace_position>`)
    #[serde(rename = "id")]
    pub key: String,

    /// Display label, equal to the identity key
    pub label: String,

    pub declaration_file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub column: u32,

    /// Qualified path without the file prefix; the merge key
    pub namespace_position: String,

    #[serde(rename = "node_type")]
    pub kind: NodeKind,
}

/// Edge in the code graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub relation: Relation,
}

/// Flat, ordered copy of a graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<EdgeRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub relation: Relation,
}

/// Attributed symbol graph of one or more translation units
#[derive(Debug, Clone)]
pub struct CodeGraph {
    /// Directed graph (scope owner -> member or reference)
    pub graph: StableDiGraph<GraphNode, GraphEdge>,

    /// Identity key -> NodeIndex mapping for fast lookup
    pub key_index: HashMap<String, NodeIndex>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            key_index: HashMap::new(),
        }
    }

    /// Insert a node, or upgrade the existing node with the same key when
    /// the new record has a stronger kind. Weaker records are ignored.
    pub fn upsert(&mut self, node: GraphNode) -> NodeIndex {
        if let Some(&idx) = self.key_index.get(&node.key) {
            if let Some(existing) = self.graph.node_weight_mut(idx) {
                if node.kind > existing.kind {
                    log::debug!("upgrading {} from {} to {}", node.key, existing.kind, node.kind);
                    *existing = node;
                }
            }
            return idx;
        }

        let key = node.key.clone();
        let idx = self.graph.add_node(node);
        self.key_index.insert(key, idx);
        idx
    }

    /// Add a labelled edge. Self-loops and repeats of an existing
    /// `(from, to, relation)` triple are no-ops; returns whether an edge was added.
    pub fn add_relation(&mut self, from: NodeIndex, to: NodeIndex, relation: Relation) -> bool {
        if from == to || self.has_edge(from, to, relation) {
            return false;
        }
        self.graph.add_edge(from, to, GraphEdge { relation });
        true
    }

    pub fn has_edge(&self, from: NodeIndex, to: NodeIndex, relation: Relation) -> bool {
        self.graph
            .edges(from)
            .any(|e| e.target() == to && e.weight().relation == relation)
    }

    /// Edge lookup by identity keys
    pub fn has_relation(&self, from: &str, to: &str, relation: Relation) -> bool {
        match (self.find_node(from), self.find_node(to)) {
            (Some(from), Some(to)) => self.has_edge(from, to, relation),
            _ => false,
        }
    }

    /// Find node by identity key
    pub fn find_node(&self, key: &str) -> Option<NodeIndex> {
        self.key_index.get(key).copied()
    }

    /// Get node data
    pub fn get_node(&self, idx: NodeIndex) -> Option<&GraphNode> {
        self.graph.node_weight(idx)
    }

    /// Node data by identity key
    pub fn node(&self, key: &str) -> Option<&GraphNode> {
        self.find_node(key).and_then(|idx| self.get_node(idx))
    }

    /// Get all nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode)> {
        self.graph
            .node_indices()
            .filter_map(move |idx| self.graph.node_weight(idx).map(|node| (idx, node)))
    }

    /// Get all edges as `(source, target, relation)`
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, Relation)> + '_ {
        self.graph.edge_indices().filter_map(move |e| {
            let (source, target) = self.graph.edge_endpoints(e)?;
            Some((source, target, self.graph.edge_weight(e)?.relation))
        })
    }

    /// Edges touching `node` in the given direction, as `(other end, relation)`
    pub fn neighbours(&self, node: NodeIndex, direction: Direction) -> Vec<(NodeIndex, Relation)> {
        let mut out: Vec<_> = self
            .graph
            .edges_directed(node, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (other, e.weight().relation)
            })
            .collect();
        // petgraph yields the most recent edge first
        out.reverse();
        out
    }

    /// Remove a node together with its edges
    pub fn remove_node(&mut self, idx: NodeIndex) -> Option<GraphNode> {
        let node = self.graph.remove_node(idx)?;
        self.key_index.remove(&node.key);
        Some(node)
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get edge count
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Ordered copy of all nodes and edges
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self.nodes().map(|(_, node)| node.clone()).collect();
        let edges = self
            .edges()
            .filter_map(|(source, target, relation)| {
                Some(EdgeRecord {
                    source: self.get_node(source)?.key.clone(),
                    target: self.get_node(target)?.key.clone(),
                    relation,
                })
            })
            .collect();
        GraphSnapshot { nodes, edges }
    }
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) fn test_node(key: &str, kind: NodeKind) -> GraphNode {
    let (file, position) = key.split_once('#').unwrap_or((key, key));
    GraphNode {
        key: key.to_string(),
        label: key.to_string(),
        declaration_file: file.to_string(),
        start_line: 1,
        end_line: 1,
        column: 1,
        namespace_position: position.to_string(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn kinds_are_ordered_by_strength() {
        assert!(NodeKind::Generic < NodeKind::Call);
        assert!(NodeKind::Call < NodeKind::Decl);
        assert!(NodeKind::Decl < NodeKind::File);
    }

    #[test]
    fn upsert_never_downgrades() {
        let mut graph = CodeGraph::new();
        let idx = graph.upsert(test_node("a.cpp#f()", NodeKind::Decl));
        let again = graph.upsert(test_node("a.cpp#f()", NodeKind::Call));
        assert_eq!(idx, again);
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.get_node(idx).unwrap().kind, NodeKind::Decl);
    }

    #[test]
    fn upsert_upgrades_weaker_nodes() {
        let mut graph = CodeGraph::new();
        let idx = graph.upsert(test_node("a.cpp#f()", NodeKind::Call));
        graph.upsert(test_node("a.cpp#f()", NodeKind::Decl));
        assert_eq!(graph.get_node(idx).unwrap().kind, NodeKind::Decl);
    }

    #[test]
    fn relations_are_unique_and_never_loop() {
        let mut graph = CodeGraph::new();
        let a = graph.upsert(test_node("a.cpp#a", NodeKind::Decl));
        let b = graph.upsert(test_node("a.cpp#b", NodeKind::Decl));

        assert!(graph.add_relation(a, b, Relation::CallsFunction));
        assert!(!graph.add_relation(a, b, Relation::CallsFunction));
        assert!(graph.add_relation(a, b, Relation::UsesCustomType));
        assert!(!graph.add_relation(a, a, Relation::CallsFunction));
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.has_relation("a.cpp#a", "a.cpp#b", Relation::UsesCustomType));
    }

    #[test]
    fn removing_a_node_drops_its_index_entry() {
        let mut graph = CodeGraph::new();
        let a = graph.upsert(test_node("a.cpp#a", NodeKind::Decl));
        let b = graph.upsert(test_node("a.cpp#b", NodeKind::Decl));
        graph.add_relation(a, b, Relation::ContainsFunction);

        assert!(graph.remove_node(b).is_some());
        assert_eq!(graph.find_node("a.cpp#b"), None);
        assert_eq!(graph.edge_count(), 0);
        // indices of the remaining nodes stay valid
        assert_eq!(graph.get_node(a).unwrap().key, "a.cpp#a");
    }

    #[test]
    fn relation_names_round_trip() {
        for relation in Relation::ALL {
            assert_eq!(Relation::parse(relation.as_str()), Some(relation));
            let json = serde_json::to_string(&relation).unwrap();
            assert_eq!(json, format!("\"{relation}\""));
        }
    }
}
