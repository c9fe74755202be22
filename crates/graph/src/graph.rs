use crate::error::{GraphError, Result};
use crate::types::{CodeGraph, Relation};
use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;
use std::collections::{HashSet, VecDeque};

impl CodeGraph {
    /// Find all nodes that current node calls (outgoing `calls_*` edges)
    pub fn callees(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.related(node, Direction::Outgoing, Relation::is_call)
    }

    /// Find all nodes that call current node (incoming `calls_*` edges)
    pub fn callers(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.related(node, Direction::Incoming, Relation::is_call)
    }

    /// Declarations contained in current node (outgoing `contains_*` edges)
    pub fn members(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.related(node, Direction::Outgoing, Relation::is_containment)
    }

    /// Types current node refers to (outgoing `uses_custom_type` edges)
    pub fn type_dependencies(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.nodes_by_relation(node, Relation::UsesCustomType)
    }

    /// Get nodes by relationship type
    pub fn nodes_by_relation(&self, node: NodeIndex, relation: Relation) -> Vec<NodeIndex> {
        self.related(node, Direction::Outgoing, |r| r == relation)
    }

    fn related(&self, node: NodeIndex, direction: Direction, keep: impl Fn(Relation) -> bool) -> Vec<NodeIndex> {
        let mut seen = HashSet::new();
        self.neighbours(node, direction)
            .into_iter()
            .filter(|&(other, relation)| keep(relation) && seen.insert(other))
            .map(|(other, _)| other)
            .collect()
    }

    /// Find all nodes reachable from current node within given depth,
    /// following edges in their direction.
    /// Returns (NodeIndex, distance, relation path)
    pub fn related_nodes(&self, node: NodeIndex, max_depth: usize) -> Vec<(NodeIndex, usize, Vec<Relation>)> {
        let mut visited = HashSet::from([node]);
        let mut result = Vec::new();
        let mut queue = VecDeque::from([(node, 0, Vec::new())]);

        while let Some((current, depth, path)) = queue.pop_front() {
            if current != node {
                result.push((current, depth, path.clone()));
            }
            if depth == max_depth {
                continue;
            }
            for (target, relation) in self.neighbours(current, Direction::Outgoing) {
                if visited.insert(target) {
                    let mut next = path.clone();
                    next.push(relation);
                    queue.push_back((target, depth + 1, next));
                }
            }
        }

        result
    }

    /// Identity keys of everything within `max_depth` of the node keyed `key`
    pub fn neighbourhood(&self, key: &str, max_depth: usize) -> Result<Vec<String>> {
        let node = self
            .find_node(key)
            .ok_or_else(|| GraphError::NodeNotFound(key.to_string()))?;

        let mut keys: Vec<String> = self
            .related_nodes(node, max_depth)
            .into_iter()
            .filter_map(|(idx, _, _)| self.get_node(idx).map(|n| n.key.clone()))
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Union `other` into this graph by identity key. Node kinds only ever
    /// strengthen; edges are deduplicated per relation.
    pub fn merge(&mut self, other: &CodeGraph) {
        let before = (self.node_count(), self.edge_count());
        for (_, node) in other.nodes() {
            self.upsert(node.clone());
        }
        for (source, target, relation) in other.edges() {
            let endpoints = other
                .get_node(source)
                .zip(other.get_node(target))
                .and_then(|(s, t)| self.find_node(&s.key).zip(self.find_node(&t.key)));
            if let Some((from, to)) = endpoints {
                self.add_relation(from, to, relation);
            }
        }
        log::debug!(
            "merge added {} node(s) and {} edge(s)",
            self.node_count() - before.0,
            self.edge_count() - before.1
        );
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{test_node, CodeGraph, NodeKind, Relation};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn graph() -> CodeGraph {
        let mut graph = CodeGraph::new();
        let file = graph.upsert(test_node("a.cpp", NodeKind::File));
        let ns = graph.upsert(test_node("a.cpp#ns", NodeKind::Decl));
        let f = graph.upsert(test_node("a.cpp#ns::f()", NodeKind::Decl));
        let g = graph.upsert(test_node("a.cpp#ns::g()", NodeKind::Decl));
        let ty = graph.upsert(test_node("a.h#ns::T", NodeKind::Call));
        graph.add_relation(file, ns, Relation::ContainsNamespace);
        graph.add_relation(ns, f, Relation::ContainsFunction);
        graph.add_relation(ns, g, Relation::ContainsFunction);
        graph.add_relation(f, g, Relation::CallsFunction);
        graph.add_relation(f, ty, Relation::UsesCustomType);
        graph
    }

    fn keys(graph: &CodeGraph, nodes: Vec<petgraph::stable_graph::NodeIndex>) -> Vec<String> {
        nodes
            .into_iter()
            .map(|idx| graph.get_node(idx).unwrap().key.clone())
            .collect()
    }

    #[test]
    fn direct_queries() {
        let graph = graph();
        let f = graph.find_node("a.cpp#ns::f()").unwrap();
        let g = graph.find_node("a.cpp#ns::g()").unwrap();
        let ns = graph.find_node("a.cpp#ns").unwrap();

        assert_eq!(keys(&graph, graph.callees(f)), vec!["a.cpp#ns::g()"]);
        assert_eq!(keys(&graph, graph.callers(g)), vec!["a.cpp#ns::f()"]);
        assert_eq!(keys(&graph, graph.members(ns)), vec!["a.cpp#ns::f()", "a.cpp#ns::g()"]);
        assert_eq!(keys(&graph, graph.type_dependencies(f)), vec!["a.h#ns::T"]);
    }

    #[test]
    fn related_nodes_respect_depth() {
        let graph = graph();
        let file = graph.find_node("a.cpp").unwrap();
        let related = graph.related_nodes(file, 2);
        assert_eq!(related.len(), 3);
        let (_, depth, path) = related
            .iter()
            .find(|(idx, _, _)| graph.get_node(*idx).unwrap().key == "a.cpp#ns::f()")
            .unwrap();
        assert_eq!(*depth, 2);
        assert_eq!(path, &vec![Relation::ContainsNamespace, Relation::ContainsFunction]);
    }

    #[test]
    fn neighbourhood_of_unknown_key_is_an_error() {
        let graph = graph();
        assert!(graph.neighbourhood("nope", 1).is_err());
        assert_eq!(
            graph.neighbourhood("a.cpp#ns::f()", 1).unwrap(),
            vec!["a.cpp#ns::g()", "a.h#ns::T"]
        );
    }

    #[test]
    fn merge_is_a_keyed_union() {
        let mut left = graph();
        let mut right = CodeGraph::new();
        let h = right.upsert(test_node("b.cpp#h()", NodeKind::Decl));
        let g = right.upsert(test_node("a.cpp#ns::g()", NodeKind::Call));
        let ty = right.upsert(test_node("a.h#ns::T", NodeKind::Decl));
        right.add_relation(h, g, Relation::CallsFunction);
        right.add_relation(h, ty, Relation::UsesCustomType);

        let mut swapped = right.clone();
        swapped.merge(&left);
        left.merge(&right);

        assert_eq!(left.node_count(), 6);
        assert_eq!(left.edge_count(), 7);
        assert_eq!(left.node("a.cpp#ns::g()").unwrap().kind, NodeKind::Decl);
        assert_eq!(left.node("a.h#ns::T").unwrap().kind, NodeKind::Decl);

        let as_set = |graph: &CodeGraph| {
            let snapshot = graph.snapshot();
            let nodes: BTreeSet<_> = snapshot.nodes.into_iter().map(|n| (n.key, n.kind)).collect();
            let edges: BTreeSet<_> = snapshot
                .edges
                .into_iter()
                .map(|e| (e.source, e.target, e.relation.as_str()))
                .collect();
            (nodes, edges)
        };
        assert_eq!(as_set(&left), as_set(&swapped));
    }
}
