use crate::types::CodeGraph;
use cxxgraph_ast::Extensions;
use petgraph::stable_graph::NodeIndex;
use petgraph::Direction;
use std::collections::HashMap;

/// Collapse nodes that share a `namespace_position` into one.
///
/// Within each group the first node declared in a source file is kept
/// (or the first node when none is), inherits every edge of the others
/// and the strongest kind of the group. Returns the number of removed nodes.
/// Running it twice changes nothing the second time.
pub fn canonicalize(graph: &mut CodeGraph, extensions: &Extensions) -> usize {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<NodeIndex>> = HashMap::new();
    for (idx, node) in graph.nodes() {
        let group = groups.entry(node.namespace_position.clone()).or_default();
        if group.is_empty() {
            order.push(node.namespace_position.clone());
        }
        group.push(idx);
    }

    let mut removed = 0;
    for position in order {
        let Some(group) = groups.remove(&position) else {
            continue;
        };
        if group.len() < 2 {
            continue;
        }

        let canonical = group
            .iter()
            .copied()
            .find(|&idx| {
                graph
                    .get_node(idx)
                    .is_some_and(|node| extensions.is_source(&node.declaration_file))
            })
            .unwrap_or(group[0]);

        let strongest = group.iter().filter_map(|&idx| graph.get_node(idx)).map(|node| node.kind).max();
        if let (Some(strongest), Some(node)) = (strongest, graph.graph.node_weight_mut(canonical)) {
            node.kind = node.kind.max(strongest);
        }

        for &duplicate in group.iter().filter(|&&idx| idx != canonical) {
            redirect(graph, duplicate, canonical);
            if let Some(node) = graph.remove_node(duplicate) {
                log::debug!("merged {} into canonical node for {}", node.key, position);
                removed += 1;
            }
        }
    }

    if removed > 0 {
        log::info!("canonicalization merged {removed} duplicate node(s)");
    }
    removed
}

/// Move every edge of `from` onto `to`, skipping loops and duplicates
fn redirect(graph: &mut CodeGraph, from: NodeIndex, to: NodeIndex) {
    for (source, relation) in graph.neighbours(from, Direction::Incoming) {
        graph.add_relation(source, to, relation);
    }
    for (target, relation) in graph.neighbours(from, Direction::Outgoing) {
        graph.add_relation(to, target, relation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{test_node, NodeKind, Relation};
    use pretty_assertions::assert_eq;

    /// `main.cpp` calls `Person::getName()` as seen from the header while
    /// `Entities.cpp` defines it
    fn split_graph() -> CodeGraph {
        let mut graph = CodeGraph::new();
        let main = graph.upsert(test_node("main.cpp#main()", NodeKind::Decl));
        let header = graph.upsert(test_node("Entities.h#Person::getName()", NodeKind::Call));
        let class = graph.upsert(test_node("Entities.h#Person", NodeKind::Decl));
        let source = graph.upsert(test_node("Entities.cpp#Person::getName()", NodeKind::Decl));
        let field = graph.upsert(test_node("Entities.h#Person::name", NodeKind::Call));
        graph.add_relation(main, header, Relation::CallsClassFunction);
        graph.add_relation(class, header, Relation::ContainsFunction);
        graph.add_relation(class, source, Relation::ContainsFunction);
        graph.add_relation(source, field, Relation::UsesCustomType);
        graph
    }

    #[test]
    fn prefers_source_file_nodes() {
        let mut graph = split_graph();
        assert_eq!(canonicalize(&mut graph, &Extensions::default()), 1);

        assert!(graph.find_node("Entities.h#Person::getName()").is_none());
        let canonical = graph.node("Entities.cpp#Person::getName()").unwrap();
        assert_eq!(canonical.kind, NodeKind::Decl);
        assert!(graph.has_relation("main.cpp#main()", "Entities.cpp#Person::getName()", Relation::CallsClassFunction));
        assert!(graph.has_relation("Entities.h#Person", "Entities.cpp#Person::getName()", Relation::ContainsFunction));
        // the shared containment edge was not doubled
        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn falls_back_to_the_first_node_and_keeps_the_strongest_kind() {
        let mut graph = CodeGraph::new();
        let first = graph.upsert(test_node("a.h#f()", NodeKind::Call));
        let second = graph.upsert(test_node("b.h#f()", NodeKind::Decl));
        let user = graph.upsert(test_node("x.cpp#g()", NodeKind::Decl));
        graph.add_relation(user, second, Relation::CallsFunction);
        graph.add_relation(first, second, Relation::CallsFunction);

        canonicalize(&mut graph, &Extensions::default());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node("a.h#f()").unwrap().kind, NodeKind::Decl);
        assert!(graph.has_relation("x.cpp#g()", "a.h#f()", Relation::CallsFunction));
        assert!(!graph.has_edge(first, first, Relation::CallsFunction));
    }

    #[test]
    fn is_idempotent() {
        let mut graph = split_graph();
        canonicalize(&mut graph, &Extensions::default());
        let once = graph.snapshot();
        assert_eq!(canonicalize(&mut graph, &Extensions::default()), 0);
        assert_eq!(graph.snapshot(), once);
    }
}
