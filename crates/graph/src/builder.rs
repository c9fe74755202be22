use crate::classify::{classify, Category};
use crate::config::GraphConfig;
use crate::error::Result;
use crate::identity::IdentityBuilder;
use crate::scope::ScopeFilter;
use crate::types::CodeGraph;
use cxxgraph_ast::{Ast, Cursor};
use petgraph::stable_graph::NodeIndex;

/// Counters reported after a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Nodes classified and placed in the graph
    pub admitted: usize,
    /// Admitted nodes that only forwarded their scope
    pub transparent: usize,
    /// Subtrees rejected by the scope filter
    pub skipped: usize,
}

/// Assembles a [`CodeGraph`] from one translation unit
pub struct GraphBuilder {
    filter: ScopeFilter,
    identities: IdentityBuilder,
}

impl GraphBuilder {
    pub fn new<S: AsRef<str>>(allowed_paths: &[S], config: &GraphConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            filter: ScopeFilter::new(allowed_paths, config)?,
            identities: IdentityBuilder::new(config),
        })
    }

    pub fn filter(&self) -> &ScopeFilter {
        &self.filter
    }

    /// Build the graph of `ast` without canonicalization
    pub fn build(&self, ast: &Ast) -> Result<CodeGraph> {
        let (graph, _) = self.build_with_stats(ast)?;
        Ok(graph)
    }

    pub fn build_with_stats(&self, ast: &Ast) -> Result<(CodeGraph, BuildStats)> {
        let mut graph = CodeGraph::new();
        let mut stats = BuildStats::default();

        // Phase 1: the translation unit itself
        let root = ast.root();
        let file = self.identities.file_entity(root);
        log::debug!("translation unit {}", file.identity_key);
        let file_idx = graph.upsert(file.into());

        // Phase 2: depth-first over the tree, children in source order
        let mut pending: Vec<(Cursor<'_>, NodeIndex)> = vec![(root, file_idx)];
        while let Some((node, scope)) = pending.pop() {
            let children: Vec<_> = node.children().collect();
            for child in children.into_iter().rev() {
                pending.push((child, scope));
            }

            if node == root {
                continue;
            }
            if !self.filter.is_in_scope(node) {
                // drop the subtree that was just queued
                for _ in 0..node.child_count() {
                    pending.pop();
                }
                stats.skipped += 1;
                continue;
            }

            let Some(category) = classify(node) else {
                stats.transparent += 1;
                continue;
            };
            let child_scope = self.admit(node, category, scope, &mut graph);
            stats.admitted += 1;

            // re-home the queued children under the new scope
            let queued = pending.len() - node.child_count();
            for entry in &mut pending[queued..] {
                entry.1 = child_scope;
            }
        }

        log::info!(
            "{}: {} node(s), {} edge(s) ({} admitted, {} transparent, {} skipped)",
            root.spelling(),
            graph.node_count(),
            graph.edge_count(),
            stats.admitted,
            stats.transparent,
            stats.skipped
        );
        Ok((graph, stats))
    }

    /// Add `node` under `scope` and return the scope for its children
    fn admit(&self, node: Cursor<'_>, category: Category, scope: NodeIndex, graph: &mut CodeGraph) -> NodeIndex {
        if category == Category::Generic {
            log::warn!(
                "admitted {} '{}' has no dedicated relation; recording it as an entity",
                node.kind(),
                node.spelling()
            );
        }

        let entity = self.identities.build_identity(node, category);
        log::debug!("{:?} {} <- {}", category, entity.identity_key, node.kind());
        let target = graph.upsert(entity.into());
        graph.add_relation(scope, target, category.relation());

        if category.chains() {
            scope
        } else {
            target
        }
    }
}
