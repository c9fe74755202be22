//! # cxxgraph Graph
//!
//! Attributed symbol and call graph of C++ translation units.
//!
//! ## Features
//!
//! - **Scope filtering** - only files being compiled and their own headers
//! - **Declaration skeleton** - namespaces, classes, structs, functions
//! - **Reference edges** - calls, method calls, constructions, type uses
//! - **Canonical identities** - header and source views of one symbol collapse
//! - **Exports** - GML, GraphML and JSON
//!
//! ## Architecture
//!
//! ```text
//! Ast (one translation unit)
//!     │
//!     ├──> Graph Builder
//!     │      ├─ Scope filter (allowed source files + sibling headers)
//!     │      ├─ Classifier (declaration / call / type-use categories)
//!     │      ├─ Identity builder ("file#Ns::Class::f(type name)")
//!     │      └─ Edges from the enclosing scope, calls chained
//!     │
//!     ├──> Canonicalizer
//!     │      └─ Merge nodes by namespace position, prefer source files
//!     │
//!     └──> Code Graph (petgraph)
//!            ├─ Queries: callers, callees, members, type dependencies
//!            └─ Export: GML / GraphML / JSON
//! ```

mod builder;
mod canonical;
mod classify;
mod config;
mod dump;
mod error;
mod export;
mod graph;
mod identity;
mod scope;
mod types;

pub use builder::{BuildStats, GraphBuilder};
pub use canonical::canonicalize;
pub use classify::{classify, Category};
pub use config::GraphConfig;
pub use dump::write_ast_dump;
pub use error::{GraphError, Result};
pub use export::{graph_to_string, write_gml, write_graph, write_graphml, write_json, GraphFormat};
pub use identity::{qualified_name, signature, Entity, IdentityBuilder, LOCATION_NOT_FOUND};
pub use scope::ScopeFilter;
pub use types::{CodeGraph, EdgeRecord, GraphEdge, GraphNode, GraphSnapshot, NodeKind, Relation};

use cxxgraph_ast::Ast;

/// Assemble and canonicalize the graph of one translation unit
pub fn build_graph<S: AsRef<str>>(ast: &Ast, allowed_paths: &[S], config: &GraphConfig) -> Result<CodeGraph> {
    let mut graph = GraphBuilder::new(allowed_paths, config)?.build(ast)?;
    canonicalize(&mut graph, &config.extensions);
    Ok(graph)
}
