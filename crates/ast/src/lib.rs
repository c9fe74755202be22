//! # cxxgraph AST
//!
//! A libclang-shaped, fully resolved syntax tree for one C++ translation unit.
//!
//! ## Features
//!
//! - **Cursor model** - kind, spelling, location, extent, children
//! - **Semantic links** - semantic parent, referenced declaration, definition
//! - **JSON dumps** - load trees produced by an external front end
//! - **Tree-sitter front end** - parse C++ sources and project headers directly
//!
//! ## Architecture
//!
//! ```text
//! main.cpp + "quoted" includes
//!     │
//!     ├──> Source loading (tree-sitter-cpp per file)
//!     │
//!     ├──> Declaration pass
//!     │      ├─ Namespaces, classes, functions, fields, aliases
//!     │      └─ Qualified-name symbol table
//!     │
//!     ├──> Body pass
//!     │      ├─ Calls, member references, constructions
//!     │      └─ referenced / definition links
//!     │
//!     └──> Ast (arena of NodeData, browsed through Cursor)
//! ```

mod error;
mod kind;
mod language;
mod parser;
pub mod paths;
mod tree;

pub use error::{AstError, Result};
pub use kind::CursorKind;
pub use language::{Extensions, FileRole};
pub use parser::{CppParser, ParseOptions, SourceLoader};
pub use tree::{Ast, Cursor, Extent, Location, NodeData, NodeId};
