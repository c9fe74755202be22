use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Graph build error: {0}")]
    BuildError(String),

    #[error("Allowed paths must not be empty")]
    EmptyAllowedPaths,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error(transparent)]
    Ast(#[from] cxxgraph_ast::AstError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
