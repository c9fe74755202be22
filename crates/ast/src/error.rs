use thiserror::Error;

/// Result type for AST operations
pub type Result<T> = std::result::Result<T, AstError>;

/// Errors that can occur while loading or producing an AST
#[derive(Error, Debug)]
pub enum AstError {
    /// The dump references a node that does not exist
    #[error("Dangling node reference: {field} of node {node} points to {target}")]
    DanglingReference {
        node: usize,
        field: &'static str,
        target: usize,
    },

    /// The AST has no usable root
    #[error("AST root missing: {0}")]
    MissingRoot(String),

    /// The dump is structurally inconsistent
    #[error("Invalid AST: {0}")]
    Invalid(String),

    /// Failed to parse source code
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),

    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AstError {
    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an invalid-AST error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
