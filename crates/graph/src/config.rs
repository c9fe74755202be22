use crate::error::{GraphError, Result};
use cxxgraph_ast::Extensions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings shared by the scope filter and the identity builder.
///
/// All path handling is lexical: relative paths are resolved against
/// `base_dir`, nothing is looked up on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Declaration files under this directory are recorded relative to it
    pub project_root: Option<PathBuf>,

    /// Directory relative paths are resolved against. Defaults to `/`;
    /// callers working from a directory set it explicitly.
    pub base_dir: PathBuf,

    /// Source and header extensions
    pub extensions: Extensions,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            project_root: None,
            base_dir: PathBuf::from("/"),
            extensions: Extensions::default(),
        }
    }
}

impl GraphConfig {
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.base_dir.is_absolute() {
            return Err(GraphError::InvalidConfig(format!(
                "base_dir must be absolute, got {}",
                self.base_dir.display()
            )));
        }
        if let Some(root) = &self.project_root {
            if root.as_os_str().is_empty() {
                return Err(GraphError::InvalidConfig(
                    "project_root must not be empty".to_string(),
                ));
            }
        }
        self.extensions.validate().map_err(GraphError::InvalidConfig)
    }
}
