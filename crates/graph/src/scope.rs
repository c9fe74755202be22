use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use cxxgraph_ast::paths::{absolutize, to_slash};
use cxxgraph_ast::{Cursor, Extensions, FileRole};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Decides which AST nodes take part in graph assembly.
///
/// Nodes in an allowed source file are admitted, as are nodes in a header
/// whose sibling source file (same stem, any source extension) is allowed.
/// Everything else, including nodes without a location, is rejected.
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    raw: HashSet<String>,
    absolute: HashSet<String>,
    basenames: HashSet<String>,
    base_dir: PathBuf,
    extensions: Extensions,
}

impl ScopeFilter {
    pub fn new<S: AsRef<str>>(allowed_paths: &[S], config: &GraphConfig) -> Result<Self> {
        if allowed_paths.is_empty() {
            return Err(GraphError::EmptyAllowedPaths);
        }

        let mut raw = HashSet::new();
        let mut absolute = HashSet::new();
        let mut basenames = HashSet::new();
        for allowed in allowed_paths {
            let allowed = allowed.as_ref();
            if allowed.trim().is_empty() {
                return Err(GraphError::InvalidConfig("allowed paths must not be blank".to_string()));
            }
            let abs = absolutize(Path::new(allowed), &config.base_dir);
            if let Some(name) = abs.file_name() {
                basenames.insert(name.to_string_lossy().to_lowercase());
            }
            absolute.insert(to_slash(&abs));
            raw.insert(allowed.to_string());
        }

        Ok(Self {
            raw,
            absolute,
            basenames,
            base_dir: config.base_dir.clone(),
            extensions: config.extensions.clone(),
        })
    }

    /// Scope verdict for one node
    pub fn is_in_scope(&self, node: Cursor<'_>) -> bool {
        // the synthetic root is spelled like the file it stands for
        if self.raw.contains(node.spelling()) {
            return true;
        }
        match node.file() {
            Some(file) => self.admits_file(file),
            None => false,
        }
    }

    /// Scope verdict for a declaration file
    pub fn admits_file(&self, file: &str) -> bool {
        let path = absolutize(Path::new(file), &self.base_dir);
        match self.extensions.role_of(&path) {
            FileRole::Source => self.matches(&path),
            FileRole::Header => self
                .extensions
                .source
                .iter()
                .any(|ext| self.matches(&path.with_extension(ext))),
            FileRole::Other => false,
        }
    }

    fn matches(&self, path: &Path) -> bool {
        if self.absolute.contains(&to_slash(path)) {
            return true;
        }
        path.file_name()
            .map(|name| self.basenames.contains(&name.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    }
}
