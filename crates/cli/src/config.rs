use anyhow::{Context, Result};
use cxxgraph_ast::Extensions;
use cxxgraph_graph::{GraphConfig, GraphFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cxxgraph.toml";

/// Contents of `cxxgraph.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub graph: GraphSection,
    pub parser: ParserSection,
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphSection {
    pub project_root: Option<PathBuf>,
    pub source_extensions: Option<Vec<String>>,
    pub header_extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserSection {
    pub include_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub format: Option<GraphFormat>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Explicit file if given, else `cxxgraph.toml` in `cwd` when present,
    /// else defaults
    pub fn discover(explicit: Option<&Path>, cwd: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = cwd.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Core configuration with `project_root` overridden by the command line
    pub fn graph_config(&self, base_dir: &Path, project_root: Option<&Path>) -> Result<GraphConfig> {
        let mut extensions = Extensions::default();
        if let Some(source) = &self.graph.source_extensions {
            extensions.source = source.clone();
        }
        if let Some(header) = &self.graph.header_extensions {
            extensions.header = header.clone();
        }

        let mut config = GraphConfig::default()
            .with_base_dir(base_dir)
            .with_extensions(extensions);
        config.project_root = project_root
            .map(Path::to_path_buf)
            .or_else(|| self.graph.project_root.clone());
        config.validate().context("Invalid graph configuration")?;
        Ok(config)
    }

    /// Include directories from the file followed by `extra`
    pub fn include_dirs(&self, extra: &[PathBuf]) -> Vec<PathBuf> {
        self.parser
            .include_dirs
            .iter()
            .chain(extra)
            .cloned()
            .collect()
    }
}
