use crate::compdb::CompileUnit;
use anyhow::{anyhow, Context, Result};
use cxxgraph_ast::paths::to_slash;
use cxxgraph_ast::{CppParser, ParseOptions};
use cxxgraph_graph::{build_graph, canonicalize, write_graph, CodeGraph, GraphConfig, GraphFormat};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Upper bound for `--jobs`
pub const MAX_JOBS: usize = 64;

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(1, MAX_JOBS)
}

/// Outcome of one translation unit
pub struct UnitResult {
    pub unit: CompileUnit,
    pub graph: Result<CodeGraph>,
}

/// Build one graph per unit, at most `jobs` at a time. Results come back
/// in the order of `units`.
pub async fn build_units(units: Vec<CompileUnit>, config: Arc<GraphConfig>, jobs: usize) -> Vec<UnitResult> {
    let semaphore = Arc::new(Semaphore::new(jobs.clamp(1, MAX_JOBS)));
    let mut handles = Vec::with_capacity(units.len());

    for unit in units {
        let semaphore = semaphore.clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            let permit = semaphore.acquire_owned().await;
            let task_unit = unit.clone();
            let graph = tokio::task::spawn_blocking(move || build_unit(&task_unit, &config))
                .await
                .unwrap_or_else(|e| Err(anyhow!("unit task failed: {e}")));
            drop(permit);
            UnitResult { unit, graph }
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => log::error!("batch task panicked: {e}"),
        }
    }
    results
}

/// Parse and assemble one translation unit
pub fn build_unit(unit: &CompileUnit, config: &GraphConfig) -> Result<CodeGraph> {
    let options = ParseOptions::default().with_include_dirs(unit.include_dirs.iter().cloned());
    let mut parser = CppParser::new()?;
    let ast = parser
        .parse_file(&unit.source, &options)
        .with_context(|| format!("Failed to parse {}", unit.source.display()))?;
    let source = to_slash(&unit.source);
    let graph = build_graph(&ast, &[source], config)?;
    log::debug!(
        "{}: {} node(s), {} edge(s)",
        unit.source.display(),
        graph.node_count(),
        graph.edge_count()
    );
    Ok(graph)
}

/// Output file name of a unit: its path below `root` with separators
/// replaced by `#`
pub fn output_name(source: &Path, root: &Path, format: GraphFormat) -> String {
    let relative = source.strip_prefix(root).unwrap_or(source);
    let flattened = to_slash(relative).trim_start_matches('/').replace(['/', '\\'], "#");
    format!("{flattened}.{}", format.extension())
}

pub fn write_graph_file(graph: &CodeGraph, format: GraphFormat, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    write_graph(graph, format, BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Where batch results go
pub struct BatchOutput {
    pub out_dir: Option<PathBuf>,
    pub merge: Option<PathBuf>,
    pub format: GraphFormat,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub built: usize,
    pub failed: usize,
}

/// Write per-unit files and/or the merged graph. Failed units are logged
/// and left out.
pub fn write_results(
    results: Vec<UnitResult>,
    root: &Path,
    config: &GraphConfig,
    output: &BatchOutput,
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    let mut merged = output.merge.as_ref().map(|_| CodeGraph::new());

    for UnitResult { unit, graph } in results {
        let graph = match graph {
            Ok(graph) => graph,
            Err(e) => {
                log::warn!("Skipping {}: {e:#}", unit.source.display());
                summary.failed += 1;
                continue;
            }
        };
        summary.built += 1;

        if let Some(dir) = &output.out_dir {
            let path = dir.join(output_name(&unit.source, root, output.format));
            write_graph_file(&graph, output.format, &path)?;
            log::debug!("wrote {}", path.display());
        }
        if let Some(merged) = merged.as_mut() {
            merged.merge(&graph);
        }
    }

    if let (Some(mut merged), Some(path)) = (merged, output.merge.as_ref()) {
        canonicalize(&mut merged, &config.extensions);
        write_graph_file(&merged, output.format, path)?;
        log::info!(
            "merged graph: {} node(s), {} edge(s) -> {}",
            merged.node_count(),
            merged.edge_count(),
            path.display()
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn output_names_flatten_the_project_path() {
        assert_eq!(
            output_name(Path::new("/p/src/net/tcp.cpp"), Path::new("/p"), GraphFormat::Gml),
            "src#net#tcp.cpp.gml"
        );
        assert_eq!(
            output_name(Path::new("/elsewhere/a.cc"), Path::new("/p"), GraphFormat::Json),
            "elsewhere#a.cc.json"
        );
    }

    #[tokio::test]
    async fn failed_units_do_not_stop_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.cpp"), "int helper() { return 1; }\nint main() { return helper(); }\n").unwrap();
        let unit = |name: &str| CompileUnit {
            source: dir.path().join(name),
            directory: dir.path().to_path_buf(),
            include_dirs: Vec::new(),
        };

        let config = Arc::new(GraphConfig::default().with_project_root(dir.path()));
        let results = build_units(vec![unit("missing.cpp"), unit("good.cpp")], config.clone(), 2).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].graph.is_err());
        assert!(results[1].graph.is_ok());

        let out = dir.path().join("out");
        let output = BatchOutput {
            out_dir: Some(out.clone()),
            merge: Some(dir.path().join("all.json")),
            format: GraphFormat::Json,
        };
        let summary = write_results(results, dir.path(), &config, &output).unwrap();
        assert_eq!(summary, BatchSummary { built: 1, failed: 1 });
        assert!(out.join("good.cpp.json").is_file());
        assert!(dir.path().join("all.json").is_file());
    }
}
