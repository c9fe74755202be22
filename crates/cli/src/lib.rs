use anyhow::{bail, Context, Result};
use batch::{BatchOutput, BatchSummary};
use clap::{ArgGroup, Args, Parser, Subcommand};
use config::FileConfig;
use cxxgraph_ast::{Ast, CppParser, ParseOptions};
use cxxgraph_graph::{canonicalize, graph_to_string, write_ast_dump, GraphBuilder, GraphFormat};
use std::env;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub mod batch;
pub mod compdb;
pub mod config;

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "cxxgraph")]
#[command(about = "Symbol and call graphs for C++ translation units", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Configuration file (default: ./cxxgraph.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the graph of one C++ source file or JSON AST dump
    Graph(GraphArgs),

    /// Build graphs for every unit of the compilation databases below a directory
    Batch(BatchArgs),
}

#[derive(Args)]
struct GraphArgs {
    /// C++ source file, or a `.json` AST dump
    input: PathBuf,

    /// Allowed source file (repeatable; default: the input's main file)
    #[arg(long = "allow", value_name = "PATH")]
    allow: Vec<String>,

    /// Record declaration files relative to this directory
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Output format: gml, graphml or json
    #[arg(short, long, value_parser = parse_format)]
    format: Option<GraphFormat>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write an annotated AST dump to this file
    #[arg(long, value_name = "FILE")]
    dump_ast: Option<PathBuf>,

    /// Keep header and source views of a symbol as separate nodes
    #[arg(long)]
    no_canonicalize: bool,

    /// Additional directory searched for quoted includes
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include: Vec<PathBuf>,
}

#[derive(Args)]
#[command(group(ArgGroup::new("target").required(true).multiple(true).args(["out_dir", "merge"])))]
struct BatchArgs {
    /// Directory searched for compile_commands.json files
    dir: PathBuf,

    /// One graph file per translation unit in this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Single merged graph of all translation units
    #[arg(long, value_name = "FILE")]
    merge: Option<PathBuf>,

    /// Translation units processed in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Output format: gml, graphml or json
    #[arg(short, long, value_parser = parse_format)]
    format: Option<GraphFormat>,

    /// Project root (default: the searched directory)
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Additional directory searched for quoted includes
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include: Vec<PathBuf>,
}

fn parse_format(raw: &str) -> std::result::Result<GraphFormat, String> {
    raw.parse().map_err(|e: cxxgraph_graph::GraphError| e.to_string())
}

/// Format from the flag, else the config file, else the output extension
fn resolve_format(flag: Option<GraphFormat>, file: &FileConfig, output: Option<&Path>) -> GraphFormat {
    flag.or(file.output.format)
        .or_else(|| {
            output
                .and_then(|p| p.extension())
                .and_then(|ext| ext.to_str())
                .and_then(|ext| ext.parse().ok())
        })
        .unwrap_or_default()
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let cwd = env::current_dir().context("Failed to read the working directory")?;
    let file_config = FileConfig::discover(cli.config.as_deref(), &cwd)?;

    match cli.command {
        Commands::Graph(args) => run_graph(args, &file_config, &cwd)?,
        Commands::Batch(args) => run_batch(args, &file_config, &cwd).await?,
    }

    Ok(())
}

fn load_ast(input: &Path, options: &ParseOptions) -> Result<Ast> {
    let is_dump = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_dump {
        let file = File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
        let ast = Ast::from_reader(BufReader::new(file))
            .with_context(|| format!("Invalid AST dump {}", input.display()))?;
        ast.validate()?;
        return Ok(ast);
    }

    let mut parser = CppParser::new()?;
    parser
        .parse_file(input, options)
        .with_context(|| format!("Failed to parse {}", input.display()))
}

fn run_graph(args: GraphArgs, file_config: &FileConfig, cwd: &Path) -> Result<()> {
    let config = file_config.graph_config(cwd, args.project_root.as_deref())?;
    let options = ParseOptions::default().with_include_dirs(file_config.include_dirs(&args.include));
    let format = resolve_format(args.format, file_config, args.output.as_deref());

    let ast = load_ast(&args.input, &options)?;
    let allowed = if args.allow.is_empty() {
        vec![ast.root().spelling().to_string()]
    } else {
        args.allow
    };

    let builder = GraphBuilder::new(&allowed, &config)?;
    let mut graph = builder.build(&ast)?;
    if !args.no_canonicalize {
        canonicalize(&mut graph, &config.extensions);
    }

    if let Some(path) = &args.dump_ast {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        write_ast_dump(&ast, builder.filter(), BufWriter::new(file))?;
        log::info!("AST dump written to {}", path.display());
    }

    match &args.output {
        Some(path) => {
            batch::write_graph_file(&graph, format, path)?;
            log::info!(
                "{} node(s), {} edge(s) written to {}",
                graph.node_count(),
                graph.edge_count(),
                path.display()
            );
        }
        None => print_stdout(&graph_to_string(&graph, format)?)?,
    }
    Ok(())
}

async fn run_batch(args: BatchArgs, file_config: &FileConfig, cwd: &Path) -> Result<()> {
    let root = cxxgraph_ast::paths::absolutize(&args.dir, cwd);
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let project_root = args.project_root.clone().unwrap_or_else(|| root.clone());
    let config = Arc::new(file_config.graph_config(cwd, Some(&project_root))?);
    let format = resolve_format(args.format, file_config, args.merge.as_deref());
    let jobs = args.jobs.unwrap_or_else(batch::default_jobs);

    let databases = compdb::find_databases(&root);
    if databases.is_empty() {
        bail!("No {} found under {}", compdb::DATABASE_FILE, root.display());
    }
    let mut units = compdb::load_all(&databases);
    let extra_includes = file_config.include_dirs(&args.include);
    for unit in &mut units {
        unit.include_dirs
            .extend(extra_includes.iter().map(|dir| cxxgraph_ast::paths::absolutize(dir, cwd)));
    }
    log::info!("Building {} translation unit(s) with {} job(s)", units.len(), jobs);

    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let total = units.len();
    let results = batch::build_units(units, config.clone(), jobs).await;
    let output = BatchOutput {
        out_dir: args.out_dir,
        merge: args.merge,
        format,
    };
    let BatchSummary { built, failed } = batch::write_results(results, &project_root, &config, &output)?;

    log::info!("{built} of {total} translation unit(s) built, {failed} failed");
    if built == 0 && total > 0 {
        bail!("All {total} translation unit(s) failed");
    }
    Ok(())
}
