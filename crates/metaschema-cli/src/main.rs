//! # metaschema-cli
//!
//! Command-line front end for the metaschema compiler.
//!
//! Compiles one schema family, or every family in a directory, and prints
//! the linked model as a summary, JSON or YAML.

mod output;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use metaschema_compiler::{Compiler, CompilerConfig, DocumentCache, Error, SchemaGraph, discover_families};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 3;

#[derive(Parser)]
#[command(name = "metaschema")]
#[command(about = "Metaschema compiler CLI")]
#[command(version)]
struct Cli {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a schema family, or every family in a directory
    Compile {
        /// Top-level schema document or directory of families
        input: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,
    },

    /// List the families a directory compile would pick up
    List {
        /// Directory to scan
        dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Summary,
    Json,
    Yaml,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::Config { .. }) => EXIT_CONFIG,
        _ => EXIT_FAILURE,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => CompilerConfig::from_file(path)?,
        None => CompilerConfig::default(),
    };

    match cli.command {
        Commands::Compile { input, format } => compile_command(&input, format, config).await,
        Commands::List { dir } => {
            for family in discover_families(&dir, &config)? {
                println!("{}", family.display());
            }
            Ok(())
        }
    }
}

async fn compile_command(input: &Path, format: OutputFormat, config: CompilerConfig) -> anyhow::Result<()> {
    if !input.is_dir() {
        info!("Compiling {}", input.display());
        let graph = Compiler::new(config).compile(input)?;
        println!("{}", output::render(&graph, format)?);
        return Ok(());
    }

    let families = discover_families(input, &config)?;
    info!("Compiling {} families from {}", families.len(), input.display());
    let results = compile_all(&families, config).await?;

    let mut compiled = Vec::new();
    let mut failures = 0;
    for (path, result) in families.iter().zip(results) {
        match result {
            Ok(graph) => compiled.push((path.as_path(), graph)),
            Err(err) => {
                failures += 1;
                eprintln!("ERROR: {err}");
            }
        }
    }

    println!("{}", output::render_all(&compiled, format)?);
    if failures > 0 {
        anyhow::bail!("{} of {} families failed to compile", failures, families.len());
    }
    Ok(())
}

/// Compile every family on blocking workers; results come back in input order
async fn compile_all(
    families: &[PathBuf],
    config: CompilerConfig,
) -> anyhow::Result<Vec<Result<SchemaGraph, Error>>> {
    let cache = Arc::new(DocumentCache::new());
    let jobs = config.jobs.unwrap_or(families.len()).max(1);
    let semaphore = Arc::new(Semaphore::new(jobs));
    let config = Arc::new(config);
    debug!("Running with {} concurrent jobs", jobs);

    let mut tasks = JoinSet::new();
    for (index, path) in families.iter().cloned().enumerate() {
        let cache = Arc::clone(&cache);
        let config = Arc::clone(&config);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let result = tokio::task::spawn_blocking(move || {
                Compiler::with_cache(CompilerConfig::clone(&config), cache).compile(&path)
            })
            .await?;
            anyhow::Ok((index, result))
        });
    }

    let mut slots: Vec<Option<Result<SchemaGraph, Error>>> = Vec::new();
    slots.resize_with(families.len(), || None);
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.context("compile worker panicked")??;
        slots[index] = Some(result);
    }

    slots
        .into_iter()
        .zip(families)
        .map(|(slot, path)| slot.with_context(|| format!("no result for {}", path.display())))
        .collect()
}
