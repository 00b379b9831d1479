//! modelc - incremental build front end for the model compiler
//!
//! ## Commands
//!
//! - `make`: build the project, reusing the previous build when possible
//! - `changes`: show what changed since the last build and what `make` would do
//! - `deps`: load the declared dependencies and report each one

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use modelc_core::{
    init_tracing, preview, BuildConfig, BuildOutcome, BuildStrategy, CompileOptions,
    EngineCommand, FileChange, FrontendError, LogFormat, Orchestrator, ProcessEngine,
    ProjectManifest,
};
use modelc_deps::{DependencyResolver, HttpFetcher};
use tracing::Level;

#[derive(Parser)]
#[command(name = "modelc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Incremental build front end for the model compiler", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the project
    Make {
        #[command(flatten)]
        project: ProjectArgs,

        /// Always build from scratch
        #[arg(long)]
        no_incremental: bool,

        /// Only produce type signatures
        #[arg(long)]
        types_only: bool,

        /// Restrict the build to these modules (repeatable)
        #[arg(long = "limit-to", value_name = "MODULE")]
        limit_to: Vec<String>,

        /// Write the representation with 4-space indentation
        #[arg(long)]
        indent_json: bool,

        /// Fail when dependencies are declared but none can be loaded
        #[arg(long)]
        require_dependencies: bool,

        /// Compilation engine executable
        #[arg(long, env = "MODELC_ENGINE")]
        engine: Option<PathBuf>,

        /// Argument passed to the engine (repeatable)
        #[arg(long = "engine-arg", value_name = "ARG", allow_hyphen_values = true)]
        engine_args: Vec<String>,

        /// Give up on the engine after this many seconds (0 = no limit)
        #[arg(long, env = "MODELC_ENGINE_TIMEOUT_SECS", default_value = "0")]
        engine_timeout_secs: u64,

        /// HTTP timeout for remote dependencies, in seconds (0 = no limit)
        #[arg(long, default_value = "30")]
        fetch_timeout_secs: u64,
    },

    /// Show source changes since the last build
    Changes {
        #[command(flatten)]
        project: ProjectArgs,

        /// List every changed path, not just the counts
        #[arg(long)]
        list: bool,
    },

    /// Load declared dependencies and report each result
    Deps {
        #[command(flatten)]
        project: ProjectArgs,

        /// HTTP timeout for remote dependencies, in seconds (0 = no limit)
        #[arg(long, default_value = "30")]
        fetch_timeout_secs: u64,
    },
}

#[derive(clap::Args)]
struct ProjectArgs {
    /// Project directory containing modelc.json
    #[arg(default_value = ".")]
    project_dir: PathBuf,

    /// Representation output path (default: <project>/modelc-ir.json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Hash state file (default: <project>/modelc-hashes.json)
    #[arg(long)]
    hash_file: Option<PathBuf>,

    /// Extra dependency to load (repeatable)
    #[arg(short, long = "include", value_name = "SPECIFIER")]
    includes: Vec<String>,
}

impl ProjectArgs {
    fn config(&self) -> BuildConfig {
        let mut config =
            BuildConfig::for_project(&self.project_dir).with_includes(self.includes.clone());
        if let Some(output) = &self.output {
            config = config.with_ir_path(output);
        }
        if let Some(hash_file) = &self.hash_file {
            config = config.with_hash_state_path(hash_file);
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let format = if cli.json { LogFormat::Json } else { LogFormat::Text };
    init_tracing(format, level);

    match cli.command {
        Commands::Make {
            project,
            no_incremental,
            types_only,
            limit_to,
            indent_json,
            require_dependencies,
            engine,
            engine_args,
            engine_timeout_secs,
            fetch_timeout_secs,
        } => {
            let engine = engine
                .context("no compilation engine configured (use --engine or MODELC_ENGINE)")?;
            let command = EngineCommand::new(engine)
                .with_args(engine_args)
                .with_timeout(limit(engine_timeout_secs));
            let options = CompileOptions {
                types_only,
                limit_to_modules: (!limit_to.is_empty()).then_some(limit_to),
            };
            let config = project
                .config()
                .with_incremental(!no_incremental)
                .with_options(options)
                .with_require_dependencies(require_dependencies)
                .with_indent_json(indent_json);
            cmd_make(command, &config, fetch_timeout_secs).await
        }
        Commands::Changes { project, list } => cmd_changes(&project.config(), list).await,
        Commands::Deps {
            project,
            fetch_timeout_secs,
        } => cmd_deps(&project.config(), fetch_timeout_secs).await,
    }
}

/// Seconds from the command line; zero means unbounded.
fn limit(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn resolver(project_dir: &Path, fetch_timeout_secs: u64) -> Result<DependencyResolver> {
    let fetcher = match limit(fetch_timeout_secs) {
        Some(timeout) => HttpFetcher::with_timeout(timeout),
        None => HttpFetcher::new(),
    }
    .context("Failed to create HTTP client")?;
    Ok(DependencyResolver::new(project_dir, Arc::new(fetcher)))
}

async fn cmd_make(
    command: EngineCommand,
    config: &BuildConfig,
    fetch_timeout_secs: u64,
) -> Result<()> {
    let orchestrator = Orchestrator::new(
        Arc::new(ProcessEngine::new(command)),
        resolver(&config.project_dir, fetch_timeout_secs)?,
    );

    match orchestrator.make(config).await {
        Ok(outcome) => {
            print_outcome(&outcome, config);
            Ok(())
        }
        Err(err) => {
            if let Some(body) = err.engine_body() {
                eprintln!(
                    "{}",
                    serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string())
                );
            }
            if let FrontendError::DependenciesUnavailable { failures, .. } = &err {
                for failure in failures {
                    eprintln!("  {failure}");
                }
            }
            Err(err).context("Build failed")
        }
    }
}

fn print_outcome(outcome: &BuildOutcome, config: &BuildConfig) {
    println!("{}: {}", outcome.strategy, outcome.summary);
    if outcome.dependencies_resolved > 0 || !outcome.dependency_failures.is_empty() {
        println!(
            "Dependencies: {} loaded, {} failed",
            outcome.dependencies_resolved,
            outcome.dependency_failures.len()
        );
    }
    for failure in &outcome.dependency_failures {
        println!("  skipped {failure}");
    }
    if outcome.strategy == BuildStrategy::NoOp {
        println!("Up to date: {}", config.ir_path.display());
    } else {
        println!("Wrote {}", config.ir_path.display());
    }
    println!("Build {} finished in {}ms", short_id(&outcome.build_id), outcome.duration_ms);
}

fn short_id(id: &str) -> &str {
    &id[..8.min(id.len())]
}

async fn cmd_changes(config: &BuildConfig, list: bool) -> Result<()> {
    let plan = preview(config)
        .await
        .context("Failed to detect source changes")?;

    println!("Strategy: {}", plan.strategy);
    println!("{}", plan.summary);
    if list {
        for (path, change) in plan.changes.iter() {
            let marker = match change {
                FileChange::Insert { .. } => "+",
                FileChange::Update { .. } => "~",
                FileChange::Delete => "-",
                FileChange::NoChange { .. } => continue,
            };
            println!("  {marker} {path}");
        }
    }
    for unreadable in &plan.changes.unreadable {
        println!("  ! {} ({})", unreadable.path, unreadable.source);
    }
    Ok(())
}

async fn cmd_deps(config: &BuildConfig, fetch_timeout_secs: u64) -> Result<()> {
    let manifest = ProjectManifest::load(&config.manifest_path)
        .await
        .with_context(|| format!("Failed to load {}", config.manifest_path.display()))?;
    let specs = manifest.dependency_config(&config.includes).to_specs();
    if specs.is_empty() {
        println!("No dependencies declared.");
        return Ok(());
    }

    let resolution = resolver(&config.project_dir, fetch_timeout_secs)?
        .resolve_all(specs)
        .await;
    for dep in &resolution.resolved {
        println!(
            "ok    [{}] {} ({}, format {})",
            dep.provenance,
            dep.specifier,
            dep.document.distribution_kind(),
            dep.document.format_version()
        );
    }
    for failure in &resolution.failures {
        println!("error [{}] {}: {}", failure.provenance, failure.specifier, failure.kind);
    }
    println!(
        "{} of {} dependencies loaded",
        resolution.resolved.len(),
        resolution.attempted()
    );
    Ok(())
}
