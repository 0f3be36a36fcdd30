//! MAID Runner: manifest-driven validation for AI-assisted codebases.
//!
//! **MAID Runner checks that a codebase matches a chronological chain of
//! declarative manifests.** A manifest is an immutable JSON contract that
//! names, for one target source file, the public artifacts the file must
//! define and the tests that must exercise them. The current state of any
//! file is the merge, in chronological order, of all non-superseded
//! manifests that reference it.
//!
//! # Core principles
//!
//! - **Deterministic**: the same manifest set and source snapshot always
//!   produce the same report, regardless of worker scheduling
//! - **Local-first**: no network, no execution of target code; everything is
//!   derived syntactically through language adapters
//! - **Immutable contracts**: manifests are never rewritten, only superseded
//! - **Proof over promise**: behavioural validation demands that every
//!   declared artifact is actually exercised by the declared tests
//!
//! # Pipeline
//!
//! `Load → Resolve → Parse → CheckImpl → CheckBehaviour → CheckCoherence →
//! Report`. The load phase is sequential, the parse/compare phases fan out
//! over rayon workers, the report phase joins and imposes the canonical
//! diagnostic order.
//!
//! # Crate structure
//!
//! - [`core`]: the validation kernel (store, chain, merge, validators,
//!   cache, diagnostics, report)
//! - [`adapters`]: language adapters turning source bytes into
//!   language-agnostic descriptors (Python, TypeScript/JavaScript, Svelte)
//!
//! ```bash
//! # Validate the whole repo against manifests/
//! maid validate
//!
//! # Validate one manifest with its full chain
//! maid validate task-042-auth.manifest.json
//!
//! # File-tracking report and dependency graph
//! maid track
//! maid graph --format dot
//! ```

pub mod adapters;
pub mod core;

use crate::core::config::{self, MaidConfig};
use crate::core::error::MaidError;
use crate::core::graph::GraphFormat;
use crate::core::output;
use crate::core::runner::{CancelToken, Target, ValidationRequest, run_validation};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "maid",
    version = env!("CARGO_PKG_VERSION"),
    about = "Manifest-driven validation for AI-assisted codebases",
    disable_version_flag = true
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ValidateCli {
    /// Validate a single manifest (filename) instead of the whole repo.
    manifest: Option<String>,
    /// Project root (defaults to the nearest ancestor with a manifest dir).
    #[clap(long)]
    root: Option<PathBuf>,
    /// Manifest directory (defaults to `<root>/manifests`).
    #[clap(long)]
    manifest_dir: Option<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    format: String,
    /// Validate the target manifest in isolation, without its chain.
    #[clap(long)]
    no_chain: bool,
    /// Disable the on-disk cache for this run.
    #[clap(long)]
    no_cache: bool,
    /// Attach a knowledge-graph export: 'node-link', 'dot' or 'flowchart'.
    #[clap(long)]
    graph: Option<String>,
}

#[derive(clap::Args, Debug)]
struct TrackCli {
    #[clap(long)]
    root: Option<PathBuf>,
    #[clap(long)]
    manifest_dir: Option<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    format: String,
}

#[derive(clap::Args, Debug)]
struct GraphCli {
    #[clap(long)]
    root: Option<PathBuf>,
    #[clap(long)]
    manifest_dir: Option<PathBuf>,
    /// Export format: 'node-link', 'dot' or 'flowchart'.
    #[clap(long, default_value = "flowchart")]
    format: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the codebase against its manifest chain
    #[clap(name = "validate", visible_alias = "v")]
    Validate(ValidateCli),

    /// Classify source files: tracked, registered, undeclared
    #[clap(name = "track", visible_alias = "t")]
    Track(TrackCli),

    /// Export the knowledge graph derived from the merged model
    #[clap(name = "graph", visible_alias = "g")]
    Graph(GraphCli),

    /// Show version information
    #[clap(name = "version")]
    Version,
}

/// Walk up from `start` to the nearest directory that looks like a MAID
/// project (has `.maid.toml` or the configured manifest directory).
fn find_project_root(start: &Path, manifest_dir_name: &str) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(config::CONFIG_FILE).exists() || current.join(manifest_dir_name).is_dir()
        {
            return current;
        }
        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

fn load_project(
    root: &Option<PathBuf>,
) -> Result<(PathBuf, MaidConfig), MaidError> {
    let root = match root {
        Some(root) => root.clone(),
        None => {
            let cwd = std::env::current_dir()?;
            find_project_root(&cwd, &MaidConfig::default().manifest_dir)
        }
    };
    let config = config::load_config(&root)?;
    Ok((root, config))
}

fn parse_graph_format(raw: &str) -> Result<GraphFormat, MaidError> {
    raw.parse::<GraphFormat>().map_err(MaidError::Config)
}

fn run_validate(cli: ValidateCli) -> Result<i32, MaidError> {
    let (project_root, config) = load_project(&cli.root)?;
    let graph_format = cli.graph.as_deref().map(parse_graph_format).transpose()?;
    let request = ValidationRequest {
        project_root,
        manifest_dir: cli.manifest_dir,
        target: match cli.manifest {
            Some(name) => Target::Manifest(name),
            None => Target::Repo,
        },
        use_chain: !cli.no_chain,
        graph_format,
        use_cache: !cli.no_cache,
    };

    let report = run_validation(&request, &config, &CancelToken::new())?;
    match cli.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report.to_json())?),
        _ => output::render_report(&report),
    }
    Ok(report.exit_code())
}

fn run_track(cli: TrackCli) -> Result<i32, MaidError> {
    let (project_root, config) = load_project(&cli.root)?;
    let request = ValidationRequest {
        project_root,
        manifest_dir: cli.manifest_dir,
        target: Target::Repo,
        use_chain: true,
        graph_format: None,
        use_cache: true,
    };

    let report = run_validation(&request, &config, &CancelToken::new())?;
    if cli.format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&report.file_tracking)?
        );
    } else {
        let tracking = &report.file_tracking;
        for (label, files) in [
            ("tracked", &tracking.tracked),
            ("registered", &tracking.registered),
            ("undeclared", &tracking.undeclared),
            ("untracked tests", &tracking.untracked_tests),
        ] {
            println!("{} ({}):", label, files.len());
            for file in files {
                println!("    {}", file);
            }
        }
    }
    Ok(report.exit_code())
}

fn run_graph(cli: GraphCli) -> Result<i32, MaidError> {
    let (project_root, config) = load_project(&cli.root)?;
    let format = parse_graph_format(&cli.format)?;
    let request = ValidationRequest {
        project_root,
        manifest_dir: cli.manifest_dir,
        target: Target::Repo,
        use_chain: true,
        graph_format: Some(format),
        use_cache: true,
    };

    let report = run_validation(&request, &config, &CancelToken::new())?;
    if let Some(export) = &report.graph_export {
        match &export.rendered {
            Some(text) => println!("{}", text),
            None => println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "nodes": export.nodes,
                    "edges": export.edges,
                }))?
            ),
        }
    }
    Ok(report.exit_code())
}

/// CLI entry point. Returns the process exit code; `Err` means misuse
/// (exit 2 at the binary boundary).
pub fn run() -> Result<i32, MaidError> {
    let cli = Cli::parse();
    match cli.command {
        Command::Validate(validate_cli) => run_validate(validate_cli),
        Command::Track(track_cli) => run_track(track_cli),
        Command::Graph(graph_cli) => run_graph(graph_cli),
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}
