//! contexture CLI: the main entry point.
//!
//! Commands:
//! - `assemble`: Flatten a composition tree into one text block
//! - `resolve`: Resolve dependencies and conflicts of a seed set
//! - `select`: Pick and render fragments for a token budget
//! - `config`: Show the effective configuration or its path
//!
//! Every command reads fragments and edges from a JSON snapshot. Results go
//! to stdout; logs go to stderr.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use contexture_config::SelectionStrategy;

mod commands;

#[derive(Parser)]
#[command(
    name = "contexture",
    about = "contexture: context assembly and dependency resolution over fragment graphs",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Read configuration from this file instead of ~/.contexture/config.toml
    #[arg(long, global = true, env = "CONTEXTURE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the composition tree under a root fragment
    Assemble(AssembleArgs),

    /// Resolve the dependencies of one or more seed fragments
    Resolve(ResolveArgs),

    /// Select fragments for a token budget and render them
    Select(SelectArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
pub struct AssembleArgs {
    /// JSON snapshot with fragments and edges
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Root fragment id
    #[arg(long)]
    pub root: String,

    #[arg(long)]
    pub max_depth: Option<usize>,

    #[arg(long)]
    pub max_tokens: Option<usize>,

    /// Skip optional children
    #[arg(long)]
    pub required_only: bool,

    /// Omit `[layer: name]` header lines
    #[arg(long)]
    pub no_headers: bool,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Seed fragment id (repeatable)
    #[arg(long = "seed", required = true)]
    pub seeds: Vec<String>,

    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Also follow strong `recommends` edges
    #[arg(long)]
    pub recommendations: bool,

    /// Minimum strength for a recommendation to be followed
    #[arg(long)]
    pub min_strength: Option<f64>,
}

#[derive(Args)]
pub struct SelectArgs {
    #[arg(long)]
    pub snapshot: PathBuf,

    /// Candidate fragment id (repeatable; default: every fragment).
    /// Large snapshots with the optimal strategy may exceed the optimizer's
    /// table limit; narrow the candidates or use `--strategy priority`.
    #[arg(long = "id")]
    pub ids: Vec<String>,

    /// Token budget
    #[arg(long)]
    pub budget: Option<usize>,

    /// `optimal` or `priority`
    #[arg(long)]
    pub strategy: Option<SelectionStrategy>,

    /// Prompt text passed to the embedding provider
    #[arg(long)]
    pub prompt: Option<String>,

    /// JSON array with a precomputed prompt embedding
    #[arg(long)]
    pub prompt_embedding: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Assemble(args) => commands::assemble::run(config_path, args).await?,
        Commands::Resolve(args) => commands::resolve::run(config_path, args).await?,
        Commands::Select(args) => commands::select::run(config_path, args).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
    }

    Ok(())
}
