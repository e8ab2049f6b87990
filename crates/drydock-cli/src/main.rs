mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, release::ReleaseSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "drydock",
    about = "Deterministic release orchestration for multi-service container deployments",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from .drydock/ or .git/)
    #[arg(long, global = true, env = "DRYDOCK_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize drydock in the current repository
    Init,

    /// Show project state
    State,

    /// Validate or display the configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Manage releases
    Release {
        #[command(subcommand)]
        subcommand: ReleaseSubcommand,
    },

    /// Detect which services changed for a release
    Detect { release: String },

    /// Build and push images for the changed services
    Build {
        release: String,
        /// Print the docker commands without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Render image refs into the environment's var file
    Render { release: String },

    /// Plan the environment against the rendered var file
    Plan { release: String },

    /// Record an approval for a release
    Approve {
        release: String,
        /// Who is approving
        #[arg(long)]
        by: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Apply the saved plan and extract service URLs
    Apply { release: String },

    /// Rebuild the gateway against the deployed service URLs
    Compose {
        release: String,
        /// Print the docker commands without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Render, plan and apply the gateway image (final phase)
    Finalize { release: String },

    /// Show the next step for a release (or all active releases)
    Next {
        /// Release slug (omit to show all active releases)
        #[arg(long = "for")]
        release: Option<String>,
    },

    /// Drive all remaining steps until done or blocked on approval
    Deploy { release: String },

    /// Check that git, docker and an IaC binary are available
    Doctor,
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Deploy { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root, cli.json),
        Commands::State => cmd::state::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Release { subcommand } => cmd::release::run(&root, subcommand, cli.json),
        Commands::Detect { release } => cmd::detect::run(&root, &release, cli.json),
        Commands::Build { release, dry_run } => cmd::build::run(&root, &release, dry_run, cli.json),
        Commands::Render { release } => cmd::render::run(&root, &release, cli.json),
        Commands::Plan { release } => cmd::plan::run(&root, &release, cli.json),
        Commands::Approve { release, by, note } => {
            cmd::approve::run(&root, &release, &by, note, cli.json)
        }
        Commands::Apply { release } => cmd::apply::run(&root, &release, cli.json),
        Commands::Compose { release, dry_run } => {
            cmd::compose::run(&root, &release, dry_run, cli.json)
        }
        Commands::Finalize { release } => cmd::finalize::run(&root, &release, cli.json),
        Commands::Next { release } => cmd::next::run(&root, release.as_deref(), cli.json),
        Commands::Deploy { release } => cmd::deploy::run(&root, &release, cli.json),
        Commands::Doctor => cmd::doctor::run(&root, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
