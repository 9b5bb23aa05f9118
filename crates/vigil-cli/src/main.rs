// Vigil CLI
// Command-line surface for the post-write quality gate: hook execution for
// the agent, plus installation and inspection commands for humans.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;
mod settings;

use vigil_core::logging::init_logging;

/// Vigil - post-write quality gate for AI coding agents
#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil - validates and auto-fixes files as your AI agent writes them.")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path (bypasses discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a commented default vigil.yaml into the current directory
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },
    /// Register the hook in the agent's settings file
    Install {
        /// Settings file to edit (default: .claude/settings.json)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
    /// Remove the hook entries added by install
    Uninstall {
        /// Settings file to edit (default: .claude/settings.json)
        #[arg(short, long)]
        settings: Option<PathBuf>,
    },
    /// Read one write event from stdin, run the gate, print the report
    Hook,
    /// Validate one file (no fixing) and print the report
    Check {
        /// File to validate
        file: PathBuf,
    },
    /// Show config discovery, detected tool versions, and availability
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Init { force } => commands::init::run(&cwd, force),
        Commands::Install { settings } => commands::install::run_install(&cwd, settings.as_deref()),
        Commands::Uninstall { settings } => {
            commands::install::run_uninstall(&cwd, settings.as_deref())
        }
        Commands::Hook => commands::hook::run(cli.config.as_deref(), &cwd).await,
        Commands::Check { file } => commands::check::run(cli.config.as_deref(), &cwd, &file).await,
        Commands::Status => commands::status::run(cli.config.as_deref(), &cwd).await,
    }
}
