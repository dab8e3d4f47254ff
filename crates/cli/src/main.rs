//! Goalward CLI: the main entry point.
//!
//! Commands:
//! - `init`     Write a default config file
//! - `run`      Run decision cycles until Ctrl-C
//! - `once`     Run a single cycle and print the report
//! - `summary`  Summarize a recent period
//! - `notes`    Show the ranked context the engine would see
//! - `todos`    Show the agent's task list
//! - `status`   Show configuration and the last decision

use clap::{Parser, Subcommand};
use goalward_core::memory::SummaryPeriod;
use goalward_core::todo::TodoStatus;
use std::path::PathBuf;

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "goalward",
    about = "Goalward: an autonomous agent that works toward a goal",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: ~/.goalward/config.toml)
    #[arg(short, long, global = true, env = "GOALWARD_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Run decision cycles on the adaptive schedule until interrupted
    Run,

    /// Run one decision cycle now
    Once {
        /// Print the cycle report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize notes and decisions for a recent period
    Summary {
        /// daily, weekly or monthly
        #[arg(short, long, default_value = "daily")]
        period: SummaryPeriod,

        /// Archive the summary in the store
        #[arg(long)]
        save: bool,
    },

    /// Show notes ranked by importance
    Notes {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        #[arg(short, long)]
        category: Option<String>,

        /// How far back to look
        #[arg(long, default_value_t = 168)]
        hours: u32,
    },

    /// Show the agent's task list
    Todos {
        /// pending, in_progress, completed or cancelled
        #[arg(short, long)]
        status: Option<TodoStatus>,

        /// Only todos carrying this tag (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,
    },

    /// Show configuration and the last recorded decision
    Status,
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
        .init();

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Init => commands::init::run(config).await?,
        Commands::Run => commands::run::run(config).await?,
        Commands::Once { json } => commands::once::run(config, json).await?,
        Commands::Summary { period, save } => commands::summary::run(config, period, save).await?,
        Commands::Notes {
            limit,
            category,
            hours,
        } => commands::notes::run(config, limit, category, hours).await?,
        Commands::Todos { status, tag } => commands::todos::run(config, status, tag).await?,
        Commands::Status => commands::status::run(config).await?,
    }

    Ok(())
}
