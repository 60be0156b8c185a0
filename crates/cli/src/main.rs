//! npcmind CLI — the main entry point.
//!
//! Commands:
//! - `run`      — Run the pipeline against the configured endpoint
//! - `compile`  — Print the assembled prompt without calling any backend
//! - `models`   — List supported model identifiers
//! - `config`   — Show the effective configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "npcmind",
    about = "npcmind — turn NPC history into validated game actions",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and print the resulting actions
    Run {
        /// History file (JSON array of entries), or `-` for stdin
        #[arg(long)]
        history: String,

        /// Model identifier (falls back to the configured default)
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Print the assembled message sequence as JSON (dry run)
    Compile {
        /// History file (JSON array of entries), or `-` for stdin
        #[arg(long)]
        history: String,
    },

    /// List supported models
    Models,

    /// Show the effective configuration (secrets redacted)
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine-readable
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { history, model } => commands::run::run(&history, model.as_deref()).await?,
        Commands::Compile { history } => commands::compile::run(&history)?,
        Commands::Models => commands::models::run()?,
        Commands::Config => commands::config_cmd::run()?,
    }

    Ok(())
}
