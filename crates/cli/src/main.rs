//! cogloop CLI — the main entry point.
//!
//! Commands:
//! - `serve`  — Run the cognitive loop and the HTTP gateway (default)
//! - `config` — Validate and print the effective configuration
//! - `doctor` — Check the system prompt and model endpoint

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "cogloop",
    about = "cogloop — a long-running agent you can watch, talk to and pause",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent loop and the HTTP gateway
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate and print the effective configuration
    Config,

    /// Diagnose system prompt and model endpoint
    Doctor,
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

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Config => commands::config_cmd::run()?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
