//! Blossom CLI — the main entry point.
//!
//! Commands:
//! - `init`    — Write a starter config.toml
//! - `chat`    — Interactive chat or single-message mode
//! - `sync`    — Reconcile the FAQ index with `faq.json`
//! - `lookup`  — Show a therapist's profile

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "blossom",
    about = "Blossom — customer assistant for a counselling centre",
    version,
    author
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
    /// Write a default config.toml and create the data directory
    Init,

    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Bring the FAQ index in line with faq.json
    Sync,

    /// Show a therapist's profile (near-miss names are resolved)
    Lookup {
        /// Therapist name
        name: String,
    },
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

    match cli.command {
        Commands::Init => commands::init::run()?,
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Sync => commands::sync::run().await?,
        Commands::Lookup { name } => commands::lookup::run(&name)?,
    }

    Ok(())
}
