//! Memory Therapy CLI - Database migrations and provider diagnostics.
//!
//! # Usage
//!
//! ```bash
//! # Run studio database migrations (including the session table)
//! mt-cli migrate
//!
//! # Check which text model answers with the configured key
//! mt-cli diagnose
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "mt-cli")]
#[command(author, version, about = "Memory Therapy CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Probe the configured text models
    Diagnose,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::studio().await?,
        Commands::Diagnose => {
            let model = commands::diagnose::text_models().await?;
            tracing::info!("Diagnostics passed: {model} is answering");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_subcommands() {
        let cli = Cli::try_parse_from(["mt-cli", "diagnose"]).expect("parse");
        assert!(matches!(cli.command, Commands::Diagnose));
        assert!(Cli::try_parse_from(["mt-cli", "seed"]).is_err());
    }
}
