//! Courtside CLI entry point.

use anyhow::Result;
use clap::Parser;
use courtside::cli::{commands, Cli, Commands};
use courtside::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&std::path::PathBuf::from(path)))?,
        None => Settings::load()?,
    };

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("courtside={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure data directories exist
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings).await?;
        }

        Commands::Ingest { data_dir } => {
            commands::run_ingest(data_dir, settings)?;
        }

        Commands::Embed { games, players, limit } => {
            commands::run_embed(games, players, limit, settings).await?;
        }

        Commands::Ask { question, model } => {
            commands::run_ask(&question, model, settings).await?;
        }

        Commands::Search { query, games, players } => {
            commands::run_search(&query, games, players, settings).await?;
        }

        Commands::Batch {
            questions,
            template,
            output,
            only,
        } => {
            commands::run_batch(questions, template, output, only, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(&action, settings)?;
        }
    }

    Ok(())
}
