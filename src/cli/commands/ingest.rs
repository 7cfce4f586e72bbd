//! Ingest command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the ingest command.
pub fn run_ingest(data_dir: Option<String>, mut settings: Settings) -> Result<()> {
    if let Some(dir) = data_dir {
        settings.data.csv_dir = dir;
    }

    if let Err(e) = preflight::check(Operation::Ingest, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let dir = settings.csv_dir();
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner(&format!("Loading CSV files from {}...", dir.display()));
    let result = orchestrator.ingest(&dir);
    spinner.finish_and_clear();

    match result {
        Ok(report) => {
            Output::success("Ingestion complete");
            Output::kv("Teams", &report.teams.to_string());
            Output::kv("Players", &report.players.to_string());
            Output::kv("Games", &report.games.to_string());
            Output::kv("Box scores", &report.box_scores.to_string());
            Output::info("Embeddings were reset. Run 'courtside embed' next.");
        }
        Err(e) => {
            Output::error(&format!("Ingestion failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
