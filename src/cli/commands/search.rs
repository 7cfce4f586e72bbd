//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    games: Option<usize>,
    players: Option<usize>,
    mut settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    if let Some(games) = games {
        settings.retrieval.game_k = games;
    }
    if let Some(players) = players {
        settings.retrieval.player_k = players;
    }

    let orchestrator = Orchestrator::new(settings)?;
    let engine = orchestrator.engine();

    let spinner = Output::spinner("Searching...");
    let results = engine.search(query).await;
    spinner.finish_and_clear();

    match results {
        Ok((classification, rows)) => {
            let categories: Vec<&str> = classification.categories.iter().map(|c| c.label()).collect();
            Output::kv("Leader question", if classification.is_leader { "yes" } else { "no" });
            Output::kv("Categories", &categories.join(", "));

            if rows.is_empty() {
                Output::warning("No rows found. Has 'courtside embed' been run?");
            } else {
                Output::success(&format!("Found {} rows", rows.len()));
                for row in &rows {
                    Output::retrieved_row(row);
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(anyhow::anyhow!("{}", e));
        }
    }

    Ok(())
}
