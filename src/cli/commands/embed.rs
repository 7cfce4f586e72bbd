//! Embed command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::BackfillTarget;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::sync::Mutex;

/// Run the embedding backfill.
pub async fn run_embed(games: bool, players: bool, limit: Option<usize>, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Embed, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'courtside doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let target = match (games, players) {
        (true, false) => BackfillTarget::Games,
        (false, true) => BackfillTarget::Players,
        _ => BackfillTarget::All,
    };

    let orchestrator = Orchestrator::new(settings)?;

    // One bar per table, replaced when the table changes.
    let bar = Mutex::new(None::<(String, indicatif::ProgressBar)>);
    let on_progress = |table: &str, done: usize, total: usize| {
        let Ok(mut slot) = bar.lock() else { return };
        let stale = slot.as_ref().map(|(t, _)| t != table).unwrap_or(true);
        if stale {
            if let Some((_, old)) = slot.take() {
                old.finish();
            }
            *slot = Some((table.to_string(), Output::progress_bar(total as u64, table)));
        }
        if let Some((_, pb)) = slot.as_ref() {
            pb.set_position(done as u64);
        }
    };

    let result = orchestrator.backfill(target, limit, &on_progress).await;

    if let Ok(mut slot) = bar.lock() {
        if let Some((_, pb)) = slot.take() {
            pb.finish();
        }
    }

    match result {
        Ok(report) => {
            Output::success("Embedding backfill complete");
            Output::kv(
                "Games",
                &format!("{} embedded ({} candidates)", report.games.written, report.games.candidates),
            );
            Output::kv(
                "Box scores",
                &format!("{} embedded ({} candidates)", report.players.written, report.players.candidates),
            );
        }
        Err(e) => {
            Output::error(&format!("Embedding failed: {}", e));
            Output::info("Rows embedded so far are kept; re-run to resume.");
            return Err(e.into());
        }
    }

    Ok(())
}
