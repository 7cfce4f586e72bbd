//! CSV ingestion into the stats store.
//!
//! Each of the four tables is read from `<dir>/<table>.csv` and replaced
//! wholesale. All files are parsed and validated (types, winner, unique keys)
//! before any table is touched, and the four tables are replaced in one
//! transaction, so a bad file leaves the database as it was.

use crate::error::{CourtsideError, Result};
use crate::records::{GameRecord, PlayerBoxScoreRecord, PlayerRecord, TeamRecord};
use crate::vector_store::SqliteStatsStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt::Display;
use std::hash::Hash;
use std::path::Path;
use tracing::{info, instrument};

pub const TEAMS_FILE: &str = "teams.csv";
pub const PLAYERS_FILE: &str = "players.csv";
pub const GAMES_FILE: &str = "game_details.csv";
pub const BOX_SCORES_FILE: &str = "player_box_scores.csv";

/// Rows loaded per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub teams: usize,
    pub players: usize,
    pub games: usize,
    pub box_scores: usize,
}

/// Parsed contents of a data directory.
#[derive(Debug, Default)]
pub struct Dataset {
    pub teams: Vec<TeamRecord>,
    pub players: Vec<PlayerRecord>,
    pub games: Vec<GameRecord>,
    pub box_scores: Vec<PlayerBoxScoreRecord>,
}

impl Dataset {
    /// Read and validate all four CSV files in `dir`.
    pub fn read_dir(dir: &Path) -> Result<Self> {
        let teams = read_csv::<TeamRecord>(&dir.join(TEAMS_FILE))?;
        let players = read_csv::<PlayerRecord>(&dir.join(PLAYERS_FILE))?;
        let games = read_csv::<GameRecord>(&dir.join(GAMES_FILE))?;
        let box_scores = read_csv::<PlayerBoxScoreRecord>(&dir.join(BOX_SCORES_FILE))?;

        for (line, game) in &games {
            game.validate()
                .map_err(|e| CourtsideError::Ingest(format!("{} line {}: {}", GAMES_FILE, line, e)))?;
        }

        check_unique(TEAMS_FILE, &teams, |t| t.team_id)?;
        check_unique(PLAYERS_FILE, &players, |p| p.player_id)?;
        check_unique(GAMES_FILE, &games, |g| g.game_id)?;
        check_unique(BOX_SCORES_FILE, &box_scores, |s| s.key())?;

        Ok(Self {
            teams: strip_lines(teams),
            players: strip_lines(players),
            games: strip_lines(games),
            box_scores: strip_lines(box_scores),
        })
    }
}

/// Load a data directory into the store, replacing every table.
///
/// Replacing a table discards its embeddings; run the backfill afterwards.
#[instrument(skip(store))]
pub fn ingest_dir(store: &SqliteStatsStore, dir: &Path) -> Result<IngestReport> {
    info!("Starting ingestion from {}", dir.display());
    let data = Dataset::read_dir(dir)?;

    let report = store.replace_all(&data)?;

    info!(
        "Finished ingestion: {} teams, {} players, {} games, {} box scores",
        report.teams, report.players, report.games, report.box_scores
    );
    Ok(report)
}

/// Parse a CSV file into records, keeping each record's line number.
///
/// Columns are matched by header name; extra columns are ignored.
fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<(u64, T)>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| CourtsideError::Ingest(format!("Failed to open {}: {}", path.display(), e)))?;
    let headers = reader.headers()?.clone();
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let row = record
            .deserialize::<T>(Some(&headers))
            .map_err(|e| CourtsideError::Ingest(format!("{} line {}: {}", name, line, e)))?;
        rows.push((line, row));
    }
    Ok(rows)
}

/// Reject a second row with the same key, naming both lines.
fn check_unique<T, K: Eq + Hash + Display>(file: &str, rows: &[(u64, T)], key: impl Fn(&T) -> K) -> Result<()> {
    let mut seen: HashMap<K, u64> = HashMap::with_capacity(rows.len());
    for (line, row) in rows {
        match seen.entry(key(row)) {
            Entry::Occupied(first) => {
                return Err(CourtsideError::Ingest(format!(
                    "{} line {}: duplicate key {} (first seen on line {})",
                    file,
                    line,
                    first.key(),
                    first.get()
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(*line);
            }
        }
    }
    Ok(())
}

fn strip_lines<T>(rows: Vec<(u64, T)>) -> Vec<T> {
    rows.into_iter().map(|(_, row)| row).collect()
}
