//! Stats store abstraction for Courtside.
//!
//! The relational tables (teams, players, games, box scores) plus one
//! nullable embedding column on `game_details` and on `player_box_scores`.
//! Retrieval needs two shapes of query: nearest rows by vector, and every
//! box score of a given set of games.

mod memory;
mod sqlite;

pub use memory::MemoryStatsStore;
pub use sqlite::SqliteStatsStore;

use crate::error::{CourtsideError, Result};
use crate::records::{GameRow, PlayerRow};
use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

/// A row with its similarity to the query (higher is better).
#[derive(Debug, Clone)]
pub struct SearchResult<T> {
    pub row: T,
    pub score: f32,
}

/// Row counts and embedding coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub teams: usize,
    pub players: usize,
    pub games: usize,
    pub games_embedded: usize,
    pub box_scores: usize,
    pub box_scores_embedded: usize,
}

/// Sizes for one retrieval read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalQuery {
    /// Nearest games to fetch.
    pub game_k: usize,
    /// Nearest player rows to fetch when no roster is read.
    pub player_k: usize,
    /// `Some(m)`: read the full box scores of the first `m` games instead of
    /// the nearest players, as long as at least one game was found.
    pub roster_games: Option<usize>,
}

/// Player rows read alongside the nearest games.
#[derive(Debug, Clone)]
pub enum PlayerHits {
    /// Every box score of the leading games, by game id then points.
    Roster(Vec<PlayerRow>),
    /// Nearest box scores, most similar first.
    Nearest(Vec<SearchResult<PlayerRow>>),
}

/// Trait for stats store implementations.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Games nearest to the query vector, most similar first.
    async fn nearest_games(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult<GameRow>>>;

    /// Player box scores nearest to the query vector, most similar first.
    async fn nearest_players(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult<PlayerRow>>>;

    /// Every box score belonging to the given games, ordered by game id then
    /// descending points.
    async fn players_in_games(&self, game_ids: &[i64]) -> Result<Vec<PlayerRow>>;

    /// Nearest games plus the player rows for them, as one read.
    ///
    /// The default composes the single-table calls. Stores with transactions
    /// should override it so both halves see the same data.
    async fn games_with_players(
        &self,
        query_embedding: &[f32],
        query: RetrievalQuery,
    ) -> Result<(Vec<SearchResult<GameRow>>, PlayerHits)> {
        let games = self.nearest_games(query_embedding, query.game_k).await?;
        let players = match query.roster_games {
            Some(m) if !games.is_empty() => {
                let ids: Vec<i64> = games.iter().take(m).map(|r| r.row.game.game_id).collect();
                PlayerHits::Roster(self.players_in_games(&ids).await?)
            }
            _ => PlayerHits::Nearest(self.nearest_players(query_embedding, query.player_k).await?),
        };
        Ok((games, players))
    }

    /// Games without an embedding.
    async fn games_missing_embedding(&self, limit: Option<usize>) -> Result<Vec<GameRow>>;

    /// Box scores without an embedding.
    async fn players_missing_embedding(&self, limit: Option<usize>) -> Result<Vec<PlayerRow>>;

    /// Attach an embedding to a game if it has none. Returns whether a row was written.
    async fn set_game_embedding(&self, game_id: i64, embedding: &[f32]) -> Result<bool>;

    /// Attach an embedding to a box score if it has none. Returns whether a row was written.
    async fn set_player_embedding(&self, person_id: i64, game_id: i64, embedding: &[f32]) -> Result<bool>;

    /// Row counts per table.
    async fn stats(&self) -> Result<StoreStats>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score candidates against the query and keep the `limit` best.
///
/// A stored vector whose length differs from the query's is an error: it
/// means the rows were embedded with another model and need a fresh backfill.
pub(crate) fn rank<T>(
    query_embedding: &[f32],
    candidates: impl IntoIterator<Item = (T, Vec<f32>)>,
    limit: usize,
) -> Result<Vec<SearchResult<T>>> {
    let mut results: Vec<SearchResult<T>> = Vec::new();
    for (row, embedding) in candidates {
        if embedding.len() != query_embedding.len() {
            warn!(
                "Stored embedding has {} dimensions, query has {}",
                embedding.len(),
                query_embedding.len()
            );
            return Err(CourtsideError::Store(format!(
                "Embedding dimension mismatch: stored rows have {}, query has {}. \
                 Re-run ingest and embed with the configured model",
                embedding.len(),
                query_embedding.len()
            )));
        }
        results.push(SearchResult {
            score: cosine_similarity(query_embedding, &embedding),
            row,
        });
    }

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    Ok(results)
}

/// Order a roster the way leader questions read it.
pub(crate) fn sort_roster(rows: &mut [PlayerRow]) {
    rows.sort_by(|a, b| {
        a.stats
            .game_id
            .cmp(&b.stats.game_id)
            .then(b.stats.points.cmp(&a.stats.points))
            .then(a.stats.person_id.cmp(&b.stats.person_id))
    });
}
