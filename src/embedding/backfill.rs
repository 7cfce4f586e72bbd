//! Embedding backfill for game and box-score rows.
//!
//! Only rows with a NULL embedding are selected, and the write is guarded by
//! the same condition, so the job can be stopped and re-run at any point.
//! Running two backfills at once against the same rows wastes embedding calls
//! but cannot corrupt anything: the second write is a no-op.

use super::Embedder;
use crate::error::Result;
use crate::render::{render_game, render_player};
use crate::vector_store::StatsStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Log progress every this many rows.
const PROGRESS_INTERVAL: usize = 50;

/// Which tables to backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillTarget {
    Games,
    Players,
    All,
}

impl BackfillTarget {
    fn games(self) -> bool {
        matches!(self, BackfillTarget::Games | BackfillTarget::All)
    }

    fn players(self) -> bool {
        matches!(self, BackfillTarget::Players | BackfillTarget::All)
    }
}

/// Outcome for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableReport {
    /// Rows that lacked an embedding when selected.
    pub candidates: usize,
    /// Rows actually written.
    pub written: usize,
}

/// Outcome of a backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
    pub games: TableReport,
    pub players: TableReport,
}

impl BackfillReport {
    pub fn total_written(&self) -> usize {
        self.games.written + self.players.written
    }
}

/// Renders rows lacking a vector, embeds them and writes the vector back.
pub struct EmbeddingBackfill {
    store: Arc<dyn StatsStore>,
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingBackfill {
    pub fn new(store: Arc<dyn StatsStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Run the backfill.
    ///
    /// `limit` caps the rows selected per table. `on_progress` is called with
    /// `(table, done, total)` after each row.
    #[instrument(skip(self, on_progress))]
    pub async fn run(
        &self,
        target: BackfillTarget,
        limit: Option<usize>,
        on_progress: &(dyn Fn(&str, usize, usize) + Send + Sync),
    ) -> Result<BackfillReport> {
        let mut report = BackfillReport::default();

        if target.games() {
            report.games = self.backfill_games(limit, on_progress).await?;
        }
        if target.players() {
            report.players = self.backfill_players(limit, on_progress).await?;
        }

        Ok(report)
    }

    async fn backfill_games(
        &self,
        limit: Option<usize>,
        on_progress: &(dyn Fn(&str, usize, usize) + Send + Sync),
    ) -> Result<TableReport> {
        let rows = self.store.games_missing_embedding(limit).await?;
        let total = rows.len();
        info!("{} game rows need embedding", total);

        let mut written = 0;
        for (i, row) in rows.iter().enumerate() {
            let vector = self.embedder.embed(&render_game(row)).await?;
            if self.store.set_game_embedding(row.game.game_id, &vector).await? {
                written += 1;
            }

            let done = i + 1;
            on_progress("games", done, total);
            if done % PROGRESS_INTERVAL == 0 || done == total {
                info!("Progress: {}/{} game rows embedded ({} remaining)", done, total, total - done);
            }
        }

        info!("Finished game embeddings: {} rows updated", written);
        Ok(TableReport { candidates: total, written })
    }

    async fn backfill_players(
        &self,
        limit: Option<usize>,
        on_progress: &(dyn Fn(&str, usize, usize) + Send + Sync),
    ) -> Result<TableReport> {
        let rows = self.store.players_missing_embedding(limit).await?;
        let total = rows.len();
        info!("{} player rows need embedding", total);

        let mut written = 0;
        for (i, row) in rows.iter().enumerate() {
            let vector = self.embedder.embed(&render_player(row)).await?;
            if self
                .store
                .set_player_embedding(row.stats.person_id, row.stats.game_id, &vector)
                .await?
            {
                written += 1;
            }

            let done = i + 1;
            on_progress("players", done, total);
            if done % PROGRESS_INTERVAL == 0 || done == total {
                info!("Progress: {}/{} player rows embedded ({} remaining)", done, total, total - done);
            }
        }

        info!("Finished player embeddings: {} rows updated", written);
        Ok(TableReport { candidates: total, written })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CourtsideError;
    use crate::vector_store::fixtures::seeded_store;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and returns a fixed vector.
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.5, 0.5])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(CourtsideError::Embedding("model offline".to_string()))
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Err(CourtsideError::Embedding("model offline".to_string()))
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn no_progress(_: &str, _: usize, _: usize) {}

    #[tokio::test]
    async fn test_backfill_is_idempotent() {
        let store: Arc<dyn StatsStore> = Arc::new(seeded_store());
        let embedder = Arc::new(CountingEmbedder { calls: AtomicUsize::new(0) });
        let backfill = EmbeddingBackfill::new(store.clone(), embedder.clone());

        let first = backfill.run(BackfillTarget::All, None, &no_progress).await.unwrap();
        assert_eq!(first.games, TableReport { candidates: 2, written: 2 });
        // The orphaned box score is not embeddable.
        assert_eq!(first.players, TableReport { candidates: 4, written: 4 });
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 6);

        let second = backfill.run(BackfillTarget::All, None, &no_progress).await.unwrap();
        assert_eq!(second.total_written(), 0);
        assert_eq!(second.games.candidates + second.players.candidates, 0);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_backfill_resumes_after_limit() {
        let store: Arc<dyn StatsStore> = Arc::new(seeded_store());
        let embedder = Arc::new(CountingEmbedder { calls: AtomicUsize::new(0) });
        let backfill = EmbeddingBackfill::new(store.clone(), embedder);

        let partial = backfill.run(BackfillTarget::Games, Some(1), &no_progress).await.unwrap();
        assert_eq!(partial.games.written, 1);
        assert_eq!(partial.players, TableReport::default());

        let rest = backfill.run(BackfillTarget::Games, None, &no_progress).await.unwrap();
        assert_eq!(rest.games.written, 1);
        assert_eq!(store.stats().await.unwrap().games_embedded, 2);
    }

    #[tokio::test]
    async fn test_backfill_propagates_embedding_failure() {
        let store: Arc<dyn StatsStore> = Arc::new(seeded_store());
        let backfill = EmbeddingBackfill::new(store.clone(), Arc::new(FailingEmbedder));

        let err = backfill.run(BackfillTarget::Games, None, &no_progress).await.unwrap_err();
        assert!(matches!(err, CourtsideError::Embedding(_)));
        assert_eq!(store.stats().await.unwrap().games_embedded, 0);
    }
}
