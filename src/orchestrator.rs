//! Pipeline orchestrator for Courtside.
//!
//! Builds the store, embedder, generator and engine from settings, and runs
//! the offline jobs (ingestion and embedding backfill) against them.

use crate::config::{Prompts, Settings};
use crate::embedding::{BackfillReport, BackfillTarget, Embedder, EmbeddingBackfill, OpenAIEmbedder};
use crate::error::Result;
use crate::ingest::{ingest_dir, IngestReport};
use crate::rag::{Generator, OpenAIGenerator, RagEngine, Retriever};
use crate::vector_store::{SqliteStatsStore, StatsStore};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The main orchestrator for the Courtside pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    store: Arc<SqliteStatsStore>,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
}

impl Orchestrator {
    /// Create an orchestrator with components configured from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        // Load prompts (with optional custom directory and variables)
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let db_path = settings.database_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Arc::new(SqliteStatsStore::new(&db_path)?);

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
            &settings.embedding.endpoint(),
        )?);

        info!(
            "Using {} for embeddings and {} for answers",
            settings.embedding.model, settings.generation.model
        );
        let generator: Arc<dyn Generator> = Arc::new(
            OpenAIGenerator::new(
                &settings.generation.model,
                &settings.generation.endpoint(),
                &prompts.answer.system,
            )?
            .with_temperature(settings.generation.temperature)
            .with_max_tokens(settings.generation.max_tokens),
        );

        Ok(Self {
            settings,
            prompts,
            store,
            embedder,
            generator,
        })
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        store: Arc<SqliteStatsStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            settings,
            prompts,
            store,
            embedder,
            generator,
        }
    }

    /// Get the store as a trait object.
    pub fn store(&self) -> Arc<dyn StatsStore> {
        self.store.clone() as Arc<dyn StatsStore>
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build a retriever with the configured fetch sizes.
    pub fn retriever(&self) -> Retriever {
        let retrieval = &self.settings.retrieval;
        Retriever::new(self.store(), retrieval.game_k, retrieval.player_k, retrieval.leader_games)
    }

    /// Build the question-answering engine.
    pub fn engine(&self) -> RagEngine {
        RagEngine::new(self.embedder.clone(), self.retriever(), self.generator.clone())
            .with_prompts(self.prompts.clone())
    }

    /// Replace every table with the CSV files in `dir`.
    pub fn ingest(&self, dir: &Path) -> Result<IngestReport> {
        ingest_dir(&self.store, dir)
    }

    /// Embed rows that lack a vector.
    pub async fn backfill(
        &self,
        target: BackfillTarget,
        limit: Option<usize>,
        on_progress: &(dyn Fn(&str, usize, usize) + Send + Sync),
    ) -> Result<BackfillReport> {
        self.store.ensure_embedding_columns()?;
        EmbeddingBackfill::new(self.store(), self.embedder.clone())
            .run(target, limit, on_progress)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::fakes::{FixedEmbedder, ScriptedGenerator};
    use crate::vector_store::fixtures::seeded_store;

    fn orchestrator(reply: &str) -> Orchestrator {
        Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            Arc::new(seeded_store()),
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            Arc::new(ScriptedGenerator::reply(reply)),
        )
    }

    #[tokio::test]
    async fn test_backfill_then_ask() {
        let orchestrator = orchestrator("Luka Dončić led all scorers. |||EVIDENCE:player_box_scores:1629029_200|||");

        let report = orchestrator.backfill(BackfillTarget::All, None, &|_, _, _| {}).await.unwrap();
        assert_eq!(report.total_written(), 6);

        let answer = orchestrator.engine().ask("Who led the Mavericks game?").await.unwrap();
        assert_eq!(answer.answer, "Luka Dončić led all scorers.");
        assert_eq!(answer.evidence.len(), 1);
        assert_eq!(answer.evidence[0].table, "player_box_scores");
    }
}
