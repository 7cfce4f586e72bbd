//! RAG (Retrieval-Augmented Generation) over game and box-score rows.
//!
//! A question is embedded, matched against both tables, rendered into a
//! context block and answered by a chat model. The model's free-form output
//! is then resolved into an answer plus evidence pointing at retrieved rows.

pub mod batch;
pub mod classify;
pub mod context;
mod engine;
pub mod evidence;
pub mod generator;
pub mod retriever;

pub use batch::{BatchOptions, BatchReport, BatchRunner};
pub use classify::{classify, Classification, StatCategories, StatCategory, LEADER_PHRASES};
pub use context::build_context;
pub use engine::{Answer, RagEngine, StructuredAnswer};
pub use evidence::{resolve, CitationOutcome, EvidenceId, EvidenceItem, ParseOutcome, Resolution};
pub use generator::{Generator, OpenAIGenerator, APOLOGY};
pub use retriever::Retriever;

use crate::records::{GameRow, PlayerRow, GAME_TABLE, PLAYER_TABLE};

/// How a row entered the result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowSource {
    /// Nearest neighbour to the question vector.
    Nearest,
    /// Full roster of a top game, fetched by game id.
    GameRoster,
}

/// A joined row of either table.
#[derive(Debug, Clone, PartialEq)]
pub enum RowRecord {
    Game(GameRow),
    Player(PlayerRow),
}

/// One row handed to the context builder for a single question.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedRow {
    pub record: RowRecord,
    /// Similarity to the question; `None` for exact-match roster rows.
    pub score: Option<f32>,
    pub source: RowSource,
}

impl RetrievedRow {
    pub fn nearest_game(row: GameRow, score: f32) -> Self {
        Self {
            record: RowRecord::Game(row),
            score: Some(score),
            source: RowSource::Nearest,
        }
    }

    pub fn nearest_player(row: PlayerRow, score: f32) -> Self {
        Self {
            record: RowRecord::Player(row),
            score: Some(score),
            source: RowSource::Nearest,
        }
    }

    pub fn roster_player(row: PlayerRow) -> Self {
        Self {
            record: RowRecord::Player(row),
            score: None,
            source: RowSource::GameRoster,
        }
    }

    /// Table the row came from.
    pub fn table(&self) -> &'static str {
        match self.record {
            RowRecord::Game(_) => GAME_TABLE,
            RowRecord::Player(_) => PLAYER_TABLE,
        }
    }

    /// Citation key, e.g. `game_details:22300634`.
    pub fn citation_key(&self) -> String {
        match &self.record {
            RowRecord::Game(row) => format!("{}:{}", GAME_TABLE, row.game.game_id),
            RowRecord::Player(row) => format!("{}:{}", PLAYER_TABLE, row.stats.key()),
        }
    }

    pub fn as_game(&self) -> Option<&GameRow> {
        match &self.record {
            RowRecord::Game(row) => Some(row),
            RowRecord::Player(_) => None,
        }
    }

    pub fn as_player(&self) -> Option<&PlayerRow> {
        match &self.record {
            RowRecord::Player(row) => Some(row),
            RowRecord::Game(_) => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Stand-ins for the model gateways.

    use crate::embedding::Embedder;
    use crate::error::{CourtsideError, Result};
    use crate::rag::Generator;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Returns the same vector for every text; an empty vector means failure.
    pub struct FixedEmbedder(pub Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            if self.0.is_empty() {
                return Err(CourtsideError::Embedding("no vector configured".to_string()));
            }
            Ok(self.0.clone())
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            self.0.len()
        }
    }

    /// Replies with canned text (or fails) and remembers the prompts it saw.
    pub struct ScriptedGenerator {
        replies: Mutex<Vec<String>>,
        fail: bool,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn reply(text: &str) -> Self {
            Self::replies(&[text])
        }

        /// Replies in order; the last reply repeats.
        pub fn replies(texts: &[&str]) -> Self {
            Self {
                replies: Mutex::new(texts.iter().rev().map(|t| t.to_string()).collect()),
                fail: false,
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                replies: Mutex::new(Vec::new()),
                fail: true,
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn last_prompt(&self) -> String {
            self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
        }

        pub fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail {
                return Err(CourtsideError::OpenAI("connection refused".to_string()));
            }
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                Ok(replies.pop().unwrap_or_default())
            } else {
                Ok(replies.last().cloned().unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::*;

    #[test]
    fn test_citation_keys() {
        let game = RetrievedRow::nearest_game(game_row(22300634), 0.9);
        assert_eq!(game.citation_key(), "game_details:22300634");
        assert_eq!(game.table(), GAME_TABLE);

        let player = RetrievedRow::roster_player(player_row(2544, "LeBron", "James", 22300634, 30));
        assert_eq!(player.citation_key(), "player_box_scores:2544_22300634");
        assert_eq!(player.score, None);
        assert!(player.as_game().is_none());
    }
}
