//! Courtside - question answering over NBA box scores
//!
//! Loads game and player box-score data into SQLite, embeds every row, and
//! answers natural-language questions with evidence pointing at the rows the
//! answer came from.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management and prompt templates
//! - `records` - Typed rows and their joined views
//! - `render` - Natural-language rendering of rows for embedding
//! - `ingest` - CSV loading
//! - `embedding` - Embedding generation and backfill
//! - `vector_store` - Stats store with per-row embeddings
//! - `rag` - Retrieval, context building, generation and evidence resolution
//! - `orchestrator` - Component wiring
//!
//! # Example
//!
//! ```rust,no_run
//! use courtside::config::Settings;
//! use courtside::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let answer = orchestrator
//!         .engine()
//!         .ask("Who led the Lakers in scoring on Christmas 2023?")
//!         .await?;
//!     println!("{}", answer.answer);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod records;
pub mod render;
pub mod vector_store;

pub use error::{CourtsideError, Result};
