//! The question-answering pipeline.

use super::classify::{classify, Classification};
use super::context::build_context;
use super::evidence::{resolve, CitationOutcome, EvidenceItem, ParseOutcome};
use super::generator::{Generator, APOLOGY};
use super::retriever::Retriever;
use super::RetrievedRow;
use crate::config::Prompts;
use crate::embedding::Embedder;
use crate::error::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Answer to a free-text question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub evidence: Vec<EvidenceItem>,
    pub citation: CitationOutcome,
}

impl Answer {
    fn apology() -> Self {
        Self {
            answer: APOLOGY.to_string(),
            evidence: Vec::new(),
            citation: CitationOutcome::Empty,
        }
    }
}

/// Answer to a schema-constrained question.
#[derive(Debug, Clone)]
pub struct StructuredAnswer {
    /// Model text with citation tags removed.
    pub raw: String,
    pub result: Option<Value>,
    pub evidence: Vec<EvidenceItem>,
    pub parse: ParseOutcome,
    pub citation: CitationOutcome,
}

/// RAG engine for question answering.
///
/// Embedding and retrieval errors propagate; a failed generation call turns
/// into [`APOLOGY`] with no evidence.
pub struct RagEngine {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    prompts: Prompts,
}

impl RagEngine {
    pub fn new(embedder: Arc<dyn Embedder>, retriever: Retriever, generator: Arc<dyn Generator>) -> Self {
        Self {
            embedder,
            retriever,
            generator,
            prompts: Prompts::default(),
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Classify and retrieve without generating.
    #[instrument(skip(self))]
    pub async fn search(&self, question: &str) -> Result<(Classification, Vec<RetrievedRow>)> {
        let classification = classify(question);
        let query_embedding = self.embedder.embed(question).await?;
        let rows = self
            .retriever
            .retrieve_classified(&query_embedding, &classification)
            .await?;
        Ok((classification, rows))
    }

    /// Answer a question in prose with an inline citation.
    #[instrument(skip(self))]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        info!("Processing question: {}", question);

        let (classification, rows) = self.search(question).await?;
        let context = build_context(&rows, &classification.categories);
        let prompt = self.prompts.chat_prompt(question, &context);

        let raw = match self.generator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                return Ok(Answer::apology());
            }
        };

        let resolution = resolve(&raw, &rows, question);
        info!(
            "Answered with {} evidence rows ({:?})",
            resolution.evidence.len(),
            resolution.citation
        );

        Ok(Answer {
            answer: resolution.answer,
            evidence: resolution.evidence,
            citation: resolution.citation,
        })
    }

    /// Answer a question as a JSON object following `schema`.
    #[instrument(skip(self, schema))]
    pub async fn answer_structured(&self, question: &str, schema: &Value) -> Result<StructuredAnswer> {
        let (classification, rows) = self.search(question).await?;
        let context = build_context(&rows, &classification.categories);
        let prompt = self.prompts.batch_prompt(question, &context, schema);

        let raw = match self.generator.generate(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Answer generation failed: {}", e);
                return Ok(StructuredAnswer {
                    raw: APOLOGY.to_string(),
                    result: None,
                    evidence: Vec::new(),
                    parse: ParseOutcome::Unparsed,
                    citation: CitationOutcome::Empty,
                });
            }
        };

        let resolution = resolve(&raw, &rows, question);
        if resolution.parse == ParseOutcome::Unparsed {
            warn!("Model output for {:?} was not valid JSON", question);
        }

        Ok(StructuredAnswer {
            raw: resolution.answer,
            result: resolution.result,
            evidence: resolution.evidence,
            parse: resolution.parse,
            citation: resolution.citation,
        })
    }
}
