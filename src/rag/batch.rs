//! Offline batch answering.
//!
//! Reads a questions file (`[{"question": ...}]`) and a parallel template file
//! (`[{"result": {...schema}}]`), answers each question against its schema and
//! writes `[{"id", "result"}]` with the evidence nested in `result`. Ids are
//! 1-based positions in the questions file. An existing answers file is merged
//! by id, so a single question can be reprocessed without touching the rest.

use super::engine::RagEngine;
use super::evidence::ParseOutcome;
use crate::error::{CourtsideError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

#[derive(Debug, Deserialize)]
struct QuestionEntry {
    question: String,
}

#[derive(Debug, Deserialize)]
struct TemplateEntry {
    result: Value,
}

/// One line of the answers file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub id: usize,
    pub result: Value,
}

/// Where to read from and write to.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub questions_path: PathBuf,
    pub template_path: PathBuf,
    pub answers_path: PathBuf,
    /// Reprocess only these 1-based ids.
    pub only: Vec<usize>,
}

/// Summary of a batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Ids answered in this run.
    pub answered: Vec<usize>,
    /// Ids whose model output could not be read as JSON.
    pub unparsed: Vec<usize>,
    /// Ids that failed (embedding or store error); their previous entry is kept.
    pub failed: Vec<usize>,
    /// Requested ids outside the questions file.
    pub out_of_range: Vec<usize>,
    /// Total entries in the answers file after the merge.
    pub total_entries: usize,
}

/// Runs the batch against a [`RagEngine`].
pub struct BatchRunner<'a> {
    engine: &'a RagEngine,
}

impl<'a> BatchRunner<'a> {
    pub fn new(engine: &'a RagEngine) -> Self {
        Self { engine }
    }

    /// Answer the selected questions and merge them into the answers file.
    ///
    /// `on_progress` is called with `(done, total)` after each question.
    #[instrument(skip(self, options, on_progress), fields(only = ?options.only))]
    pub async fn run(
        &self,
        options: &BatchOptions,
        on_progress: &(dyn Fn(usize, usize) + Send + Sync),
    ) -> Result<BatchReport> {
        let questions: Vec<QuestionEntry> = read_json(&options.questions_path)?;
        let templates: Vec<TemplateEntry> = read_json(&options.template_path)?;
        if templates.len() != questions.len() {
            warn!(
                "{} questions but {} templates; missing templates use an empty schema",
                questions.len(),
                templates.len()
            );
        }

        let mut report = BatchReport::default();
        let selected: Vec<usize> = if options.only.is_empty() {
            (1..=questions.len()).collect()
        } else {
            let (valid, invalid): (Vec<usize>, Vec<usize>) = options
                .only
                .iter()
                .copied()
                .partition(|id| (1..=questions.len()).contains(id));
            for id in &invalid {
                warn!("Question id {} is out of range (1..={}), skipping", id, questions.len());
            }
            report.out_of_range = invalid;
            valid
        };

        let mut answers = load_answers(&options.answers_path)?;
        let total = selected.len();
        let empty_schema = Value::Object(Map::new());

        for (i, id) in selected.into_iter().enumerate() {
            let question = &questions[id - 1].question;
            let schema = templates.get(id - 1).map(|t| &t.result).unwrap_or(&empty_schema);
            info!("Question {}: {}", id, question);

            match self.engine.answer_structured(question, schema).await {
                Ok(answer) => {
                    if answer.parse == ParseOutcome::Unparsed {
                        report.unparsed.push(id);
                    }
                    let mut result = match answer.result {
                        Some(Value::Object(map)) => map,
                        _ => null_object(schema),
                    };
                    result.insert("evidence".to_string(), serde_json::to_value(&answer.evidence)?);
                    answers.insert(id, Value::Object(result));
                    report.answered.push(id);
                }
                Err(e) => {
                    warn!("Question {} failed: {}", id, e);
                    report.failed.push(id);
                }
            }

            on_progress(i + 1, total);
        }

        report.total_entries = answers.len();
        write_answers(&options.answers_path, answers)?;
        info!(
            "Batch complete: {} answered, {} unparsed, {} failed",
            report.answered.len(),
            report.unparsed.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CourtsideError::InvalidInput(format!("Failed to read {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&content)?)
}

fn load_answers(path: &Path) -> Result<BTreeMap<usize, Value>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let entries: Vec<AnswerEntry> = read_json(path)?;
    Ok(entries.into_iter().map(|e| (e.id, e.result)).collect())
}

fn write_answers(path: &Path, answers: BTreeMap<usize, Value>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let entries: Vec<AnswerEntry> = answers
        .into_iter()
        .map(|(id, result)| AnswerEntry { id, result })
        .collect();
    std::fs::write(path, serde_json::to_string_pretty(&entries)?)?;
    Ok(())
}

/// Copy of the schema with every leaf set to null. Nested objects keep their shape.
fn null_object(schema: &Value) -> Map<String, Value> {
    match schema {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let nulled = match value {
                    Value::Object(_) => Value::Object(null_object(value)),
                    _ => Value::Null,
                };
                (key.clone(), nulled)
            })
            .collect(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::fakes::{FixedEmbedder, ScriptedGenerator};
    use crate::rag::Retriever;
    use crate::vector_store::fixtures::seeded_store;
    use crate::vector_store::StatsStore;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn engine(generator: ScriptedGenerator) -> RagEngine {
        let store = seeded_store();
        store.set_game_embedding(100, &[1.0, 0.0]).await.unwrap();
        store.set_player_embedding(1628369, 100, &[1.0, 0.0]).await.unwrap();
        let store: Arc<dyn StatsStore> = Arc::new(store);
        RagEngine::new(
            Arc::new(FixedEmbedder(vec![1.0, 0.0])),
            Retriever::new(store, 5, 5, 2),
            Arc::new(generator),
        )
    }

    fn setup(dir: &TempDir) -> BatchOptions {
        let questions = json!([
            {"question": "Who won the Lakers vs Celtics game?"},
            {"question": "How many points did Jayson Tatum score?"}
        ]);
        let templates = json!([
            {"result": {"winner": null, "score": {"home": null, "away": null}}},
            {"result": {"points": null}}
        ]);
        let options = BatchOptions {
            questions_path: dir.path().join("questions.json"),
            template_path: dir.path().join("answers_template.json"),
            answers_path: dir.path().join("out").join("answers.json"),
            only: Vec::new(),
        };
        std::fs::write(&options.questions_path, questions.to_string()).unwrap();
        std::fs::write(&options.template_path, templates.to_string()).unwrap();
        options
    }

    fn read_answers(path: &Path) -> Vec<AnswerEntry> {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_batch_writes_nested_evidence_and_null_template() {
        let dir = TempDir::new().unwrap();
        let options = setup(&dir);
        let engine = engine(ScriptedGenerator::replies(&[
            r#"{"winner": "Los Angeles Lakers", "score": {"home": 114, "away": 106}} |||EVIDENCE:game_details:100|||"#,
            "Tatum scored a lot, but I cannot format JSON today.",
        ]))
        .await;

        let report = BatchRunner::new(&engine).run(&options, &|_, _| {}).await.unwrap();
        assert_eq!(report.answered, vec![1, 2]);
        assert_eq!(report.unparsed, vec![2]);

        let answers = read_answers(&options.answers_path);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].id, 1);
        assert_eq!(answers[0].result["winner"], json!("Los Angeles Lakers"));
        assert_eq!(answers[0].result["evidence"][0]["table"], json!("game_details"));
        assert_eq!(answers[0].result["evidence"][0]["id"], json!(100));

        assert_eq!(answers[1].result["points"], Value::Null);
        // Fallback evidence for a "points" question includes the top player row.
        assert_eq!(answers[1].result["evidence"][1]["id"], json!("1628369_100"));
    }

    #[tokio::test]
    async fn test_only_reprocesses_one_id_and_keeps_others() {
        let dir = TempDir::new().unwrap();
        let mut options = setup(&dir);

        let first = engine(ScriptedGenerator::reply(r#"{"winner": "old", "points": 1}"#)).await;
        BatchRunner::new(&first).run(&options, &|_, _| {}).await.unwrap();

        options.only = vec![2, 7];
        let second = engine(ScriptedGenerator::reply(r#"{"points": 35}"#)).await;
        let report = BatchRunner::new(&second).run(&options, &|_, _| {}).await.unwrap();

        assert_eq!(report.answered, vec![2]);
        assert_eq!(report.out_of_range, vec![7]);
        assert_eq!(report.total_entries, 2);

        let answers = read_answers(&options.answers_path);
        assert_eq!(answers[0].result["winner"], json!("old"));
        assert_eq!(answers[1].result["points"], json!(35));
    }

    #[tokio::test]
    async fn test_generation_failure_writes_null_template() {
        let dir = TempDir::new().unwrap();
        let options = setup(&dir);
        let engine = engine(ScriptedGenerator::failing()).await;

        BatchRunner::new(&engine).run(&options, &|_, _| {}).await.unwrap();

        let answers = read_answers(&options.answers_path);
        assert_eq!(
            answers[0].result,
            json!({"winner": null, "score": {"home": null, "away": null}, "evidence": []})
        );
    }

    #[test]
    fn test_null_object_keeps_shape() {
        let schema = json!({"a": 1, "b": {"c": "x"}, "d": [1, 2]});
        assert_eq!(
            Value::Object(null_object(&schema)),
            json!({"a": null, "b": {"c": null}, "d": null})
        );
    }
}
