//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::CitationOutcome;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(question: &str, model: Option<String>, mut settings: Settings) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'courtside doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    if let Some(model) = model {
        settings.generation.model = model;
    }

    let orchestrator = Orchestrator::new(settings)?;
    let engine = orchestrator.engine();

    let spinner = Output::spinner("Searching box scores...");

    match engine.ask(question).await {
        Ok(answer) => {
            spinner.finish_and_clear();

            println!("\n{}\n", answer.answer);

            if !answer.evidence.is_empty() {
                Output::header("Evidence");
                for item in &answer.evidence {
                    Output::evidence(item);
                }
                if answer.citation == CitationOutcome::Fallback {
                    Output::warning("The model did not cite a row; evidence was chosen heuristically.");
                }
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
