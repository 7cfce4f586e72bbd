//! Batch command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::rag::{BatchOptions, BatchRunner};
use anyhow::Result;

/// Answer the questions file and write the answers file.
pub async fn run_batch(
    questions: Option<String>,
    template: Option<String>,
    output: Option<String>,
    only: Vec<usize>,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'courtside doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let options = BatchOptions {
        questions_path: Settings::expand_path(questions.as_deref().unwrap_or(&settings.batch.questions_path)),
        template_path: Settings::expand_path(template.as_deref().unwrap_or(&settings.batch.template_path)),
        answers_path: Settings::expand_path(output.as_deref().unwrap_or(&settings.batch.answers_path)),
        only,
    };

    let orchestrator = Orchestrator::new(settings)?;
    let engine = orchestrator.engine();

    let pb = Output::progress_bar(0, "questions");
    let on_progress = |done: usize, total: usize| {
        pb.set_length(total as u64);
        pb.set_position(done as u64);
    };
    let result = BatchRunner::new(&engine).run(&options, &on_progress).await;
    pb.finish_and_clear();

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            Output::error(&format!("Batch failed: {}", e));
            return Err(e.into());
        }
    };

    for id in &report.out_of_range {
        Output::warning(&format!("Question id {} is out of range, skipped", id));
    }
    for id in &report.failed {
        Output::warning(&format!("Question {} failed; previous answer kept", id));
    }
    if !report.unparsed.is_empty() {
        let ids: Vec<String> = report.unparsed.iter().map(|id| id.to_string()).collect();
        Output::warning(&format!("Unparsed model output for question(s) {}", ids.join(", ")));
    }

    Output::success(&format!(
        "Answered {} question(s); {} entries in {}",
        report.answered.len(),
        report.total_entries,
        options.answers_path.display()
    ));

    Ok(())
}
