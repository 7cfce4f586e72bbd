//! CLI output formatting utilities.

use crate::rag::{EvidenceId, EvidenceItem, RetrievedRow, RowRecord};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print one evidence item.
    pub fn evidence(item: &EvidenceItem) {
        let id = match &item.id {
            EvidenceId::Game(id) => id.to_string(),
            EvidenceId::Player(id) => id.clone(),
        };
        println!(
            "  {} {} {}",
            style("*").cyan(),
            style(&item.display_name).bold(),
            style(format!("({}:{})", item.table, id)).dim()
        );
    }

    /// Print one retrieved row with its score.
    pub fn retrieved_row(row: &RetrievedRow) {
        let score = match row.score {
            Some(score) => format!("score: {:.2}", score),
            None => "roster".to_string(),
        };
        let summary = match &row.record {
            RowRecord::Game(game) => EvidenceItem::from_game(game).display_name,
            RowRecord::Player(player) => EvidenceItem::from_player(player).display_name,
        };
        println!(
            "\n{} {} ({})",
            style(">>").green(),
            style(row.citation_key()).cyan(),
            score
        );
        println!("   {}", content_preview(&summary, 200));
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        format!("{}...", content.chars().take(max_chars).collect::<String>())
    }
}
