//! Doctor command - verify configuration, data and embedding coverage.

use crate::cli::Output;
use crate::config::Settings;
use crate::ingest::{BOX_SCORES_FILE, GAMES_FILE, PLAYERS_FILE, TEAMS_FILE};
use crate::openai::Endpoint;
use crate::vector_store::{SqliteStatsStore, StatsStore, StoreStats};
use console::style;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, section: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in section {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("Courtside Doctor");
    println!();
    println!("Checking configuration, data and embeddings...\n");

    let mut checks = Vec::new();

    let api = vec![
        check_api_key("Embedding key", &settings.embedding.endpoint()),
        check_api_key("Generation key", &settings.generation.endpoint()),
    ];
    print_section("API Configuration", &api);
    checks.extend(api);

    let files = check_csv_dir(settings);
    print_section("Source Data", &files);
    checks.extend(files);

    let database = check_database(settings).await;
    print_section("Database", &database);
    checks.extend(database);

    let config = vec![check_config_file()];
    print_section("Configuration", &config);
    checks.extend(config);

    // Summary
    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Courtside.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Courtside is ready to use.");
    }

    Ok(())
}

/// Check that an endpoint's API key is present.
fn check_api_key(name: &str, endpoint: &Endpoint) -> CheckResult {
    let base = endpoint.api_base.as_deref().unwrap_or("https://api.openai.com/v1");
    match endpoint.api_key() {
        Some(key) => CheckResult::ok(
            name,
            &format!("{} configured ({}) for {}", endpoint.api_key_env, mask_key(&key), base),
        ),
        None if base.contains("localhost") || base.contains("127.0.0.1") => CheckResult::ok(
            name,
            &format!("{} not set (local endpoint {})", endpoint.api_key_env, base),
        ),
        None => CheckResult::error(
            name,
            &format!("{} not set", endpoint.api_key_env),
            &format!("Set with: export {}='...'", endpoint.api_key_env),
        ),
    }
}

/// Show the first and last four characters of a key.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "****".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Check that the CSV directory holds every input file.
fn check_csv_dir(settings: &Settings) -> Vec<CheckResult> {
    let dir = settings.csv_dir();
    if !dir.is_dir() {
        return vec![CheckResult::warning(
            "CSV directory",
            &format!("{} not found", dir.display()),
            "Set data.csv_dir in the config or pass --data-dir to 'courtside ingest'",
        )];
    }

    [TEAMS_FILE, PLAYERS_FILE, GAMES_FILE, BOX_SCORES_FILE]
        .iter()
        .map(|file| {
            let path = dir.join(file);
            match std::fs::metadata(&path) {
                Ok(meta) => CheckResult::ok(file, &format!("{} ({})", path.display(), format_size(meta.len()))),
                Err(_) => CheckResult::warning(file, "missing", &format!("Expected at {}", path.display())),
            }
        })
        .collect()
}

/// Check the database file, table counts and embedding coverage.
async fn check_database(settings: &Settings) -> Vec<CheckResult> {
    let db_path = settings.database_path();
    if !db_path.exists() {
        return vec![CheckResult::error(
            "Database",
            &format!("{} (not created yet)", db_path.display()),
            "Run: courtside ingest",
        )];
    }

    let size = std::fs::metadata(&db_path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "unknown size".to_string());
    let mut results = vec![CheckResult::ok("Database", &format!("{} ({})", db_path.display(), size))];

    let stats = match SqliteStatsStore::new(&db_path) {
        Ok(store) => store.stats().await,
        Err(e) => Err(e),
    };
    match stats {
        Ok(stats) => results.extend(coverage_checks(&stats)),
        Err(e) => results.push(CheckResult::error("Tables", &e.to_string(), "Re-run: courtside ingest")),
    }

    results
}

fn coverage_checks(stats: &StoreStats) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if stats.teams == 0 || stats.players == 0 || stats.games == 0 || stats.box_scores == 0 {
        results.push(CheckResult::error(
            "Tables",
            &format!(
                "{} teams, {} players, {} games, {} box scores",
                stats.teams, stats.players, stats.games, stats.box_scores
            ),
            "Run: courtside ingest",
        ));
        return results;
    }
    results.push(CheckResult::ok(
        "Tables",
        &format!(
            "{} teams, {} players, {} games, {} box scores",
            stats.teams, stats.players, stats.games, stats.box_scores
        ),
    ));

    for (name, embedded, total) in [
        ("Game embeddings", stats.games_embedded, stats.games),
        ("Box score embeddings", stats.box_scores_embedded, stats.box_scores),
    ] {
        let message = format!("{}/{} rows ({:.0}%)", embedded, total, percent(embedded, total));
        if embedded == total {
            results.push(CheckResult::ok(name, &message));
        } else {
            results.push(CheckResult::warning(name, &message, "Run: courtside embed"));
        }
    }

    results
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning("Config file", "using defaults", "Create with: courtside config init")
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
