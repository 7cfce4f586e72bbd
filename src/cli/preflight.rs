//! Pre-flight checks before expensive operations.
//!
//! Validates that API keys and the stats database are in place before
//! starting operations that would otherwise fail midway.

use crate::config::Settings;
use crate::error::{CourtsideError, Result};
use crate::openai::Endpoint;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Ingestion only needs the CSV directory.
    Ingest,
    /// Backfill needs the embedding key and an ingested database.
    Embed,
    /// Search needs the embedding key and an ingested database.
    Search,
    /// Answering needs both keys and an ingested database.
    Ask,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    match operation {
        Operation::Ingest => {
            check_dir(settings)?;
        }
        Operation::Embed | Operation::Search => {
            check_api_key(&settings.embedding.endpoint())?;
            check_database(settings)?;
        }
        Operation::Ask => {
            check_api_key(&settings.embedding.endpoint())?;
            check_api_key(&settings.generation.endpoint())?;
            check_database(settings)?;
        }
    }
    Ok(())
}

/// Check that the key for an endpoint is set.
///
/// Local endpoints (localhost, 127.0.0.1) are accepted without a key.
pub fn check_api_key(endpoint: &Endpoint) -> Result<()> {
    let is_local = endpoint
        .api_base
        .as_deref()
        .is_some_and(|base| base.contains("localhost") || base.contains("127.0.0.1"));
    if is_local || endpoint.api_key().is_some() {
        return Ok(());
    }
    Err(CourtsideError::Config(format!(
        "{} not set. Set it with: export {}='...'",
        endpoint.api_key_env, endpoint.api_key_env
    )))
}

fn check_database(settings: &Settings) -> Result<()> {
    let path = settings.database_path();
    if path.exists() {
        Ok(())
    } else {
        Err(CourtsideError::Config(format!(
            "No database at {}. Run 'courtside ingest' first.",
            path.display()
        )))
    }
}

fn check_dir(settings: &Settings) -> Result<()> {
    let dir = settings.csv_dir();
    if dir.is_dir() {
        Ok(())
    } else {
        Err(CourtsideError::Config(format!(
            "Data directory {} does not exist",
            dir.display()
        )))
    }
}
