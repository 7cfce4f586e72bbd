//! Configuration settings for Courtside.

use crate::openai::Endpoint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub database: DatabaseSettings,
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub retrieval: RetrievalSettings,
    pub server: ServerSettings,
    pub batch: BatchSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.courtside".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Stats database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite database.
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "~/.courtside/stats.db".to_string(),
        }
    }
}

/// Source dataset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Directory holding `teams.csv`, `players.csv`, `game_details.csv` and
    /// `player_box_scores.csv`.
    pub csv_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            csv_dir: "./data".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions. Every stored vector must have this length.
    pub dimensions: u32,
    /// OpenAI-compatible API base (None for api.openai.com).
    pub api_base: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 768,
            api_base: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl EmbeddingSettings {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            api_base: self.api_base.clone(),
            api_key_env: self.api_key_env.clone(),
        }
    }
}

/// Answer generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Chat model for answer generation.
    pub model: String,
    /// OpenAI-compatible API base (None for api.openai.com).
    pub api_base: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Sampling temperature. Kept low for consistent structured output.
    pub temperature: f32,
    /// Maximum tokens in a generated answer.
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "llama3-8b-8192".to_string(),
            api_base: Some("https://api.groq.com/openai/v1".to_string()),
            api_key_env: "GROQ_API_KEY".to_string(),
            temperature: 0.3,
            max_tokens: 2048,
        }
    }
}

impl GenerationSettings {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            api_base: self.api_base.clone(),
            api_key_env: self.api_key_env.clone(),
        }
    }
}

/// Retrieval sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of nearest games to fetch.
    pub game_k: usize,
    /// Number of nearest player box scores to fetch (non-leader questions).
    pub player_k: usize,
    /// Number of top games whose full rosters are fetched for leader questions.
    pub leader_games: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            game_k: 5,
            player_k: 5,
            leader_games: 2,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:4200".to_string()],
        }
    }
}

/// Offline batch Q&A file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// JSON array of `{"question": ...}` entries.
    pub questions_path: String,
    /// JSON array of `{"result": {...}}` schema entries, parallel to the questions.
    pub template_path: String,
    /// Where answers are written.
    pub answers_path: String,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            questions_path: "./part1/questions.json".to_string(),
            template_path: "./part1/answers_template.json".to_string(),
            answers_path: "./part1/answers.json".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment overrides are applied on top of the file.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Apply `COURTSIDE_DB`, `EMBED_MODEL` and `LLM_MODEL` overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(path) = lookup("COURTSIDE_DB") {
            self.database.path = path;
        }
        if let Some(model) = lookup("EMBED_MODEL") {
            self.embedding.model = model;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.generation.model = model;
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::CourtsideError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("courtside")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn database_path(&self) -> PathBuf {
        Self::expand_path(&self.database.path)
    }

    /// Get the expanded CSV directory.
    pub fn csv_dir(&self) -> PathBuf {
        Self::expand_path(&self.data.csv_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [retrieval]
            game_k = 3

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(settings.retrieval.game_k, 3);
        assert_eq!(settings.retrieval.leader_games, 2);
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.allowed_origins, vec!["http://localhost:4200"]);
        assert_eq!(settings.generation.api_key_env, "GROQ_API_KEY");
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| match key {
            "COURTSIDE_DB" => Some("/tmp/nba.db".to_string()),
            "LLM_MODEL" => Some("llama3-70b-8192".to_string()),
            "EMBED_MODEL" => Some(String::new()),
            _ => None,
        });

        assert_eq!(settings.database.path, "/tmp/nba.db");
        assert_eq!(settings.generation.model, "llama3-70b-8192");
        // Empty values are ignored.
        assert_eq!(settings.embedding.model, "text-embedding-3-small");
    }
}
