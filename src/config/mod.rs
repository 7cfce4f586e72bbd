//! Configuration module for Courtside.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, Prompts};
pub use settings::{
    BatchSettings, DataSettings, DatabaseSettings, EmbeddingSettings, GeneralSettings,
    GenerationSettings, PromptSettings, RetrievalSettings, ServerSettings, Settings,
};
