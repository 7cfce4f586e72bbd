//! Answer generation through an OpenAI-compatible chat endpoint.

use crate::error::{CourtsideError, Result};
use crate::openai::{create_client, Endpoint};
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Returned in place of an answer when the model cannot be reached.
pub const APOLOGY: &str = "Sorry, I wasn't able to generate an answer right now. Please try again.";

/// Trait for text generation from a fully rendered prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Chat-completion generator (OpenAI, Groq, or any compatible server).
pub struct OpenAIGenerator {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAIGenerator {
    pub fn new(model: &str, endpoint: &Endpoint, system_prompt: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(endpoint)?,
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            temperature: 0.3,
            max_tokens: 2048,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(self.system_prompt.clone())
                .build()
                .map_err(|e| CourtsideError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| CourtsideError::Generation(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens)
            .build()
            .map_err(|e| CourtsideError::Generation(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CourtsideError::OpenAI(format!("Failed to generate response: {}", e)))?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| CourtsideError::Generation("Empty response from LLM".to_string()))?
            .trim()
            .to_string();

        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_creation() {
        let endpoint = Endpoint {
            api_base: Some("https://api.groq.com/openai/v1".to_string()),
            api_key_env: "COURTSIDE_TEST_UNSET_KEY".to_string(),
        };
        let generator = OpenAIGenerator::new("llama3-8b-8192", &endpoint, "system")
            .unwrap()
            .with_temperature(0.0)
            .with_max_tokens(256);
        assert_eq!(generator.model(), "llama3-8b-8192");
        assert_eq!(generator.max_tokens, 256);
    }
}
