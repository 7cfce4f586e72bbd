//! Prompt templates for Courtside.
//!
//! Prompts can be customized by placing an `answer.toml` file in the custom
//! prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub answer: AnswerPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// Prompts for answer generation.
///
/// `chat_user` drives the HTTP/CLI question flow and asks for an inline
/// citation tag. `batch_user` drives the offline flow and asks for a JSON
/// object following a per-question schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    pub system: String,
    pub rules: String,
    pub chat_user: String,
    pub batch_user: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            system: "You are a helpful NBA statistics assistant.".to_string(),

            rules: r#"Rules:
- Only use the information provided in 'Context'. Do not use outside knowledge.
- If something cannot be determined from the context, answer null (do not guess).
- Holidays map to calendar dates: Christmas is December 25, New Year's Day is January 1, New Year's Eve is December 31, Halloween is October 31, Thanksgiving is the fourth Thursday of November, Martin Luther King Jr. Day is the third Monday of January.
- Player names may appear with or without accents (e.g. "Luka Doncic" and "Luka Dončić" are the same player). Match names ignoring accents.
- A season span like "2023-24" means the season that started in 2023.
- Always refer to teams by their full name (city and name, e.g. "Los Angeles Lakers"), never by abbreviation alone.
- Each context line starts with a citation key in square brackets, e.g. [game_details:22300634] or [player_box_scores:2544_22300634]."#
                .to_string(),

            chat_user: r#"{{rules}}

Answer the question in one or two sentences. After the answer, cite the single context line that best supports it using exactly this format:
|||EVIDENCE:<table>:<id>|||
For example: |||EVIDENCE:game_details:22300634||| or |||EVIDENCE:player_box_scores:2544_22300634|||

Context:
{{context}}

Q: {{question}}
A:"#
                .to_string(),

            batch_user: r#"Return ONLY a JSON object matching this schema (no extra keys, no prose):
{{schema}}

{{rules}}
If a field cannot be determined, set it to null.
Output must be valid JSON only. After the JSON object, cite the context line that supports it using exactly this format:
|||EVIDENCE:<table>:<id>|||

Context:
{{context}}

Q: {{question}}
A:"#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// Build the user prompt for a free-text question with a citation tag.
    pub fn chat_prompt(&self, question: &str, context: &str) -> String {
        let mut vars = std::collections::HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.to_string());
        vars.insert("rules".to_string(), self.answer.rules.clone());
        self.render_with_custom(&self.answer.chat_user, &vars)
    }

    /// Build the user prompt for a schema-constrained batch question.
    pub fn batch_prompt(&self, question: &str, context: &str, schema: &serde_json::Value) -> String {
        let mut vars = std::collections::HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), context.to_string());
        vars.insert("schema".to_string(), schema.to_string());
        vars.insert("rules".to_string(), self.answer.rules.clone());
        self.render_with_custom(&self.answer.batch_user, &vars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        assert!(!prompts.answer.system.is_empty());
        assert!(prompts.answer.chat_user.contains("{{context}}"));
        assert!(prompts.answer.batch_user.contains("{{schema}}"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = std::collections::HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_batch_prompt_embeds_schema_and_rules() {
        let prompts = Prompts::default();
        let schema = serde_json::json!({"winner": null, "score": null});
        let prompt = prompts.batch_prompt("Who won?", "[game_details:1] ...", &schema);

        assert!(prompt.contains(r#"{"score":null,"winner":null}"#) || prompt.contains(r#"{"winner":null,"score":null}"#));
        assert!(prompt.contains("Holidays map to calendar dates"));
        assert!(prompt.contains("Q: Who won?"));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_custom_variables_are_overridden_by_call_vars() {
        let mut custom = std::collections::HashMap::new();
        custom.insert("question".to_string(), "ignored".to_string());
        custom.insert("league".to_string(), "NBA".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = std::collections::HashMap::new();
        vars.insert("question".to_string(), "real".to_string());
        let rendered = prompts.render_with_custom("{{league}}: {{question}}", &vars);
        assert_eq!(rendered, "NBA: real");
    }
}
