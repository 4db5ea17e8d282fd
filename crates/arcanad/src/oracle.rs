//! Interpretation oracle - the external text-generation collaborator.
//!
//! The daemon only ever talks to it through the `Oracle` trait, so tests can
//! swap in fixed or failing implementations.

use crate::prompts;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Http(String),

    #[error("oracle timed out after {0} seconds")]
    Timeout(u64),

    #[error("oracle returned a malformed response: {0}")]
    Malformed(String),

    #[error("oracle returned an empty interpretation")]
    Empty,
}

/// Oracle configuration, OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    // Ollama's OpenAI-compatible surface
    "http://127.0.0.1:11434/v1".to_string()
}

fn default_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

#[async_trait]
pub trait Oracle: Send + Sync {
    /// Generate interpretation prose for a drawn card.
    async fn interpret(
        &self,
        card_name: &str,
        question: &str,
        reflection: &str,
    ) -> Result<String, OracleError>;
}

/// HTTP oracle speaking the OpenAI chat-completions dialect.
pub struct HttpOracle {
    config: OracleConfig,
    client: reqwest::Client,
}

impl HttpOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OracleError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }
}

/// Build the user prompt, substituting placeholders for empty fields so the
/// interpret phase has a single code path.
pub fn user_prompt(card_name: &str, question: &str, reflection: &str) -> String {
    let question = if question.trim().is_empty() {
        prompts::NO_QUESTION
    } else {
        question
    };
    let reflection = if reflection.trim().is_empty() {
        prompts::NO_REFLECTION
    } else {
        reflection
    };

    format!(
        "The card drawn is: {card_name}\n\n\
         Question/Context: {question}\n\
         Querent's reflection: {reflection}\n\n\
         Provide an interpretation for {card_name}, incorporating any insights shared."
    )
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn interpret(
        &self,
        card_name: &str,
        question: &str,
        reflection: &str,
    ) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": prompts::TAROT_READER_PROMPT },
                { "role": "user", "content": user_prompt(card_name, question, reflection) },
            ],
            "max_tokens": 400,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout(self.config.timeout_secs)
            } else {
                OracleError::Http(format!("request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(OracleError::Http(format!(
                "HTTP {} from oracle",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("failed to parse response: {e}")))?;

        let text = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| OracleError::Malformed("no completion in response".to_string()))?
            .trim()
            .to_string();

        if text.is_empty() {
            return Err(OracleError::Empty);
        }

        Ok(text)
    }
}
