//! Reasoning-component boundary.
//!
//! The orchestrator treats the model as a black-box text-in/text-out function.
//! No structural guarantee is placed on the returned text; every call site
//! parses defensively and supplies a fallback (see `stages::*`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{MenderError, Result};

/// Environment variable holding the API key for the default HTTP reasoner.
pub const API_KEY_ENV: &str = "MENDER_API_KEY";

/// A black-box text generator: system instructions + user context in,
/// free text out.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Generate a completion for the given instruction pair.
    async fn generate(&self, system: &str, user: &str) -> Result<String>;
}

/// Configuration for the chat-completions reasoner.
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    /// OpenAI-compatible chat-completions endpoint.
    pub base_url: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Per-request wall-clock timeout.
    pub timeout: Duration,

    /// Completion token cap.
    pub max_tokens: u32,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "google/gemini-2.0-flash-001".to_string(),
            timeout: Duration::from_secs(120),
            max_tokens: 8192,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Chat-completions client over an OpenAI-compatible endpoint.
pub struct HttpReasoner {
    client: reqwest::Client,
    config: ReasonerConfig,
    api_key: String,
}

impl HttpReasoner {
    /// Build a reasoner from config plus an explicit API key.
    pub fn new(config: ReasonerConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MenderError::Reasoner(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    /// Build a reasoner reading the API key from [`API_KEY_ENV`].
    pub fn from_env(config: ReasonerConfig) -> Result<Self> {
        let key = std::env::var(API_KEY_ENV)
            .map_err(|_| MenderError::Reasoner(format!("{API_KEY_ENV} is not set")))?;
        Self::new(config, key)
    }
}

#[async_trait]
impl Reasoner for HttpReasoner {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.config.max_tokens,
            stream: false,
        };

        let resp = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| MenderError::Reasoner(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(MenderError::Reasoner(format!(
                "endpoint returned {status}: {snippet}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| MenderError::Reasoner(format!("malformed response envelope: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| MenderError::Reasoner("response contained no choices".to_string()))
    }
}
