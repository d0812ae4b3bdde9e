//! Outbound boundary to the text-completion provider.
//!
//! Agents draft code and documents through [`CompletionOracle`]. Failures at
//! this boundary are never fatal to an execution: callers fall back to
//! language-specific templates.

use crate::{config::CompletionConfig, constants::ANTHROPIC_API_VERSION, ForgeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[async_trait]
pub trait CompletionOracle: Send + Sync {
    /// Returns the raw completion text for the prompt.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// HTTP client for an Anthropic-compatible messages endpoint.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    config: CompletionConfig,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl CompletionOracle for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let api_key = self.config.api_key.as_deref().ok_or_else(|| {
            ForgeError::Completion("no completion api key configured".to_string())
        })?;

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!(model = %self.config.model, "sending completion request");

        let response = self
            .http
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(%status, "completion oracle returned an error status");
            return Err(ForgeError::Completion(format!(
                "completion request failed with status {status}"
            )));
        }

        let parsed: MessagesResponse = response.json().await?;
        let text: String = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(ForgeError::Completion(
                "completion oracle returned an empty response".to_string(),
            ));
        }
        Ok(text)
    }
}
