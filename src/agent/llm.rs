//! Blocking client for an OpenAI-compatible chat completions API.

use crate::config::AgentConfig;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

/// Stop sequence that keeps the model from inventing tool output.
pub const OBSERVATION_STOP: &str = "\nObservation:";

/// One message in a completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// "system", "user" or "assistant".
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// A user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Something that turns a conversation into the next assistant message.
pub trait ChatModel {
    /// Complete `messages`, stopping before any of `stop`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Agent` if the model cannot produce a reply.
    fn complete(&self, messages: &[ChatMessage], stop: &[&str]) -> Result<String>;
}

/// Hosted model reached over HTTP.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    /// Build a client from configuration and an API key.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the HTTP client cannot be built.
    pub fn new(config: &AgentConfig, api_key: String) -> Result<Self> {
        // Model calls may run for minutes; only bound the connect phase.
        let http = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    /// Model name sent with each request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatModel for LlmClient {
    fn complete(&self, messages: &[ChatMessage], stop: &[&str]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0,
            "stop": stop,
        });

        debug!(model = %self.model, messages = messages.len(), "calling chat completions");
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| Error::Agent(format!("LLM API call failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::Agent(format!("LLM API error ({status}): {error_text}")));
        }

        let response_json: Value = response
            .json()
            .map_err(|e| Error::Agent(format!("Failed to parse LLM response: {e}")))?;

        extract_content(&response_json)
    }
}

/// Pull the first choice's message text out of a completion response.
///
/// # Errors
///
/// Returns `Error::Agent` for API error objects, missing choices, content
/// filtering, or empty content.
pub fn extract_content(response: &Value) -> Result<String> {
    if let Some(error) = response.get("error") {
        return Err(Error::Agent(format!("LLM API error: {error}")));
    }

    let choice = response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .ok_or_else(|| Error::Agent("No choices in LLM response".to_string()))?;

    match choice.get("finish_reason").and_then(Value::as_str) {
        Some("content_filter") => {
            return Err(Error::Agent(
                "LLM response was filtered by content policy".to_string(),
            ));
        }
        Some("length") => warn!("LLM response was truncated due to length limit"),
        _ => {}
    }

    let content = choice["message"]["content"]
        .as_str()
        .unwrap_or_default()
        .trim();
    if content.is_empty() {
        return Err(Error::Agent("Empty content in LLM response".to_string()));
    }
    Ok(content.to_string())
}
