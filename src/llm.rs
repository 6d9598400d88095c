//! Chat completion provider abstraction.
//!
//! The [`ChatModel`] trait is the conversation engine's only view of the
//! LLM: a system prompt plus an ordered message list in, a completion out.
//! A single failed attempt is not retried — the engine converts failures
//! into user-facing fallback text, so a chat response is always produced.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

/// One message in a conversation window, oldest first when in sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for chat completion backends.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request a completion for `system` + `messages`.
    ///
    /// Returns `Ok(None)` when the provider answered but produced no
    /// content; the caller decides what an empty completion means.
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<Option<String>>;
}

/// Chat backend using the OpenAI `POST /v1/chat/completions` endpoint.
///
/// Temperature and output-token budget come from configuration (low
/// temperature by default, favoring faithfulness over creativity). The
/// request timeout is the only defense against a stalled provider.
pub struct OpenAiChat {
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.timeout_secs,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, messages: &[ChatMessage]) -> Result<Option<String>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let mut api_messages = Vec::with_capacity(messages.len() + 1);
        api_messages.push(serde_json::json!({"role": "system", "content": system}));
        for msg in messages {
            api_messages.push(serde_json::json!({"role": msg.role, "content": msg.content}));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": api_messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let content = json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.to_string());

        Ok(content.filter(|s| !s.is_empty()))
    }
}
