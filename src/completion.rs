//! Chat completion provider abstraction.
//!
//! One trait, two backends: the OpenAI chat completions API for production
//! and a scripted mock for tests. Calls are single-attempt, with a low
//! temperature and a bounded response length taken from configuration.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::error::CompletionError;
use crate::models::ChatMessage;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate one assistant reply given a system prompt and the
    /// conversation so far.
    async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, CompletionError>;
}

/// Instantiate the configured chat completion backend.
pub fn create_chat_model(config: &ChatConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        "mock" => Ok(Arc::new(MockChat::new("This is a canned reply."))),
        other => bail!("Unknown chat provider: {}", other),
    }
}

// ============ OpenAI ============

/// Chat client for `POST /v1/chat/completions`.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiChat {
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(
        &self,
        system: &str,
        messages: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        let mut wire_messages = Vec::with_capacity(messages.len() + 1);
        wire_messages.push(serde_json::json!({ "role": "system", "content": system }));
        for m in messages {
            wire_messages.push(serde_json::json!({ "role": m.role, "content": m.content }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": wire_messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CompletionError(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CompletionError(e.to_string()))?;
        parse_completion(&json)
    }
}

/// Extract `choices[0].message.content` from a chat completions response.
fn parse_completion(json: &serde_json::Value) -> Result<String, CompletionError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| CompletionError("Invalid OpenAI response: missing content".to_string()))
}

// ============ Mock ============

/// Scripted chat backend returning a fixed reply and counting invocations.
pub struct MockChat {
    reply: String,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockChat {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of `complete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}
