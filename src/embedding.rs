//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingClient`] trait and three backends:
//! - **[`OpenAiEmbeddings`]** — calls the OpenAI embeddings API.
//! - **[`OllamaEmbeddings`]** — calls a local Ollama instance's `/api/embed`.
//! - **[`MockEmbeddings`]** — deterministic token-hash vectors for tests and
//!   local development; identical texts always embed identically.
//!
//! Every call is a single attempt. A failure aborts the containing pipeline
//! step; the retry policy (none) belongs to the caller.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::EmbedError;

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// The model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed one text into a fixed-length vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Instantiate the configured embedding backend.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingClient>> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbeddings::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbeddings::new(config)?)),
        "mock" => Ok(Arc::new(MockEmbeddings::new(config.dims.unwrap_or(256)))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ OpenAI ============

/// Embedding client for the OpenAI `POST /v1/embeddings` endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAiEmbeddings {
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbedError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EmbedError(format!("OpenAI API error {}: {}", status, body_text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EmbedError(e.to_string()))?;
        parse_openai_embedding(&json)
    }
}

/// Extract the first `data[].embedding` array from an OpenAI response.
fn parse_openai_embedding(json: &serde_json::Value) -> Result<Vec<f32>, EmbedError> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| EmbedError("Invalid OpenAI response: missing embedding".to_string()))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ Ollama ============

/// Embedding client for a local Ollama instance (`POST /api/embed`).
pub struct OllamaEmbeddings {
    model: String,
    url: String,
    client: reqwest::Client,
}

impl OllamaEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { model, url, client })
    }
}

#[async_trait]
impl EmbeddingClient for OllamaEmbeddings {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(format!("{}/api/embed", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                EmbedError(format!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(EmbedError(format!("Ollama API error {}: {}", status, body_text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EmbedError(e.to_string()))?;
        parse_ollama_embedding(&json)
    }
}

fn parse_ollama_embedding(json: &serde_json::Value) -> Result<Vec<f32>, EmbedError> {
    let embedding = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .and_then(|e| e.as_array())
        .ok_or_else(|| EmbedError("Invalid Ollama response: missing embeddings".to_string()))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

// ============ Mock ============

/// Deterministic embedding backend: hashes each token into a bucket and
/// normalizes the histogram to unit length. Texts sharing words land near
/// each other; identical texts embed identically (cosine 1.0).
pub struct MockEmbeddings {
    dims: usize,
}

impl MockEmbeddings {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddings {
    fn model_name(&self) -> &str {
        "mock"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            v[(fnv1a(token.as_bytes()) % self.dims as u64) as usize] += 1.0;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_is_deterministic_and_unit_length() {
        let embedder = MockEmbeddings::new(128);
        let a = embedder.embed("essay deadlines and interviews").await.unwrap();
        let b = embedder.embed("essay deadlines and interviews").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);

        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn mock_identical_texts_have_cosine_one() {
        let embedder = MockEmbeddings::new(128);
        let a = embedder.embed("the homework policy is strict").await.unwrap();
        let b = embedder.embed("the homework policy is strict").await.unwrap();
        let dot: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!((dot - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn mock_empty_text_is_zero_vector() {
        let embedder = MockEmbeddings::new(64);
        let v = embedder.embed("").await.unwrap();
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn parse_openai_embedding_shape() {
        let json = serde_json::json!({
            "data": [ { "embedding": [0.25, -0.5, 1.0] } ]
        });
        assert_eq!(parse_openai_embedding(&json).unwrap(), vec![0.25, -0.5, 1.0]);

        let bad = serde_json::json!({ "data": [] });
        assert!(parse_openai_embedding(&bad).is_err());
    }

    #[test]
    fn parse_ollama_embedding_shape() {
        let json = serde_json::json!({ "embeddings": [[0.1, 0.2]] });
        assert_eq!(parse_ollama_embedding(&json).unwrap(), vec![0.1, 0.2]);
        assert!(parse_ollama_embedding(&serde_json::json!({})).is_err());
    }
}
