use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub registry: RegistryConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RegistryConfig {
    /// SQLite database holding users and document records.
    pub db_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory where uploaded raw files are kept.
    pub upload_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_target_size")]
    pub target_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_chunk_len")]
    pub min_chunk_len: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_size: default_target_size(),
            overlap: default_overlap(),
            min_chunk_len: default_min_chunk_len(),
        }
    }
}

fn default_target_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}
fn default_min_chunk_len() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"openai"`, `"ollama"`, or `"mock"` (deterministic, for tests/dev).
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (required meaningfully only for ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `"qdrant"` or `"memory"`.
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            url: default_qdrant_url(),
            collection: default_collection(),
        }
    }
}

fn default_index_provider() -> String {
    "memory".to_string()
}
fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_collection() -> String {
    "advisor_chunks".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    /// `"openai"` or `"mock"`.
    #[serde(default = "default_chat_provider")]
    pub provider: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_chat_provider(),
            model: default_chat_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            history_window: default_history_window(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_chat_provider() -> String {
    "openai".to_string()
}
fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    500
}
fn default_top_k() -> usize {
    5
}
fn default_score_threshold() -> f32 {
    0.7
}
fn default_history_window() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Secret key for signing session cookies.
    pub session_secret: String,
    /// Email domain whose users get the admin role.
    #[serde(default = "default_admin_domain")]
    pub admin_domain: String,
    #[serde(default = "default_session_ttl_days")]
    pub session_ttl_days: i64,
}

fn default_admin_domain() -> String {
    "dreamcollegepath.com".to_string()
}
fn default_session_ttl_days() -> i64 {
    14
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Vectors per upsert request, respecting upstream request-size limits.
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
    /// Depth of the in-process ingestion job queue.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            upsert_batch_size: default_upsert_batch_size(),
            queue_depth: default_queue_depth(),
        }
    }
}

fn default_upsert_batch_size() -> usize {
    100
}
fn default_queue_depth() -> usize {
    64
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.chunking.target_size == 0 {
        anyhow::bail!("chunking.target_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.target_size {
        anyhow::bail!("chunking.overlap must be < chunking.target_size");
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" | "mock" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai, ollama, or mock.",
            other
        ),
    }
    if config.embedding.provider != "mock" && config.embedding.model.is_none() {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }

    match config.index.provider.as_str() {
        "qdrant" | "memory" => {}
        other => anyhow::bail!(
            "Unknown index provider: '{}'. Must be qdrant or memory.",
            other
        ),
    }

    match config.chat.provider.as_str() {
        "openai" | "mock" => {}
        other => anyhow::bail!("Unknown chat provider: '{}'. Must be openai or mock.", other),
    }
    if config.chat.top_k == 0 {
        anyhow::bail!("chat.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.chat.score_threshold) {
        anyhow::bail!("chat.score_threshold must be in [0.0, 1.0]");
    }

    if config.auth.session_secret.len() < 16 {
        anyhow::bail!("auth.session_secret must be at least 16 characters");
    }

    if config.ingest.upsert_batch_size == 0 {
        anyhow::bail!("ingest.upsert_batch_size must be >= 1");
    }

    Ok(config)
}
