//! Error taxonomy for the ingestion and chat pipeline.
//!
//! Nothing in the core retries: ingestion failures are captured as a terminal
//! `error` status on the document record, and chat failures surface as a
//! single generic error to the caller.

use thiserror::Error;

/// Text extraction failure.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file extension is not on the supported allow-list.
    #[error("unsupported file format: .{0}")]
    UnsupportedFormat(String),
    /// A format-specific parser failed (corrupt file, password-protected, …).
    #[error("text extraction failed: {0}")]
    Extraction(String),
}

/// Embedding service failure (network or API error). Single attempt, no retry.
#[derive(Debug, Error)]
#[error("embedding service error: {0}")]
pub struct EmbedError(pub String);

/// Vector index failure (upsert, query, or delete).
#[derive(Debug, Error)]
#[error("vector index error: {0}")]
pub struct IndexError(pub String);

/// Chat completion API failure.
#[derive(Debug, Error)]
#[error("chat completion error: {0}")]
pub struct CompletionError(pub String);

/// Document registry failure.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("registry error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Any failure inside one ingestion run. The display string becomes the
/// document's stored `error_message`.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    Extract(#[from] ExtractError),
    #[error("{0}")]
    Embed(#[from] EmbedError),
    #[error("{0}")]
    Index(#[from] IndexError),
    #[error("could not read stored file: {0}")]
    Storage(#[from] std::io::Error),
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

/// Chat-path failure surfaced to the caller as one generic message.
#[derive(Debug, Error)]
#[error("failed to process chat message: {0}")]
pub struct ChatError(pub String);

impl From<EmbedError> for ChatError {
    fn from(e: EmbedError) -> Self {
        ChatError(e.to_string())
    }
}

impl From<IndexError> for ChatError {
    fn from(e: IndexError) -> Self {
        ChatError(e.to_string())
    }
}

impl From<CompletionError> for ChatError {
    fn from(e: CompletionError) -> Self {
        ChatError(e.to_string())
    }
}
