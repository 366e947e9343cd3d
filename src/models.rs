//! Core data types flowing through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing state of an uploaded document.
///
/// Transitions only `Processing → Ready` or `Processing → Error`; terminal
/// states are never left except by deleting the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "processing" => Some(DocumentStatus::Processing),
            "ready" => Some(DocumentStatus::Ready),
            "error" => Some(DocumentStatus::Error),
            _ => None,
        }
    }
}

/// Registry record for one uploaded document.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    /// Original uploaded name, used for display and source attribution.
    pub filename: String,
    /// Path of the stored raw file.
    pub storage_location: String,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
    pub status: DocumentStatus,
    /// Number of chunks embedded and indexed; meaningful only when `Ready`.
    pub chunk_count: i64,
    /// Present only when `status = Error`.
    pub error_message: Option<String>,
}

/// Metadata denormalized into the vector index alongside each chunk vector,
/// so retrieval can display sources without a registry lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A staged vector ready for upsert into the index.
///
/// Identity is the composite `{document_id}-chunk-{chunk_index}`.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Composite vector id for a chunk of a document.
pub fn chunk_vector_id(document_id: &str, chunk_index: i64) -> String {
    format!("{}-chunk-{}", document_id, chunk_index)
}

/// A ranked match returned from a top-K similarity query.
#[derive(Debug, Clone)]
pub struct ChunkMatch {
    pub id: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// One turn of a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

/// Source attribution for a grounded chat answer.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSource {
    pub filename: String,
    pub chunk_index: i64,
    pub score: f32,
}

/// A grounded answer plus the matches that backed it.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub sources: Vec<ChatSource>,
}

/// An authenticated portal user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for s in [
            DocumentStatus::Processing,
            DocumentStatus::Ready,
            DocumentStatus::Error,
        ] {
            assert_eq!(DocumentStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(DocumentStatus::parse("done"), None);
    }

    #[test]
    fn vector_id_format() {
        assert_eq!(chunk_vector_id("doc1", 2), "doc1-chunk-2");
    }
}
