//! Vector index client abstraction and implementations.
//!
//! The index holds one vector per chunk, keyed by the composite id
//! `{document_id}-chunk-{chunk_index}`, with the chunk's text and source
//! metadata denormalized into the payload.
//!
//! - **[`QdrantIndex`]** — production backend against an external Qdrant
//!   instance. Qdrant point ids must be UUIDs, so the composite id is mapped
//!   to a deterministic UUIDv5 and the original id kept in the payload.
//! - **[`MemoryIndex`]** — in-process cosine-similarity store for tests and
//!   local development.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::{
    value::Kind, CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct,
    PointsIdsList, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use uuid::Uuid;

use crate::config::IndexConfig;
use crate::error::IndexError;
use crate::models::{ChunkMatch, ChunkMetadata, VectorRecord};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or overwrite vectors, idempotent by id.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), IndexError>;

    /// Top-K similarity query, ranked by descending score.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ChunkMatch>, IndexError>;

    /// Remove vectors by id. Missing ids are not an error.
    async fn delete(&self, ids: &[String]) -> Result<(), IndexError>;
}

/// Instantiate the configured vector index backend.
pub fn create_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "qdrant" => Ok(Arc::new(QdrantIndex::new(&config.url, &config.collection)?)),
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        other => bail!("Unknown index provider: {}", other),
    }
}

/// Cosine similarity between two vectors; `0.0` for mismatched or empty input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

// ============ Qdrant ============

pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    pub fn new(url: &str, collection: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build()?;
        Ok(Self {
            client,
            collection: collection.to_string(),
        })
    }

    /// Idempotent collection creation with cosine distance.
    async fn ensure_collection(&self, vector_size: u64) -> Result<(), IndexError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| IndexError(e.to_string()))?;
        if exists {
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(vector_size, Distance::Cosine)),
            )
            .await
            .map_err(|e| IndexError(e.to_string()))?;
        Ok(())
    }
}

/// Deterministic UUID for a composite chunk id, as required for Qdrant point ids.
fn point_uuid(chunk_id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, chunk_id.as_bytes()).to_string()
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), IndexError> {
        let Some(first) = records.first() else {
            return Ok(());
        };
        self.ensure_collection(first.vector.len() as u64).await?;

        let mut points = Vec::with_capacity(records.len());
        for record in records {
            let payload = serde_json::json!({
                "chunk_id": record.id,
                "document_id": record.metadata.document_id,
                "chunk_index": record.metadata.chunk_index,
                "text": record.metadata.text,
                "filename": record.metadata.filename,
                "uploaded_at": record.metadata.uploaded_at.to_rfc3339(),
            });
            let payload_map: HashMap<String, qdrant_client::qdrant::Value> =
                serde_json::from_value(payload).map_err(|e| IndexError(e.to_string()))?;
            points.push(PointStruct::new(
                point_uuid(&record.id),
                record.vector,
                payload_map,
            ));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points))
            .await
            .map_err(|e| IndexError(e.to_string()))?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ChunkMatch>, IndexError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| IndexError(e.to_string()))?;
        if !exists {
            return Ok(Vec::new());
        }

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection, vector.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| IndexError(e.to_string()))?;

        let mut matches = Vec::with_capacity(results.result.len());
        for point in results.result {
            let id = payload_str(&point.payload, "chunk_id").unwrap_or_default();
            let uploaded_at = payload_str(&point.payload, "uploaded_at")
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            matches.push(ChunkMatch {
                id,
                score: point.score,
                metadata: ChunkMetadata {
                    document_id: payload_str(&point.payload, "document_id").unwrap_or_default(),
                    chunk_index: payload_i64(&point.payload, "chunk_index").unwrap_or(0),
                    text: payload_str(&point.payload, "text").unwrap_or_default(),
                    filename: payload_str(&point.payload, "filename").unwrap_or_default(),
                    uploaded_at,
                },
            });
        }
        Ok(matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), IndexError> {
        if ids.is_empty() {
            return Ok(());
        }
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| IndexError(e.to_string()))?;
        if !exists {
            return Ok(());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(point_uuid(id))).collect();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection).points(PointsIdsList { ids: point_ids }),
            )
            .await
            .map_err(|e| IndexError(e.to_string()))?;
        Ok(())
    }
}

fn payload_str(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> Option<String> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::StringValue(s) => Some(s.clone()),
        _ => None,
    }
}

fn payload_i64(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> Option<i64> {
    match payload.get(key)?.kind.as_ref()? {
        Kind::IntegerValue(i) => Some(*i),
        Kind::DoubleValue(d) => Some(*d as i64),
        _ => None,
    }
}

// ============ Memory ============

/// In-process vector store with exact cosine scoring.
#[derive(Default)]
pub struct MemoryIndex {
    points: Mutex<HashMap<String, VectorRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored vectors (test helper).
    pub fn len(&self) -> usize {
        self.points.lock().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<(), IndexError> {
        let mut points = self.points.lock().map_err(|e| IndexError(e.to_string()))?;
        for record in records {
            points.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ChunkMatch>, IndexError> {
        let points = self.points.lock().map_err(|e| IndexError(e.to_string()))?;
        let mut matches: Vec<ChunkMatch> = points
            .values()
            .map(|record| ChunkMatch {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.vector),
                metadata: record.metadata.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), IndexError> {
        let mut points = self.points.lock().map_err(|e| IndexError(e.to_string()))?;
        for id in ids {
            points.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chunk_vector_id;

    fn record(doc: &str, index: i64, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: chunk_vector_id(doc, index),
            vector,
            metadata: ChunkMetadata {
                document_id: doc.to_string(),
                chunk_index: index,
                text: format!("chunk {} of {}", index, doc),
                filename: "handbook.txt".to_string(),
                uploaded_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn query_ranks_by_similarity_and_respects_top_k() {
        let index = MemoryIndex::new();
        index
            .upsert(vec![
                record("d1", 0, vec![1.0, 0.0, 0.0]),
                record("d1", 1, vec![0.0, 1.0, 0.0]),
                record("d1", 2, vec![0.9, 0.1, 0.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0, 0.0], 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "d1-chunk-0");
        assert_eq!(matches[1].id, "d1-chunk-2");
        assert!(matches[0].score >= matches[1].score);
    }

    #[tokio::test]
    async fn upsert_same_id_overwrites() {
        let index = MemoryIndex::new();
        index.upsert(vec![record("d1", 0, vec![1.0, 0.0])]).await.unwrap();
        index.upsert(vec![record("d1", 0, vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(index.len(), 1);

        let matches = index.query(&[0.0, 1.0], 1).await.unwrap();
        assert!((matches[0].score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn delete_is_idempotent_for_missing_ids() {
        let index = MemoryIndex::new();
        index.upsert(vec![record("d1", 0, vec![1.0])]).await.unwrap();
        index
            .delete(&["d1-chunk-0".to_string(), "d1-chunk-99".to_string()])
            .await
            .unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn cosine_basics() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn point_uuid_is_deterministic_and_distinct() {
        assert_eq!(point_uuid("d1-chunk-0"), point_uuid("d1-chunk-0"));
        assert_ne!(point_uuid("d1-chunk-0"), point_uuid("d1-chunk-1"));
    }
}
