//! Document ingestion pipeline and the in-process job queue.
//!
//! One run takes a stored upload through extract → chunk → embed → upsert and
//! then flips the registry record to `ready`. Embeddings for every chunk are
//! buffered before the first upsert, so a mid-document embedding failure
//! leaves zero vectors in the index; the upserts themselves are batched to
//! respect upstream request-size limits. Any failure at any step marks the
//! document `error` with the failure message.
//!
//! Upload handlers hand jobs to [`IngestQueue`] and return immediately;
//! callers observe progress through the document's `status`.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, IngestConfig};
use crate::embedding::EmbeddingClient;
use crate::error::IngestError;
use crate::extract::extract_text;
use crate::index::VectorIndex;
use crate::models::{chunk_vector_id, ChunkMetadata, Document, VectorRecord};
use crate::registry::DocumentRegistry;
use crate::storage::FileStore;

#[derive(Clone)]
pub struct Ingestor {
    registry: DocumentRegistry,
    store: FileStore,
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    chunking: ChunkingConfig,
    upsert_batch_size: usize,
}

impl Ingestor {
    pub fn new(
        registry: DocumentRegistry,
        store: FileStore,
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        chunking: ChunkingConfig,
        ingest: &IngestConfig,
    ) -> Self {
        Self {
            registry,
            store,
            embedder,
            index,
            chunking,
            upsert_batch_size: ingest.upsert_batch_size,
        }
    }

    /// Run the full pipeline for one document and record the outcome.
    ///
    /// The returned error is also stored as the document's `error_message`;
    /// callers that only care about the status can ignore it.
    pub async fn ingest(&self, doc: &Document) -> Result<i64, IngestError> {
        match self.ingest_inner(doc).await {
            Ok(chunk_count) => {
                if let Err(e) = self.registry.mark_ready(&doc.id, chunk_count).await {
                    tracing::error!(document_id = %doc.id, error = %e, "failed to mark document ready");
                }
                tracing::info!(document_id = %doc.id, chunks = chunk_count, "document ingested");
                Ok(chunk_count)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(document_id = %doc.id, error = %message, "ingestion failed");
                if let Err(mark_err) = self.registry.mark_error(&doc.id, &message).await {
                    tracing::error!(document_id = %doc.id, error = %mark_err, "failed to mark document errored");
                }
                Err(e)
            }
        }
    }

    async fn ingest_inner(&self, doc: &Document) -> Result<i64, IngestError> {
        let bytes = self.store.read(Path::new(&doc.storage_location))?;
        let text = extract_text(&bytes, &doc.filename)?;

        let chunks = chunk_text(
            &text,
            self.chunking.target_size,
            self.chunking.overlap,
            self.chunking.min_chunk_len,
        );

        // Embed everything before touching the index. A failure here must
        // leave zero vectors behind for this document.
        let mut records = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let vector = self.embedder.embed(chunk).await?;
            let chunk_index = i as i64;
            records.push(VectorRecord {
                id: chunk_vector_id(&doc.id, chunk_index),
                vector,
                metadata: ChunkMetadata {
                    document_id: doc.id.clone(),
                    chunk_index,
                    text: chunk.clone(),
                    filename: doc.filename.clone(),
                    uploaded_at: doc.uploaded_at,
                },
            });
        }

        let chunk_count = records.len() as i64;
        for batch in records.chunks(self.upsert_batch_size) {
            self.index.upsert(batch.to_vec()).await?;
        }

        Ok(chunk_count)
    }

    /// Delete a document: raw file first, then its vectors, registry record
    /// last. The vector sweep is best-effort; a failed index delete is logged
    /// and the record still goes away, leaving at worst orphaned vectors
    /// that no longer resolve to a document.
    pub async fn delete_document(&self, doc: &Document) -> Result<(), IngestError> {
        self.store.delete(Path::new(&doc.storage_location))?;

        let ids: Vec<String> = (0..doc.chunk_count)
            .map(|i| chunk_vector_id(&doc.id, i))
            .collect();
        if let Err(e) = self.index.delete(&ids).await {
            tracing::warn!(document_id = %doc.id, error = %e, "vector cleanup failed during delete");
        }

        self.registry.delete(&doc.id).await?;
        Ok(())
    }
}

/// An ingestion request waiting for the worker.
pub struct IngestJob {
    pub document: Document,
}

/// Bounded fire-and-forget queue in front of the pipeline.
///
/// The worker pulls jobs off the channel and runs each in its own task, so a
/// slow PDF does not head-of-line-block the next upload. Restarting the
/// process loses queued and in-flight jobs; their documents stay `processing`
/// until re-uploaded.
#[derive(Clone)]
pub struct IngestQueue {
    tx: mpsc::Sender<IngestJob>,
}

impl IngestQueue {
    pub fn start(ingestor: Ingestor, depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<IngestJob>(depth.max(1));

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let ingestor = ingestor.clone();
                tokio::spawn(async move {
                    let _ = ingestor.ingest(&job.document).await;
                });
            }
        });

        Self { tx }
    }

    /// Hand a document to the background worker. Fails only if the queue is
    /// full or the worker is gone; the caller should surface that as a
    /// processing error rather than retry.
    pub fn enqueue(&self, document: Document) -> Result<(), IngestJob> {
        self.tx
            .try_send(IngestJob { document })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(job) => job,
                mpsc::error::TrySendError::Closed(job) => job,
            })
    }
}
