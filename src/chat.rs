//! Retrieval-grounded chat responder.
//!
//! A question is answered only from indexed document chunks: the message is
//! embedded, the top matches retrieved, and anything below the confidence
//! threshold discarded. If nothing confident remains, a fixed fallback is
//! returned and the completion model is never called, so the assistant can
//! never answer from its own priors.

use std::sync::Arc;

use crate::completion::ChatModel;
use crate::config::ChatConfig;
use crate::embedding::EmbeddingClient;
use crate::error::ChatError;
use crate::index::VectorIndex;
use crate::models::{ChatMessage, ChatReply, ChatSource};

/// Reply used when no indexed chunk clears the confidence threshold.
pub const FALLBACK_RESPONSE: &str = "I don't have information about that topic in the \
documents I've been given. Please ask about something covered in the uploaded materials, \
or contact your counselor directly.";

const SYSTEM_INSTRUCTION: &str = "You are an assistant for a college counseling service. \
Answer the student's question using ONLY the reference material below. If the material \
does not contain the answer, say you don't have that information. Never invent facts, \
policies, dates, or deadlines that are not in the reference material.";

pub struct ChatResponder {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    model: Arc<dyn ChatModel>,
    top_k: usize,
    score_threshold: f32,
    history_window: usize,
}

impl ChatResponder {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn ChatModel>,
        config: &ChatConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            model,
            top_k: config.top_k,
            score_threshold: config.score_threshold,
            history_window: config.history_window,
        }
    }

    /// Answer `message` grounded in indexed chunks, carrying forward the most
    /// recent turns of `history`.
    pub async fn answer(
        &self,
        message: &str,
        history: &[ChatMessage],
    ) -> Result<ChatReply, ChatError> {
        let query_vector = self.embedder.embed(message).await?;
        let matches = self.index.query(&query_vector, self.top_k).await?;

        let confident: Vec<_> = matches
            .into_iter()
            .filter(|m| m.score > self.score_threshold)
            .collect();

        if confident.is_empty() {
            tracing::debug!("no matches above threshold, returning fallback");
            return Ok(ChatReply {
                response: FALLBACK_RESPONSE.to_string(),
                sources: Vec::new(),
            });
        }

        let grounding = confident
            .iter()
            .map(|m| m.metadata.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let system = format!("{}\n\nReference material:\n\n{}", SYSTEM_INSTRUCTION, grounding);

        let start = history.len().saturating_sub(self.history_window);
        let mut messages: Vec<ChatMessage> = history[start..].to_vec();
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: message.to_string(),
        });

        let response = self.model.complete(&system, &messages).await?;

        let sources = confident
            .iter()
            .map(|m| ChatSource {
                filename: m.metadata.filename.clone(),
                chunk_index: m.metadata.chunk_index,
                score: m.score,
            })
            .collect();

        Ok(ChatReply { response, sources })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::MockChat;
    use crate::embedding::MockEmbeddings;
    use crate::index::MemoryIndex;
    use crate::models::{chunk_vector_id, ChunkMetadata, VectorRecord};
    use chrono::Utc;

    fn responder(
        index: Arc<MemoryIndex>,
        model: Arc<MockChat>,
    ) -> ChatResponder {
        ChatResponder::new(
            Arc::new(MockEmbeddings::new(128)),
            index,
            model,
            &ChatConfig::default(),
        )
    }

    async fn seed(index: &MemoryIndex, doc: &str, chunk_index: i64, text: &str) {
        let embedder = MockEmbeddings::new(128);
        use crate::embedding::EmbeddingClient;
        let vector = embedder.embed(text).await.unwrap();
        index
            .upsert(vec![VectorRecord {
                id: chunk_vector_id(doc, chunk_index),
                vector,
                metadata: ChunkMetadata {
                    document_id: doc.to_string(),
                    chunk_index,
                    text: text.to_string(),
                    filename: "handbook.txt".to_string(),
                    uploaded_at: Utc::now(),
                },
            }])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_index_yields_fallback_without_model_call() {
        let index = Arc::new(MemoryIndex::new());
        let model = Arc::new(MockChat::new("should never appear"));
        let responder = responder(index, model.clone());

        let reply = responder.answer("what is the homework policy?", &[]).await.unwrap();
        assert_eq!(reply.response, FALLBACK_RESPONSE);
        assert!(reply.sources.is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn confident_match_is_answered_with_sources() {
        let index = Arc::new(MemoryIndex::new());
        // An identical text scores cosine 1.0 against its own embedding,
        // comfortably above the 0.7 threshold.
        seed(&index, "doc1", 2, "the homework policy is two hours per night").await;

        let model = Arc::new(MockChat::new("Two hours per night."));
        let responder = responder(index, model.clone());

        let reply = responder
            .answer("the homework policy is two hours per night", &[])
            .await
            .unwrap();
        assert_eq!(reply.response, "Two hours per night.");
        assert_eq!(model.call_count(), 1);
        assert_eq!(reply.sources.len(), 1);
        assert_eq!(reply.sources[0].filename, "handbook.txt");
        assert_eq!(reply.sources[0].chunk_index, 2);
        assert!(reply.sources[0].score > 0.7);
    }

    #[tokio::test]
    async fn unrelated_match_below_threshold_falls_back() {
        let index = Arc::new(MemoryIndex::new());
        seed(&index, "doc1", 0, "campus visits run every saturday in october").await;

        let model = Arc::new(MockChat::new("should never appear"));
        let responder = responder(index, model.clone());

        // No shared tokens, so the mock embedder scores this near zero.
        let reply = responder.answer("zygote mitochondria", &[]).await.unwrap();
        assert_eq!(reply.response, FALLBACK_RESPONSE);
        assert!(reply.sources.is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn history_is_truncated_to_window() {
        let index = Arc::new(MemoryIndex::new());
        seed(&index, "doc1", 0, "essay deadlines fall in early january").await;

        let model = Arc::new(MockChat::new("January."));
        let responder = responder(index, model);

        let history: Vec<ChatMessage> = (0..20)
            .map(|i| ChatMessage {
                role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
                content: format!("turn {}", i),
            })
            .collect();

        // The window math itself: 20 turns against a window of 6 keeps
        // exactly the last 6.
        let start = history.len().saturating_sub(ChatConfig::default().history_window);
        assert_eq!(history[start..].len(), 6);
        assert_eq!(history[start], history[14]);

        let reply = responder
            .answer("essay deadlines fall in early january", &history)
            .await
            .unwrap();
        assert_eq!(reply.response, "January.");
    }
}
