//! Wiring: builds every backend from configuration once, shared by the HTTP
//! server and the CLI commands.

use anyhow::Result;
use std::sync::Arc;

use crate::chat::ChatResponder;
use crate::completion::create_chat_model;
use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, EmbeddingClient};
use crate::index::{create_index, VectorIndex};
use crate::ingest::Ingestor;
use crate::migrate;
use crate::registry::DocumentRegistry;
use crate::storage::FileStore;

#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub registry: DocumentRegistry,
    pub store: FileStore,
    pub embedder: Arc<dyn EmbeddingClient>,
    pub index: Arc<dyn VectorIndex>,
    pub ingestor: Ingestor,
    pub responder: Arc<ChatResponder>,
}

impl Services {
    /// Connect the database (running migrations), the upload store, and the
    /// configured embedding, index, and chat backends.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.registry.db_path).await?;
        migrate::run_migrations(&pool).await?;
        let registry = DocumentRegistry::new(pool);

        let store = FileStore::new(config.storage.upload_dir.clone())?;
        let embedder = create_embedder(&config.embedding)?;
        let index = create_index(&config.index)?;
        let chat_model = create_chat_model(&config.chat)?;

        let ingestor = Ingestor::new(
            registry.clone(),
            store.clone(),
            embedder.clone(),
            index.clone(),
            config.chunking.clone(),
            &config.ingest,
        );

        let responder = Arc::new(ChatResponder::new(
            embedder.clone(),
            index.clone(),
            chat_model,
            &config.chat,
        ));

        Ok(Self {
            config: Arc::new(config.clone()),
            registry,
            store,
            embedder,
            index,
            ingestor,
            responder,
        })
    }
}
