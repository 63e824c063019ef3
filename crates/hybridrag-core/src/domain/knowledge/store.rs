//! Knowledge store: aggregate operations composed over the indexer and repository
//!
//! Every operation that loads, mutates and saves an aggregate holds that
//! aggregate's lock for the whole sequence, so concurrent writers sharing one
//! store cannot overwrite each other's changes. Index writes are not rolled
//! back; when the save after an index write fails the caller receives
//! [`Error::IndexAheadOfStore`].

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::domain::retrieval::{Embedder, Indexer, Metadata};
use crate::error::{Error, Result};

use super::entity::{Document, Embedding, Knowledge};
use super::repository::KnowledgeRepository;

/// Input for [`KnowledgeStore::bulk_index`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl DocumentInput {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Statistics about a knowledge base
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub knowledge_id: String,
    pub document_count: usize,
    pub embedding_count: usize,
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

/// Async mutex per key, created on first use
#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    async fn acquire(&self, key: String) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries nobody else holds or waits on can go
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// Manages knowledge bases for retrieval
pub struct KnowledgeStore {
    repository: Arc<dyn KnowledgeRepository>,
    indexer: Arc<Indexer>,
    embedder: Option<Arc<dyn Embedder>>,
    locks: KeyedLocks,
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("indexer", &self.indexer)
            .field("embedder", &self.embedder.is_some())
            .finish()
    }
}

impl KnowledgeStore {
    pub fn new(repository: Arc<dyn KnowledgeRepository>, indexer: Arc<Indexer>) -> Self {
        Self {
            repository,
            indexer,
            embedder: None,
            locks: KeyedLocks::default(),
        }
    }

    /// Embedder used by [`KnowledgeStore::embed_pending`]
    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    async fn lock_id(&self, knowledge_id: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(format!("id:{}", knowledge_id)).await
    }

    async fn load(&self, knowledge_id: &str) -> Result<Knowledge> {
        self.repository
            .find_by_id(knowledge_id)
            .await?
            .ok_or_else(|| Error::KnowledgeNotFound(knowledge_id.to_string()))
    }

    /// Save after the external index was written
    async fn save_after_index(&self, knowledge: &Knowledge) -> Result<()> {
        self.repository.save(knowledge).await.map_err(|e| {
            warn!(
                knowledge_id = %knowledge.id(),
                error = %e,
                "Index was updated but the knowledge base could not be saved"
            );
            Error::IndexAheadOfStore {
                knowledge_id: knowledge.id().to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Create a knowledge base with a unique name
    pub async fn add_knowledge(&self, name: &str, description: &str) -> Result<Knowledge> {
        let knowledge = Knowledge::new(name, description)?;

        let _guard = self.locks.acquire(format!("name:{}", name)).await;
        if self.repository.find_by_name(name).await?.is_some() {
            return Err(Error::KnowledgeAlreadyExists(name.to_string()));
        }

        self.repository.save(&knowledge).await?;
        info!(knowledge_id = %knowledge.id(), name, "Knowledge base created");

        Ok(knowledge)
    }

    /// Add a document, index its chunks, then persist the aggregate
    pub async fn add_document(&self, knowledge_id: &str, content: &str, metadata: Metadata) -> Result<Document> {
        let _guard = self.lock_id(knowledge_id).await;
        let mut knowledge = self.load(knowledge_id).await?;

        let document = knowledge.add_document(content, metadata)?;

        self.indexer
            .index_document(knowledge_id, &document.id, &document.content, &document.metadata)
            .await?;

        self.save_after_index(&knowledge).await?;
        debug!(knowledge_id, document_id = %document.id, "Document added");

        Ok(document)
    }

    /// Record an embedding for an existing document and update the vector index
    pub async fn add_embedding(
        &self,
        knowledge_id: &str,
        document_id: &str,
        vector: Vec<f32>,
        model: &str,
    ) -> Result<()> {
        let _guard = self.lock_id(knowledge_id).await;
        let mut knowledge = self.load(knowledge_id).await?;

        knowledge.add_embedding(document_id, vector.clone(), model)?;

        self.indexer
            .update_vector_index(knowledge_id, document_id, &vector)
            .await?;

        self.save_after_index(&knowledge).await?;
        debug!(knowledge_id, document_id, dimension = vector.len(), "Embedding added");

        Ok(())
    }

    /// Vector search mapped back to the documents this knowledge base owns
    ///
    /// Hits whose id is not a document of the knowledge base are dropped.
    pub async fn search_documents(&self, knowledge_id: &str, query: &str, limit: usize) -> Result<Vec<Document>> {
        let knowledge = self.load(knowledge_id).await?;
        let results = self.indexer.search(knowledge_id, query, limit).await?;

        let by_id: HashMap<&str, &Document> = knowledge
            .documents()
            .iter()
            .map(|d| (d.id.as_str(), d))
            .collect();

        Ok(results
            .iter()
            .filter_map(|r| by_id.get(r.id.as_str()).map(|d| (*d).clone()))
            .collect())
    }

    /// Add and index several documents, saving once at the end
    ///
    /// The first failure aborts the batch. Documents indexed before the
    /// failure stay in the graph backend but are not persisted.
    pub async fn bulk_index(&self, knowledge_id: &str, documents: Vec<DocumentInput>) -> Result<Vec<Document>> {
        let _guard = self.lock_id(knowledge_id).await;
        let mut knowledge = self.load(knowledge_id).await?;

        let mut added = Vec::with_capacity(documents.len());
        for input in documents {
            let document = knowledge.add_document(input.content, input.metadata)?;
            self.indexer
                .index_document(knowledge_id, &document.id, &document.content, &document.metadata)
                .await
                .map_err(|e| match e {
                    Error::GraphStoreError(msg) => {
                        Error::GraphStoreError(format!("failed to index document {}: {}", document.id, msg))
                    }
                    other => other,
                })?;
            added.push(document);
        }

        if added.is_empty() {
            return Ok(added);
        }

        self.save_after_index(&knowledge).await?;
        info!(knowledge_id, count = added.len(), "Bulk index completed");

        Ok(added)
    }

    pub async fn get_stats(&self, knowledge_id: &str) -> Result<KnowledgeStats> {
        let knowledge = self.load(knowledge_id).await?;
        Ok(KnowledgeStats {
            knowledge_id: knowledge.id().to_string(),
            document_count: knowledge.documents().len(),
            embedding_count: knowledge.embeddings().len(),
            version: knowledge.version(),
            last_updated: knowledge.updated_at(),
        })
    }

    pub async fn get_knowledge(&self, knowledge_id: &str) -> Result<Knowledge> {
        self.load(knowledge_id).await
    }

    pub async fn get_knowledge_by_name(&self, name: &str) -> Result<Knowledge> {
        self.repository
            .find_by_name(name)
            .await?
            .ok_or_else(|| Error::KnowledgeNotFound(name.to_string()))
    }

    /// Look a knowledge base up by id, falling back to its name
    pub async fn find(&self, id_or_name: &str) -> Result<Knowledge> {
        if let Some(knowledge) = self.repository.find_by_id(id_or_name).await? {
            return Ok(knowledge);
        }
        self.get_knowledge_by_name(id_or_name).await
    }

    pub async fn list_knowledge(&self) -> Result<Vec<Knowledge>> {
        self.repository.list().await
    }

    /// Remove the vector collection, then the repository record
    pub async fn delete_knowledge(&self, knowledge_id: &str) -> Result<()> {
        let _guard = self.lock_id(knowledge_id).await;
        if !self.repository.exists(knowledge_id).await? {
            return Err(Error::KnowledgeNotFound(knowledge_id.to_string()));
        }

        self.indexer.delete_knowledge(knowledge_id).await?;
        self.repository.delete(knowledge_id).await?;
        info!(knowledge_id, "Knowledge base deleted");

        Ok(())
    }

    pub async fn get_document_embedding(&self, knowledge_id: &str, document_id: &str) -> Result<Embedding> {
        let knowledge = self.load(knowledge_id).await?;
        knowledge.get_embedding(document_id).cloned()
    }

    /// Bump the version and return the new value
    pub async fn increment_version(&self, knowledge_id: &str) -> Result<u64> {
        let _guard = self.lock_id(knowledge_id).await;
        let mut knowledge = self.load(knowledge_id).await?;
        knowledge.increment_version();
        self.repository.save(&knowledge).await?;
        Ok(knowledge.version())
    }

    /// Embed every document that has no embedding yet
    ///
    /// Each vector is recorded through [`KnowledgeStore::add_embedding`].
    /// Returns the number of embeddings written.
    pub async fn embed_pending(&self, knowledge_id: &str, model: &str) -> Result<usize> {
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| Error::ConfigError("embedder not available".into()))?;

        let knowledge = self.load(knowledge_id).await?;
        let (ids, texts): (Vec<String>, Vec<String>) = knowledge
            .pending_documents()
            .map(|d| (d.id.clone(), d.content.clone()))
            .unzip();

        if ids.is_empty() {
            debug!(knowledge_id, "No pending documents to embed");
            return Ok(0);
        }

        let vectors = embedder
            .embed_batch(&texts)
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("failed to embed pending documents: {}", e)))?;

        if vectors.len() != ids.len() {
            return Err(Error::EmbeddingFailed(format!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                ids.len()
            )));
        }

        for (document_id, vector) in ids.iter().zip(vectors) {
            self.add_embedding(knowledge_id, document_id, vector, model).await?;
        }

        info!(knowledge_id, count = ids.len(), model, "Pending documents embedded");
        Ok(ids.len())
    }
}
