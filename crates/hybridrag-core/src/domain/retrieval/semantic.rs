//! Vector-only search, used where fusion is not needed

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

use super::indexer::DEFAULT_LIMIT;
use super::ports::{Embedder, VectorHit, VectorStore};
use super::types::{Metadata, RetrievalResult, RetrievalSource, content_from_metadata};

/// Semantic search over a single vector collection
#[derive(Clone)]
pub struct SemanticSearch {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl SemanticSearch {
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
        }
    }

    /// Search `collection` for the nearest neighbours of `query`
    pub async fn search(&self, collection: &str, query: &str, limit: usize) -> Result<Vec<RetrievalResult>> {
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };
        let hits = self.embed_and_search(collection, query, limit).await?;
        Ok(hits.into_iter().map(to_result).collect())
    }

    /// Search, then keep only hits whose metadata matches every filter exactly
    ///
    /// Filtering happens after the fetch, so fewer than `limit` results may
    /// come back even when the collection holds more matches.
    pub async fn search_with_filters(
        &self,
        collection: &str,
        query: &str,
        filters: &Metadata,
        limit: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };
        let hits = self.embed_and_search(collection, query, limit).await?;
        let fetched = hits.len();

        let results: Vec<RetrievalResult> = hits
            .into_iter()
            .filter(|hit| matches_filters(&hit.metadata, filters))
            .map(to_result)
            .collect();

        debug!(collection, fetched, kept = results.len(), "Applied metadata filters");

        Ok(results)
    }

    /// Documents near `document_id`, excluding the document itself
    ///
    /// The document id string is embedded as the query text; this is a proxy
    /// for the document's content, not a lookup of its stored vector.
    pub async fn similarity_search(
        &self,
        collection: &str,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };

        let query_vector = self
            .embedder
            .embed(document_id)
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("failed to generate embedding for document: {}", e)))?;

        let hits = self
            .vector_store
            .search(collection, &query_vector, limit.saturating_add(1))
            .await
            .map_err(|e| Error::VectorStoreError(format!("failed to search for similar documents: {}", e)))?;

        Ok(hits
            .into_iter()
            .filter(|hit| hit.id != document_id)
            .take(limit)
            .map(to_result)
            .collect())
    }

    async fn embed_and_search(&self, collection: &str, query: &str, limit: usize) -> Result<Vec<VectorHit>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query text must not be empty".into()));
        }

        let query_vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("failed to generate query embedding: {}", e)))?;

        self.vector_store
            .search(collection, &query_vector, limit)
            .await
            .map_err(|e| Error::VectorStoreError(format!("failed to search vector database: {}", e)))
    }
}

fn to_result(hit: VectorHit) -> RetrievalResult {
    let content = content_from_metadata(&hit.id, &hit.metadata);
    RetrievalResult {
        id: hit.id,
        content,
        score: hit.score,
        metadata: hit.metadata,
        source: RetrievalSource::Vector,
    }
}

/// All filter keys must be present with an equal value; no filters matches everything
fn matches_filters(metadata: &Metadata, filters: &Metadata) -> bool {
    filters
        .iter()
        .all(|(key, expected)| metadata.get(key).is_some_and(|actual| actual == expected))
}
