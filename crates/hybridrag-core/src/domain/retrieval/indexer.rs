//! Document ingestion into the vector and graph backends
//!
//! The indexer owns the naming conventions the backends see:
//!
//! - collection: `knowledge_{knowledge_id}` (vector collection and graph namespace)
//! - chunk node id: `{document_id}_chunk_{index}`
//! - chunk membership edge: `document_id --contains--> chunk id`
//!
//! Graph indexing is chunk-granular while the vector index holds one entry
//! per document, written separately through [`Indexer::update_vector_index`].

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};

use super::chunker::Chunker;
use super::ports::{Embedder, GraphStore, VectorStore};
use super::types::{Metadata, RetrievalResult, RetrievalSource, content_from_metadata};

/// Fallback result count when a caller passes a zero limit
pub const DEFAULT_LIMIT: usize = 10;

/// Relation used for document -> chunk edges
pub const CONTAINS_RELATION: &str = "contains";

/// Backend collection name for a knowledge base
pub fn collection_name(knowledge_id: &str) -> String {
    format!("knowledge_{}", knowledge_id)
}

/// Graph node id for the `index`-th chunk of a document
pub fn chunk_id(document_id: &str, index: usize) -> String {
    format!("{}_chunk_{}", document_id, index)
}

/// Handles document chunking and index writes
#[derive(Clone)]
pub struct Indexer {
    vector_store: Option<Arc<dyn VectorStore>>,
    graph_store: Option<Arc<dyn GraphStore>>,
    embedder: Option<Arc<dyn Embedder>>,
    chunker: Chunker,
    default_limit: usize,
}

impl std::fmt::Debug for Indexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("vector_store", &self.vector_store.is_some())
            .field("graph_store", &self.graph_store.is_some())
            .field("embedder", &self.embedder.is_some())
            .field("chunker", &self.chunker)
            .field("default_limit", &self.default_limit)
            .finish()
    }
}

impl Indexer {
    /// Create an indexer with no backends attached
    pub fn new(chunker: Chunker) -> Self {
        Self {
            vector_store: None,
            graph_store: None,
            embedder: None,
            chunker,
            default_limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_vector_store(mut self, vector_store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(vector_store);
        self
    }

    pub fn with_graph_store(mut self, graph_store: Arc<dyn GraphStore>) -> Self {
        self.graph_store = Some(graph_store);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the result count used for zero limits (zero keeps the default)
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        if limit > 0 {
            self.default_limit = limit;
        }
        self
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Chunk a document and write one graph node plus one `contains` edge per chunk
    ///
    /// Returns the number of chunks produced. A failing node or edge write
    /// aborts the remaining chunks; chunks already written are left in place.
    pub async fn index_document(
        &self,
        knowledge_id: &str,
        document_id: &str,
        content: &str,
        metadata: &Metadata,
    ) -> Result<usize> {
        let chunks = self.chunker.chunk(content);
        let collection = collection_name(knowledge_id);

        let Some(graph) = &self.graph_store else {
            debug!(
                knowledge_id,
                document_id,
                chunks = chunks.len(),
                "No graph store configured, skipping graph indexing"
            );
            return Ok(chunks.len());
        };

        for (i, chunk) in chunks.iter().enumerate() {
            let id = chunk_id(document_id, i);
            let mut properties = metadata.clone();
            properties.insert("chunk_index".into(), Value::from(i));
            properties.insert("document_id".into(), Value::from(document_id));
            properties.insert("knowledge_id".into(), Value::from(knowledge_id));
            properties.insert("content".into(), Value::from(chunk.as_str()));

            graph
                .create_node(&collection, &id, properties)
                .await
                .map_err(|e| Error::GraphStoreError(format!("failed to create graph node {}: {}", id, e)))?;

            graph
                .create_edge(document_id, &id, CONTAINS_RELATION, Metadata::new())
                .await
                .map_err(|e| Error::GraphStoreError(format!("failed to create graph edge to {}: {}", id, e)))?;
        }

        debug!(knowledge_id, document_id, chunks = chunks.len(), "Document indexed");

        Ok(chunks.len())
    }

    /// Upsert the document-level vector for `document_id`
    pub async fn update_vector_index(&self, knowledge_id: &str, document_id: &str, vector: &[f32]) -> Result<()> {
        let vector_store = self
            .vector_store
            .as_ref()
            .ok_or_else(|| Error::ConfigError("vector store not available".into()))?;

        let mut metadata = Metadata::new();
        metadata.insert("document_id".into(), Value::from(document_id));
        metadata.insert("knowledge_id".into(), Value::from(knowledge_id));

        vector_store
            .upsert(&collection_name(knowledge_id), document_id, vector, metadata)
            .await
    }

    /// Embed `query` and search the knowledge base's vector collection
    pub async fn search(&self, knowledge_id: &str, query: &str, limit: usize) -> Result<Vec<RetrievalResult>> {
        let limit = if limit == 0 { self.default_limit } else { limit };

        let vector_store = self
            .vector_store
            .as_ref()
            .ok_or_else(|| Error::ConfigError("vector store not available".into()))?;
        let embedder = self
            .embedder
            .as_ref()
            .ok_or_else(|| Error::ConfigError("embedder not available".into()))?;

        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query text must not be empty".into()));
        }

        let query_vector = embedder
            .embed(query)
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("failed to generate query embedding: {}", e)))?;

        let hits = vector_store
            .search(&collection_name(knowledge_id), &query_vector, limit)
            .await
            .map_err(|e| Error::VectorStoreError(format!("failed to search vector database: {}", e)))?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let content = content_from_metadata(&hit.id, &hit.metadata);
                RetrievalResult {
                    id: hit.id,
                    content,
                    score: hit.score,
                    metadata: hit.metadata,
                    source: RetrievalSource::Vector,
                }
            })
            .collect())
    }

    /// Remove the knowledge base's vector collection
    ///
    /// Graph nodes and edges written by [`Indexer::index_document`] are NOT
    /// removed: the graph port has no namespace-wide delete, so chunk nodes
    /// outlive the knowledge base until the graph backend is purged.
    pub async fn delete_knowledge(&self, knowledge_id: &str) -> Result<()> {
        if let Some(vector_store) = &self.vector_store {
            vector_store
                .delete_collection(&collection_name(knowledge_id))
                .await
                .map_err(|e| Error::VectorStoreError(format!("failed to delete vector collection: {}", e)))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrieval::ports::{GraphHit, GraphQuery, VectorHit};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingVectors {
        upserts: Mutex<Vec<(String, String, Vec<f32>, Metadata)>>,
        deleted: Mutex<Vec<String>>,
        hits: Vec<VectorHit>,
    }

    #[async_trait]
    impl VectorStore for RecordingVectors {
        async fn upsert(&self, collection: &str, id: &str, vector: &[f32], metadata: Metadata) -> Result<()> {
            self.upserts
                .lock()
                .unwrap()
                .push((collection.into(), id.into(), vector.to_vec(), metadata));
            Ok(())
        }

        async fn search(&self, _collection: &str, _query: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
            Ok(self.hits.iter().take(limit).cloned().collect())
        }

        async fn delete(&self, _collection: &str, _id: &str) -> Result<()> {
            Ok(())
        }

        async fn delete_collection(&self, collection: &str) -> Result<()> {
            self.deleted.lock().unwrap().push(collection.into());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingGraph {
        nodes: Mutex<Vec<(String, String, Metadata)>>,
        edges: Mutex<Vec<(String, String, String)>>,
        fail_on_node: Option<usize>,
    }

    #[async_trait]
    impl GraphStore for RecordingGraph {
        async fn create_node(&self, collection: &str, id: &str, properties: Metadata) -> Result<()> {
            let mut nodes = self.nodes.lock().unwrap();
            if self.fail_on_node == Some(nodes.len()) {
                return Err(Error::GraphStoreError("node write refused".into()));
            }
            nodes.push((collection.into(), id.into(), properties));
            Ok(())
        }

        async fn create_edge(&self, from_id: &str, to_id: &str, relation: &str, _properties: Metadata) -> Result<()> {
            self.edges
                .lock()
                .unwrap()
                .push((from_id.into(), to_id.into(), relation.into()));
            Ok(())
        }

        async fn query(&self, _collection: &str, _query: &GraphQuery) -> Result<Vec<GraphHit>> {
            Ok(Vec::new())
        }

        async fn delete_node(&self, _id: &str) -> Result<()> {
            Ok(())
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[test]
    fn test_naming_conventions() {
        assert_eq!(collection_name("kb1"), "knowledge_kb1");
        assert_eq!(chunk_id("doc", 3), "doc_chunk_3");
    }

    #[tokio::test]
    async fn test_index_document_writes_nodes_and_edges_per_chunk() {
        let graph = Arc::new(RecordingGraph::default());
        let indexer = Indexer::new(Chunker::new(4, 1).unwrap()).with_graph_store(graph.clone());

        let mut metadata = Metadata::new();
        metadata.insert("author".into(), json!("ada"));

        let count = indexer
            .index_document("kb", "doc", "abcdefghij", &metadata)
            .await
            .unwrap();
        assert_eq!(count, 3);

        let nodes = graph.nodes.lock().unwrap();
        assert_eq!(nodes.len(), 3);
        let (collection, id, properties) = &nodes[1];
        assert_eq!(collection, "knowledge_kb");
        assert_eq!(id, "doc_chunk_1");
        assert_eq!(properties["chunk_index"], json!(1));
        assert_eq!(properties["document_id"], json!("doc"));
        assert_eq!(properties["knowledge_id"], json!("kb"));
        assert_eq!(properties["author"], json!("ada"));
        assert_eq!(properties["content"], json!("defg"));

        let edges = graph.edges.lock().unwrap();
        assert_eq!(edges.len(), 3);
        assert!(edges.iter().all(|(from, _, rel)| from == "doc" && rel == CONTAINS_RELATION));
        assert_eq!(edges[2].1, "doc_chunk_2");

        // Caller metadata is copied, not mutated
        assert_eq!(metadata.len(), 1);
    }

    #[tokio::test]
    async fn test_index_document_aborts_on_graph_failure() {
        let graph = Arc::new(RecordingGraph {
            fail_on_node: Some(1),
            ..Default::default()
        });
        let indexer = Indexer::new(Chunker::new(4, 1).unwrap()).with_graph_store(graph.clone());

        let err = indexer
            .index_document("kb", "doc", "abcdefghij", &Metadata::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::GraphStoreError(_)));
        // First chunk stays written, no rollback
        assert_eq!(graph.nodes.lock().unwrap().len(), 1);
        assert_eq!(graph.edges.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_index_document_without_graph_store_counts_chunks() {
        let indexer = Indexer::new(Chunker::new(4, 0).unwrap());
        let count = indexer
            .index_document("kb", "doc", "abcdefgh", &Metadata::new())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_update_vector_index_upserts_document_vector() {
        let vectors = Arc::new(RecordingVectors::default());
        let indexer = Indexer::new(Chunker::default()).with_vector_store(vectors.clone());

        indexer.update_vector_index("kb", "doc", &[0.1, 0.2]).await.unwrap();

        let upserts = vectors.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        let (collection, id, vector, metadata) = &upserts[0];
        assert_eq!(collection, "knowledge_kb");
        assert_eq!(id, "doc");
        assert_eq!(vector, &vec![0.1, 0.2]);
        assert_eq!(metadata["document_id"], json!("doc"));
        assert_eq!(metadata["knowledge_id"], json!("kb"));
    }

    #[tokio::test]
    async fn test_update_vector_index_requires_vector_store() {
        let indexer = Indexer::new(Chunker::default());
        let err = indexer.update_vector_index("kb", "doc", &[1.0]).await.unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_search_maps_hits_and_defaults_limit() {
        let mut with_content = Metadata::new();
        with_content.insert("content".into(), json!("stored text"));
        let hits: Vec<VectorHit> = (0..15)
            .map(|i| VectorHit {
                id: format!("doc{}", i),
                score: 1.0 - i as f32 * 0.01,
                metadata: if i == 0 { with_content.clone() } else { Metadata::new() },
            })
            .collect();
        let vectors = Arc::new(RecordingVectors {
            hits,
            ..Default::default()
        });
        let indexer = Indexer::new(Chunker::default())
            .with_vector_store(vectors)
            .with_embedder(Arc::new(FixedEmbedder));

        let results = indexer.search("kb", "anything", 0).await.unwrap();
        assert_eq!(results.len(), DEFAULT_LIMIT);
        assert_eq!(results[0].content, "stored text");
        assert_eq!(results[1].content, "Document: doc1");
        assert!(results.iter().all(|r| r.source == RetrievalSource::Vector));
    }

    #[tokio::test]
    async fn test_search_requires_backends_and_query() {
        let no_embedder = Indexer::new(Chunker::default()).with_vector_store(Arc::new(RecordingVectors::default()));
        assert!(matches!(
            no_embedder.search("kb", "q", 5).await.unwrap_err(),
            Error::ConfigError(_)
        ));

        let no_vectors = Indexer::new(Chunker::default()).with_embedder(Arc::new(FixedEmbedder));
        assert!(matches!(
            no_vectors.search("kb", "q", 5).await.unwrap_err(),
            Error::ConfigError(_)
        ));

        let full = no_embedder.with_embedder(Arc::new(FixedEmbedder));
        assert!(matches!(
            full.search("kb", "   ", 5).await.unwrap_err(),
            Error::InvalidInput(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_knowledge_drops_vector_collection() {
        let vectors = Arc::new(RecordingVectors::default());
        let indexer = Indexer::new(Chunker::default()).with_vector_store(vectors.clone());
        indexer.delete_knowledge("kb").await.unwrap();
        assert_eq!(*vectors.deleted.lock().unwrap(), vec!["knowledge_kb".to_string()]);
    }
}
