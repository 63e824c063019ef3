//! Retriever implementations bound to a single knowledge base

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

use super::hybrid::{GraphRetriever, VectorRetriever};
use super::indexer::{Indexer, collection_name};
use super::ports::{GraphQuery, GraphStore};
use super::types::{Metadata, RetrievalResult, RetrievalSource, content_from_metadata, rank_order};

/// Vector side of hybrid retrieval, backed by [`Indexer::search`]
///
/// The vector index only stores ids, so document text can be supplied with
/// [`KnowledgeVectorRetriever::with_contents`] for results to carry it.
pub struct KnowledgeVectorRetriever {
    indexer: Arc<Indexer>,
    knowledge_id: String,
    contents: HashMap<String, String>,
}

impl KnowledgeVectorRetriever {
    pub fn new(indexer: Arc<Indexer>, knowledge_id: impl Into<String>) -> Self {
        Self {
            indexer,
            knowledge_id: knowledge_id.into(),
            contents: HashMap::new(),
        }
    }

    /// Document id to content lookup used to fill result content
    pub fn with_contents(mut self, contents: HashMap<String, String>) -> Self {
        self.contents = contents;
        self
    }
}

#[async_trait]
impl VectorRetriever for KnowledgeVectorRetriever {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievalResult>> {
        let mut results = self.indexer.search(&self.knowledge_id, query, limit).await?;
        for result in &mut results {
            if let Some(content) = self.contents.get(&result.id) {
                result.content = content.clone();
            }
        }
        Ok(results)
    }
}

/// Graph side of hybrid retrieval
///
/// Chunk hits are rolled up to their owning document: the document keeps the
/// best chunk's score and content, and its metadata records which chunk that
/// was. Hits without a `document_id` property pass through under their own id.
pub struct KnowledgeGraphRetriever {
    graph_store: Arc<dyn GraphStore>,
    knowledge_id: String,
    max_hops: u32,
}

impl KnowledgeGraphRetriever {
    pub fn new(graph_store: Arc<dyn GraphStore>, knowledge_id: impl Into<String>) -> Self {
        Self {
            graph_store,
            knowledge_id: knowledge_id.into(),
            max_hops: 1,
        }
    }

    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }
}

#[async_trait]
impl GraphRetriever for KnowledgeGraphRetriever {
    async fn traverse(&self, query: &str, limit: usize) -> Result<Vec<RetrievalResult>> {
        let graph_query = GraphQuery::new(query, limit).with_max_hops(self.max_hops);
        let hits = self
            .graph_store
            .query(&collection_name(&self.knowledge_id), &graph_query)
            .await?;

        let mut documents: Vec<RetrievalResult> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for hit in hits {
            let document_id = hit
                .properties
                .get("document_id")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| hit.id.clone());

            if let Some(&pos) = positions.get(&document_id) {
                if hit.score <= documents[pos].score {
                    continue;
                }
                documents[pos] = rolled_up(document_id, &hit.id, hit.score, hit.properties, hit.hops);
            } else {
                positions.insert(document_id.clone(), documents.len());
                documents.push(rolled_up(document_id, &hit.id, hit.score, hit.properties, hit.hops));
            }
        }

        documents.sort_by(rank_order);
        documents.truncate(limit);
        Ok(documents)
    }
}

fn rolled_up(
    document_id: String,
    chunk_id: &str,
    score: f32,
    mut properties: Metadata,
    hops: u32,
) -> RetrievalResult {
    let content = content_from_metadata(&document_id, &properties);
    properties.remove("content");
    properties.insert("chunk_id".into(), Value::from(chunk_id));
    properties.insert("hops".into(), Value::from(hops));
    RetrievalResult {
        id: document_id,
        content,
        score,
        metadata: properties,
        source: RetrievalSource::Graph,
    }
}
