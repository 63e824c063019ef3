//! Result types shared by every retrieval path

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Arbitrary metadata attached to documents, chunks and hits
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Which retriever produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    Vector,
    Graph,
    /// Produced by both retrievers and merged during fusion
    Hybrid,
}

impl RetrievalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Graph => "graph",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::fmt::Display for RetrievalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single retrieval result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    pub content: String,
    /// Score on whatever scale the producing stage uses
    pub score: f32,
    pub metadata: Metadata,
    pub source: RetrievalSource,
}

impl RetrievalResult {
    pub fn new(id: impl Into<String>, content: impl Into<String>, score: f32, source: RetrievalSource) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            score,
            metadata: Metadata::new(),
            source,
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Enriched knowledge context for a single query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeContext {
    pub results: Vec<RetrievalResult>,
    pub query: String,
    /// Raw hit count from both sources, before deduplication
    pub total_found: usize,
    /// Mean score of `results`, 0 when empty
    pub fused_score: f32,
}

/// Descending by score, then ascending by id so equal scores order the same way every run
pub(crate) fn rank_order(a: &RetrievalResult, b: &RetrievalResult) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

/// Pick display content out of hit metadata, falling back to a placeholder
pub(crate) fn content_from_metadata(id: &str, metadata: &Metadata) -> String {
    match metadata.get("content").and_then(|v| v.as_str()) {
        Some(content) => content.to_string(),
        None => format!("Document: {}", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rank_order_breaks_ties_by_id() {
        let mut results = vec![
            RetrievalResult::new("b", "", 0.5, RetrievalSource::Vector),
            RetrievalResult::new("a", "", 0.5, RetrievalSource::Graph),
            RetrievalResult::new("c", "", 0.9, RetrievalSource::Vector),
        ];
        results.sort_by(rank_order);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_content_from_metadata() {
        let mut metadata = Metadata::new();
        assert_eq!(content_from_metadata("doc-1", &metadata), "Document: doc-1");

        metadata.insert("content".into(), json!("hello"));
        assert_eq!(content_from_metadata("doc-1", &metadata), "hello");

        metadata.insert("content".into(), json!(42));
        assert_eq!(content_from_metadata("doc-1", &metadata), "Document: doc-1");
    }

    #[test]
    fn test_source_serializes_snake_case() {
        let value = serde_json::to_value(RetrievalSource::Hybrid).unwrap();
        assert_eq!(value, json!("hybrid"));
        assert_eq!(RetrievalSource::Graph.to_string(), "graph");
    }
}
