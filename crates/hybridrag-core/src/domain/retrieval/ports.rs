//! Capability contracts for the external backends
//!
//! The engine never computes embeddings or executes similarity search and
//! graph traversal itself. It talks to these traits, and the backends are
//! responsible for their own concurrency safety.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::types::Metadata;

/// Embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// A vector search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
    pub metadata: Metadata,
}

/// Vector database operations
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace the vector stored under `id`
    async fn upsert(&self, collection: &str, id: &str, vector: &[f32], metadata: Metadata) -> Result<()>;

    /// Nearest neighbours of `query_vector`, best first
    async fn search(&self, collection: &str, query_vector: &[f32], limit: usize) -> Result<Vec<VectorHit>>;

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    async fn delete_collection(&self, collection: &str) -> Result<()>;
}

/// Graph traversal request
#[derive(Debug, Clone, PartialEq)]
pub struct GraphQuery {
    pub text: String,
    pub limit: usize,
    /// How many edges away from a seed node traversal may go
    pub max_hops: u32,
}

impl GraphQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
            max_hops: 1,
        }
    }

    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }
}

/// A node reached by graph traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphHit {
    pub id: String,
    pub score: f32,
    pub properties: Metadata,
    /// Edges walked from the nearest seed node (0 for a seed)
    pub hops: u32,
}

/// Graph database operations
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn create_node(&self, collection: &str, id: &str, properties: Metadata) -> Result<()>;

    async fn create_edge(&self, from_id: &str, to_id: &str, relation: &str, properties: Metadata) -> Result<()>;

    /// Ranked nodes of `collection` relevant to the query, best first
    async fn query(&self, collection: &str, query: &GraphQuery) -> Result<Vec<GraphHit>>;

    async fn delete_node(&self, id: &str) -> Result<()>;
}
