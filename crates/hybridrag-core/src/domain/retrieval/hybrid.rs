//! Hybrid retrieval combining vector similarity and graph traversal
//!
//! ```text
//!             ┌── VectorRetriever::search (2 × limit) ──┐
//! query ──────┤                                         ├── join ── fuse ── rerank? ── truncate
//!             └── GraphRetriever::traverse (2 × limit) ─┘
//! ```
//!
//! Both branches run concurrently inside one future and are always joined
//! before fusion. A failing branch contributes no results; the query only
//! fails when both branches fail.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};

use super::fusion::{FusionStrategy, ReciprocalRankFusion};
use super::indexer::DEFAULT_LIMIT;
use super::rerank::Reranker;
use super::types::{KnowledgeContext, RetrievalResult};

/// Vector-similarity side of hybrid retrieval
#[async_trait]
pub trait VectorRetriever: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RetrievalResult>>;
}

/// Graph-traversal side of hybrid retrieval
#[async_trait]
pub trait GraphRetriever: Send + Sync {
    async fn traverse(&self, query: &str, limit: usize) -> Result<Vec<RetrievalResult>>;
}

/// Combines vector and graph retrieval into one ranked context
pub struct HybridRetriever {
    vector_retriever: Option<Arc<dyn VectorRetriever>>,
    graph_retriever: Option<Arc<dyn GraphRetriever>>,
    fusion: Box<dyn FusionStrategy>,
    reranker: Option<Box<dyn Reranker>>,
    default_limit: usize,
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("vector_retriever", &self.vector_retriever.is_some())
            .field("graph_retriever", &self.graph_retriever.is_some())
            .field("reranker", &self.reranker.is_some())
            .field("default_limit", &self.default_limit)
            .finish()
    }
}

impl Default for HybridRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl HybridRetriever {
    /// Create a retriever with RRF fusion, no reranker and no sources
    pub fn new() -> Self {
        Self {
            vector_retriever: None,
            graph_retriever: None,
            fusion: Box::new(ReciprocalRankFusion::new()),
            reranker: None,
            default_limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_vector_retriever(mut self, retriever: Arc<dyn VectorRetriever>) -> Self {
        self.vector_retriever = Some(retriever);
        self
    }

    pub fn with_graph_retriever(mut self, retriever: Arc<dyn GraphRetriever>) -> Self {
        self.graph_retriever = Some(retriever);
        self
    }

    pub fn with_fusion(mut self, fusion: impl FusionStrategy + 'static) -> Self {
        self.fusion = Box::new(fusion);
        self
    }

    pub fn with_reranker(mut self, reranker: impl Reranker + 'static) -> Self {
        self.reranker = Some(Box::new(reranker));
        self
    }

    /// Set the result count used for zero limits (zero keeps the default)
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        if limit > 0 {
            self.default_limit = limit;
        }
        self
    }

    /// Run hybrid retrieval for `query`, returning at most `limit` results
    ///
    /// Dropping the returned future cancels both in-flight branches.
    pub async fn retrieve(&self, query: &str, limit: usize) -> Result<KnowledgeContext> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("query text must not be empty".into()));
        }

        let limit = if limit == 0 { self.default_limit } else { limit };
        let candidates = limit.saturating_mul(2);

        let vector_branch = async {
            match &self.vector_retriever {
                Some(retriever) => retriever.search(query, candidates).await,
                None => Ok(Vec::new()),
            }
        };
        let graph_branch = async {
            match &self.graph_retriever {
                Some(retriever) => retriever.traverse(query, candidates).await,
                None => Ok(Vec::new()),
            }
        };

        let (vector_outcome, graph_outcome) = tokio::join!(vector_branch, graph_branch);

        let (vector_results, graph_results) = match (vector_outcome, graph_outcome) {
            (Err(vector_err), Err(graph_err)) => {
                return Err(Error::RetrievalFailed {
                    vector: vector_err.to_string(),
                    graph: graph_err.to_string(),
                });
            }
            (Ok(vector), Err(graph_err)) => {
                warn!(error = %graph_err, "Graph retrieval failed, continuing with vector results");
                (vector, Vec::new())
            }
            (Err(vector_err), Ok(graph)) => {
                warn!(error = %vector_err, "Vector retrieval failed, continuing with graph results");
                (Vec::new(), graph)
            }
            (Ok(vector), Ok(graph)) => (vector, graph),
        };

        let total_found = vector_results.len() + graph_results.len();
        let mut fused = self.fusion.fuse(&vector_results, &graph_results);

        if let Some(reranker) = &self.reranker {
            if !fused.is_empty() {
                match reranker.rerank(query, fused.clone()) {
                    Ok(reranked) => fused = reranked,
                    Err(e) => warn!(error = %e, "Reranking failed, keeping fused order"),
                }
            }
        }

        fused.truncate(limit);

        let fused_score = if fused.is_empty() {
            0.0
        } else {
            fused.iter().map(|r| r.score).sum::<f32>() / fused.len() as f32
        };

        debug!(
            query,
            vector = vector_results.len(),
            graph = graph_results.len(),
            returned = fused.len(),
            "Hybrid retrieval completed"
        );

        Ok(KnowledgeContext {
            results: fused,
            query: query.to_string(),
            total_found,
            fused_score,
        })
    }

    /// Like [`HybridRetriever::retrieve`], but gives up as soon as `token` is
    /// cancelled, dropping both branches
    pub async fn retrieve_with_cancellation(
        &self,
        query: &str,
        limit: usize,
        token: &CancellationToken,
    ) -> Result<KnowledgeContext> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(query, "Hybrid retrieval cancelled");
                Err(Error::Cancelled)
            }
            outcome = self.retrieve(query, limit) => outcome,
        }
    }
}
