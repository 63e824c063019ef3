//! Hybrid retrieval engine
//!
//! Documents are chunked into a graph backend and embedded into a vector
//! backend. Queries run against both, and the two rankings are merged with
//! Reciprocal Rank Fusion before an optional lexical rerank.

pub mod adapters;
pub mod chunker;
pub mod fusion;
pub mod hybrid;
pub mod indexer;
pub mod ports;
pub mod rerank;
pub mod semantic;
pub mod types;

pub use adapters::{KnowledgeGraphRetriever, KnowledgeVectorRetriever};
pub use chunker::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
pub use fusion::{FusionStrategy, RRF_K, ReciprocalRankFusion};
pub use hybrid::{GraphRetriever, HybridRetriever, VectorRetriever};
pub use indexer::{CONTAINS_RELATION, DEFAULT_LIMIT, Indexer, chunk_id, collection_name};
pub use ports::{Embedder, GraphHit, GraphQuery, GraphStore, VectorHit, VectorStore};
pub use rerank::{LexicalReranker, MAX_LEXICAL_BOOST, Reranker, tokenize};
pub use semantic::SemanticSearch;
pub use types::{KnowledgeContext, Metadata, RetrievalResult, RetrievalSource};
