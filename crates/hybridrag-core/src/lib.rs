//! Hybridrag Core Library
//!
//! This crate provides the hybrid knowledge retrieval and indexing engine:
//! - Knowledge bases (aggregate, repository port, store)
//! - Fixed-width chunking and graph/vector indexing
//! - Vector, graph and hybrid retrieval with Reciprocal Rank Fusion
//! - Lexical reranking
//! - In-process reference adapters for every backend port
//! - TOML configuration

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::knowledge::{Document, DocumentInput, Knowledge, KnowledgeRepository, KnowledgeStore};
    pub use crate::domain::retrieval::{
        Embedder, GraphStore, HybridRetriever, Indexer, KnowledgeContext, Metadata, RetrievalResult,
        RetrievalSource, VectorStore,
    };
    pub use crate::error::{Error, Result};
}
