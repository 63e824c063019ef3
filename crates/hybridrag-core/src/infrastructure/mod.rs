//! Infrastructure layer: in-process reference adapters for the domain ports
//!
//! - `embedding`: feature-hashing and OpenAI-compatible embedders
//! - `vector`: in-memory vector store with cosine search
//! - `graph`: in-memory property graph with token-seeded traversal
//! - `knowledge`: in-memory and JSON-file knowledge repositories

pub mod embedding;
pub mod graph;
pub mod knowledge;
pub mod vector;

pub use embedding::{HashingEmbedder, OpenAiEmbedder};
pub use graph::{GraphSnapshot, InMemoryGraphStore};
pub use knowledge::{FileKnowledgeRepository, InMemoryKnowledgeRepository};
pub use vector::{InMemoryVectorStore, VectorSnapshot};
