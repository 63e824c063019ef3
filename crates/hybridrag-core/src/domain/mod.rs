//! Domain layer
//!
//! - `knowledge`: knowledge base aggregate and store
//! - `retrieval`: chunking, indexing, fusion, reranking and hybrid retrieval

pub mod knowledge;
pub mod retrieval;
