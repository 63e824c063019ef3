//! Knowledge bases: the aggregate, its persistence port and the store
//! that composes them with the indexer

mod entity;
mod repository;
mod store;

pub use entity::{Document, Embedding, Knowledge};
pub use repository::KnowledgeRepository;
pub use store::{DocumentInput, KnowledgeStats, KnowledgeStore};
