//! Knowledge repository implementations

mod file;
mod memory;

pub use file::FileKnowledgeRepository;
pub use memory::InMemoryKnowledgeRepository;
