mod memory;

pub use memory::{InMemoryVectorStore, VectorSnapshot};
