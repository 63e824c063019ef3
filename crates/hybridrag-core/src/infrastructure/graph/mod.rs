mod memory;

pub use memory::{GraphSnapshot, HOP_DECAY, InMemoryGraphStore};
