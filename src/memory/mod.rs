//! The fact store: types, merge arbitration and the write path.

pub mod merge;
pub mod store;
pub mod types;

pub use store::{KnowledgeStore, StoreError};
