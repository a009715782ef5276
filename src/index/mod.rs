//! Nearest-neighbor storage behind the knowledge store.
//!
//! [`EmbeddingIndex`] is the only seam through which facts are persisted. It
//! owns embedding computation: callers hand it text, never vectors. Two
//! implementations ship with the crate:
//!
//! - [`SqliteIndex`]: persistent, SQLite + sqlite-vec
//! - [`InMemoryIndex`]: brute-force cosine distance, for tests and throwaway runs

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

use crate::memory::types::{Fact, FactMetadata, RetrievalResult};

/// Faults raised by an index implementation.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("metadata encoding failed: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("entry already exists: {0}")]
    DuplicateId(String),
    #[error("entry not found: {0}")]
    NotFound(String),
    #[error("index lock poisoned")]
    Poisoned,
}

impl IndexError {
    pub(crate) fn embedding(err: anyhow::Error) -> Self {
        Self::Embedding(format!("{err:#}"))
    }
}

/// A similarity store keyed by opaque string ids.
///
/// All methods are synchronous and take `&self`; implementations provide
/// their own interior locking.
pub trait EmbeddingIndex: Send + Sync {
    /// The `k` entries nearest to `text`, closest first.
    ///
    /// An empty index yields an empty vector, not an error.
    fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievalResult>, IndexError>;

    /// Insert a new entry. Fails with [`IndexError::DuplicateId`] if `id` exists.
    fn add(&self, id: &str, document: &str, metadata: &FactMetadata) -> Result<(), IndexError>;

    /// Replace document, metadata and embedding of an existing entry.
    fn update(&self, id: &str, document: &str, metadata: &FactMetadata) -> Result<(), IndexError>;

    /// Remove entries by id. Unknown ids are ignored; returns how many were removed.
    fn delete(&self, ids: &[&str]) -> Result<usize, IndexError>;

    /// Fetch one entry by id.
    fn get(&self, id: &str) -> Result<Option<Fact>, IndexError>;

    /// Every entry, in the index's own order.
    fn get_all(&self) -> Result<Vec<Fact>, IndexError>;

    /// Number of entries.
    fn count(&self) -> Result<usize, IndexError> {
        Ok(self.get_all()?.len())
    }
}
