//! Ephemeral index: brute-force cosine distance over embedded documents.
//!
//! Entries are kept in insertion order, which is also the tie-break order for
//! equal distances. Nothing survives the process.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{EmbeddingIndex, IndexError};
use crate::embedding::EmbeddingProvider;
use crate::memory::types::{Fact, FactMetadata, RetrievalResult};

struct Entry {
    fact: Fact,
    embedding: Vec<f32>,
}

pub struct InMemoryIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    entries: Mutex<Vec<Entry>>,
}

impl InMemoryIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder,
            entries: Mutex::new(Vec::new()),
        }
    }

    fn entries(&self) -> Result<MutexGuard<'_, Vec<Entry>>, IndexError> {
        self.entries.lock().map_err(|_| IndexError::Poisoned)
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        self.embedder.embed(text).map_err(IndexError::embedding)
    }
}

/// `1 - cosine similarity`; a zero vector is maximally far from everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - f64::from(dot / (norm_a * norm_b))
}

impl EmbeddingIndex for InMemoryIndex {
    fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievalResult>, IndexError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query = self.embed(text)?;
        let entries = self.entries()?;

        let mut scored: Vec<(f64, &Entry)> = entries
            .iter()
            .map(|e| (cosine_distance(&query, &e.embedding), e))
            .collect();
        // Stable sort keeps insertion order among ties.
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, e)| RetrievalResult {
                id: e.fact.id.clone(),
                content: e.fact.content.clone(),
                metadata: e.fact.metadata.clone(),
                distance,
            })
            .collect())
    }

    fn add(&self, id: &str, document: &str, metadata: &FactMetadata) -> Result<(), IndexError> {
        let embedding = self.embed(document)?;
        let mut entries = self.entries()?;
        if entries.iter().any(|e| e.fact.id == id) {
            return Err(IndexError::DuplicateId(id.to_string()));
        }
        entries.push(Entry {
            fact: Fact {
                id: id.to_string(),
                content: document.to_string(),
                metadata: metadata.clone(),
            },
            embedding,
        });
        Ok(())
    }

    fn update(&self, id: &str, document: &str, metadata: &FactMetadata) -> Result<(), IndexError> {
        let embedding = self.embed(document)?;
        let mut entries = self.entries()?;
        let entry = entries
            .iter_mut()
            .find(|e| e.fact.id == id)
            .ok_or_else(|| IndexError::NotFound(id.to_string()))?;
        entry.fact.content = document.to_string();
        entry.fact.metadata = metadata.clone();
        entry.embedding = embedding;
        Ok(())
    }

    fn delete(&self, ids: &[&str]) -> Result<usize, IndexError> {
        let mut entries = self.entries()?;
        let before = entries.len();
        entries.retain(|e| !ids.contains(&e.fact.id.as_str()));
        Ok(before - entries.len())
    }

    fn get(&self, id: &str) -> Result<Option<Fact>, IndexError> {
        Ok(self
            .entries()?
            .iter()
            .find(|e| e.fact.id == id)
            .map(|e| e.fact.clone()))
    }

    fn get_all(&self) -> Result<Vec<Fact>, IndexError> {
        Ok(self.entries()?.iter().map(|e| e.fact.clone()).collect())
    }

    fn count(&self) -> Result<usize, IndexError> {
        Ok(self.entries()?.len())
    }
}
