//! Deterministic bag-of-words embeddings via feature hashing.
//!
//! Each lowercased alphanumeric token is hashed with SHA-256 into one of
//! [`EMBEDDING_DIM`] buckets with a ±1 sign, then the vector is L2-normalized.
//! Texts sharing vocabulary land close together, identical texts map to
//! identical vectors, and nothing needs to be downloaded. Good enough for tests
//! and offline runs; not a semantic model.

use anyhow::Result;
use sha2::{Digest, Sha256};

use super::{l2_normalize, EmbeddingProvider, EMBEDDING_DIM};

#[derive(Debug, Default, Clone, Copy)]
pub struct HashingEmbeddingProvider;

impl HashingEmbeddingProvider {
    pub fn new() -> Self {
        Self
    }
}

/// Recorded model id for hashed vectors.
pub const HASHING_MODEL_ID: &str = "hashing";

impl EmbeddingProvider for HashingEmbeddingProvider {
    fn model_id(&self) -> String {
        HASHING_MODEL_ID.to_string()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % EMBEDDING_DIM as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        Ok(l2_normalize(&v))
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}
