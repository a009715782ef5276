#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use mnemofill::embedding::hashing::HashingEmbeddingProvider;
use mnemofill::embedding::EmbeddingProvider;
use mnemofill::index::{InMemoryIndex, SqliteIndex};
use mnemofill::memory::merge::{MergeOracle, MergeRequest};
use mnemofill::memory::KnowledgeStore;

pub fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashingEmbeddingProvider::new())
}

/// Store over an in-memory index.
pub fn memory_store(oracle: impl MergeOracle + 'static) -> KnowledgeStore {
    KnowledgeStore::new(Box::new(InMemoryIndex::new(embedder())), Box::new(oracle))
}

/// Store over a SQLite file at `path`.
pub fn sqlite_store(path: &Path, oracle: impl MergeOracle + 'static) -> KnowledgeStore {
    let index = SqliteIndex::open(path, embedder()).unwrap();
    KnowledgeStore::new(Box::new(index), Box::new(oracle))
}

/// Oracle that answers every request with the same text and counts calls.
#[derive(Clone)]
pub struct FixedOracle {
    response: String,
    pub calls: Arc<Mutex<Vec<MergeRequest>>>,
}

impl FixedOracle {
    pub fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl MergeOracle for FixedOracle {
    fn decide(&self, request: &MergeRequest) -> String {
        self.calls.lock().unwrap().push(request.clone());
        self.response.clone()
    }
}

/// Oracle that merges whenever both facts mention `keyword`, concatenating them.
pub struct KeywordOracle(pub &'static str);

impl MergeOracle for KeywordOracle {
    fn decide(&self, request: &MergeRequest) -> String {
        let both = request.existing_content.contains(self.0) && request.new_content.contains(self.0);
        serde_json::json!({
            "merge_decision": both,
            "reason": if both { "same subject" } else { "distinct" },
            "merged_metadata": format!("{} + {}", request.existing_overview, request.new_overview),
            "merged_information": format!("{}; {}", request.existing_content, request.new_content),
        })
        .to_string()
    }
}
