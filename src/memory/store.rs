//! Write path and lookups for the fact store.
//!
//! [`KnowledgeStore::add_or_update`] is the only way facts enter the index:
//! the nearest existing facts are offered to the [`MergeOracle`] closest first,
//! the first accepted merge rewrites that fact in place, and otherwise a new
//! fact is inserted. The lookup, query and write sequence holds a store-wide
//! lock so two concurrent writers cannot both insert the same fact.

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::config::MnemoConfig;
use crate::embedding::{self, EmbeddingProvider};
use crate::index::{EmbeddingIndex, InMemoryIndex, IndexError, SqliteIndex};
use crate::memory::merge::{self, MergeOracle, MergeRequest};
use crate::memory::types::{AddOutcome, Fact, FactMetadata, RetrievalResult};

/// Nearest neighbors offered to the oracle when nothing else is configured.
pub const DEFAULT_MERGE_CANDIDATES: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("store write lock poisoned")]
    Poisoned,
}

pub struct KnowledgeStore {
    index: Box<dyn EmbeddingIndex>,
    oracle: Box<dyn MergeOracle>,
    merge_candidates: usize,
    write_lock: Mutex<()>,
}

impl KnowledgeStore {
    pub fn new(index: Box<dyn EmbeddingIndex>, oracle: Box<dyn MergeOracle>) -> Self {
        Self {
            index,
            oracle,
            merge_candidates: DEFAULT_MERGE_CANDIDATES,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_merge_candidates(mut self, k: usize) -> Self {
        self.merge_candidates = k;
        self
    }

    /// Persistent store at the configured database path.
    pub fn open(config: &MnemoConfig) -> Result<Self> {
        let embedder = Self::embedder(config)?;
        let index = SqliteIndex::open(config.resolved_db_path(), embedder)?;
        Self::assemble(config, Box::new(index))
    }

    /// Store backed by an in-memory index; nothing is written to disk.
    pub fn ephemeral(config: &MnemoConfig) -> Result<Self> {
        let embedder = Self::embedder(config)?;
        Self::assemble(config, Box::new(InMemoryIndex::new(embedder)))
    }

    fn embedder(config: &MnemoConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::from(embedding::create_provider(&config.embedding)?))
    }

    fn assemble(config: &MnemoConfig, index: Box<dyn EmbeddingIndex>) -> Result<Self> {
        let oracle = merge::create_oracle(&config.oracle)?;
        Ok(Self::new(index, oracle).with_merge_candidates(config.retrieval.merge_candidates))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Add one fact; blank content is skipped with a warning.
    pub fn add_fact(&self, content: &str, source_overview: &str) -> Result<AddOutcome, StoreError> {
        self.add_or_update(content, source_overview)
    }

    /// Merge `new_content` into its nearest accepted neighbor or insert it.
    ///
    /// Oracle output that cannot be parsed is treated as "no merge". Index
    /// failures abort the write and are returned.
    pub fn add_or_update(&self, new_content: &str, new_overview: &str) -> Result<AddOutcome, StoreError> {
        let content = new_content.trim();
        if content.is_empty() {
            tracing::warn!("ignoring fact with empty content");
            return Ok(AddOutcome::Skipped);
        }

        let _guard = self.lock()?;
        let candidates = self.index.query(content, self.merge_candidates)?;

        for candidate in candidates {
            let request = MergeRequest {
                existing_content: candidate.content.clone(),
                existing_overview: candidate.metadata.source_overview.clone(),
                new_content: content.to_string(),
                new_overview: new_overview.to_string(),
            };
            let decision = merge::parse_decision(&self.oracle.decide(&request));

            let Some(merged) = decision.merged_content() else {
                if decision.merge_decision {
                    tracing::warn!(id = %candidate.id, "merge accepted without merged information, ignoring");
                } else {
                    tracing::debug!(id = %candidate.id, reason = %decision.reason, "no merge");
                }
                continue;
            };

            let mut metadata = candidate.metadata;
            if let Some(overview) = decision.merged_metadata.as_deref().filter(|m| !m.trim().is_empty()) {
                metadata.source_overview = overview.to_string();
            }
            metadata.touch();
            self.index.update(&candidate.id, merged, &metadata)?;

            tracing::info!(id = %candidate.id, reason = %decision.reason, "merged into existing fact");
            return Ok(AddOutcome::Merged {
                id: candidate.id,
                reason: decision.reason,
            });
        }

        let id = uuid::Uuid::now_v7().to_string();
        self.index.add(&id, content, &FactMetadata::new(new_overview))?;
        tracing::info!(id = %id, "added new fact");
        Ok(AddOutcome::Inserted { id })
    }

    /// Ingest extractor output: blank lines dropped, the last line is the
    /// shared overview and every earlier line is a fact.
    pub fn add_facts_from_batch<S: AsRef<str>>(&self, lines: &[S]) -> Result<Vec<AddOutcome>, StoreError> {
        let lines: Vec<&str> = lines
            .iter()
            .map(AsRef::as_ref)
            .filter(|l| !l.trim().is_empty())
            .collect();
        let Some((overview, facts)) = lines.split_last() else {
            return Ok(Vec::new());
        };
        let overview = overview.trim();

        let mut outcomes = Vec::with_capacity(facts.len());
        for fact in facts {
            outcomes.push(self.add_or_update(fact, overview)?);
        }
        tracing::info!(
            facts = facts.len(),
            merged = outcomes.iter().filter(|o| o.is_merge()).count(),
            overview = %overview,
            "batch ingested"
        );
        Ok(outcomes)
    }

    /// The `k` facts nearest to `query`, closest first. Index faults yield an empty list.
    pub fn search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        self.index.query(query, k).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "search failed");
            Vec::new()
        })
    }

    pub fn get_by_id(&self, id: &str) -> Option<Fact> {
        self.index.get(id).unwrap_or_else(|e| {
            tracing::warn!(id = %id, error = %e, "lookup failed");
            None
        })
    }

    /// `true` only if a fact with `id` existed and was removed.
    pub fn delete(&self, id: &str) -> bool {
        let Ok(_guard) = self.lock() else {
            tracing::warn!(id = %id, "store lock poisoned, delete skipped");
            return false;
        };
        match self.index.delete(&[id]) {
            Ok(n) if n > 0 => {
                tracing::info!(id = %id, "deleted fact");
                true
            }
            Ok(_) => false,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "delete failed");
                false
            }
        }
    }

    pub fn list_all(&self) -> Vec<Fact> {
        self.index.get_all().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "listing facts failed");
            Vec::new()
        })
    }

    /// Remove every fact. Returns how many were removed.
    pub fn delete_all(&self) -> usize {
        let Ok(_guard) = self.lock() else {
            tracing::warn!("store lock poisoned, delete_all skipped");
            return 0;
        };
        let ids: Vec<String> = match self.index.get_all() {
            Ok(facts) => facts.into_iter().map(|f| f.id).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "listing facts for delete_all failed");
                return 0;
            }
        };
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        match self.index.delete(&refs) {
            Ok(n) => {
                tracing::info!(count = n, "deleted all facts");
                n
            }
            Err(e) => {
                tracing::warn!(error = %e, "delete_all failed");
                0
            }
        }
    }

    pub fn len(&self) -> usize {
        self.index.count().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "count failed");
            0
        })
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashing::HashingEmbeddingProvider;
    use crate::memory::merge::{ExactMatchOracle, NeverMerge};

    /// Replays canned responses and records every request.
    struct ScriptedOracle {
        responses: Mutex<Vec<String>>,
        fallback: String,
        seen: Arc<Mutex<Vec<MergeRequest>>>,
    }

    impl ScriptedOracle {
        fn always(response: &str) -> (Self, Arc<Mutex<Vec<MergeRequest>>>) {
            Self::script(&[], response)
        }

        fn script(responses: &[&str], fallback: &str) -> (Self, Arc<Mutex<Vec<MergeRequest>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let mut queue: Vec<String> = responses.iter().map(|s| s.to_string()).collect();
            queue.reverse();
            let oracle = Self {
                responses: Mutex::new(queue),
                fallback: fallback.to_string(),
                seen: Arc::clone(&seen),
            };
            (oracle, seen)
        }
    }

    impl MergeOracle for ScriptedOracle {
        fn decide(&self, request: &MergeRequest) -> String {
            self.seen.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    struct BrokenIndex;

    impl EmbeddingIndex for BrokenIndex {
        fn query(&self, _: &str, _: usize) -> Result<Vec<RetrievalResult>, IndexError> {
            Err(IndexError::Embedding("offline".into()))
        }
        fn add(&self, _: &str, _: &str, _: &FactMetadata) -> Result<(), IndexError> {
            Err(IndexError::Embedding("offline".into()))
        }
        fn update(&self, _: &str, _: &str, _: &FactMetadata) -> Result<(), IndexError> {
            Err(IndexError::Embedding("offline".into()))
        }
        fn delete(&self, _: &[&str]) -> Result<usize, IndexError> {
            Err(IndexError::Embedding("offline".into()))
        }
        fn get(&self, _: &str) -> Result<Option<Fact>, IndexError> {
            Err(IndexError::Embedding("offline".into()))
        }
        fn get_all(&self) -> Result<Vec<Fact>, IndexError> {
            Err(IndexError::Embedding("offline".into()))
        }
    }

    const ACCEPT: &str = r#"{"merge_decision": true, "reason": "newer info", "merged_metadata": "merged overview", "merged_information": "Merged statement"}"#;
    const REJECT: &str = r#"{"merge_decision": false, "reason": "different pieces", "merged_metadata": null, "merged_information": null}"#;

    fn store_with(oracle: impl MergeOracle + 'static) -> KnowledgeStore {
        let index = InMemoryIndex::new(Arc::new(HashingEmbeddingProvider::new()));
        KnowledgeStore::new(Box::new(index), Box::new(oracle))
    }

    #[test]
    fn store_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<KnowledgeStore>();
    }

    #[test]
    fn blank_content_is_skipped() {
        let (oracle, seen) = ScriptedOracle::always(ACCEPT);
        let store = store_with(oracle);
        assert_eq!(store.add_fact("   \n", "doc").unwrap(), AddOutcome::Skipped);
        assert!(store.is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn first_fact_is_inserted_without_asking() {
        let (oracle, seen) = ScriptedOracle::always(ACCEPT);
        let store = store_with(oracle);
        let outcome = store.add_fact("Jane Doe was born in 1990", "birth certificate").unwrap();

        let id = outcome.id().unwrap();
        let fact = store.get_by_id(id).unwrap();
        assert_eq!(fact.content, "Jane Doe was born in 1990");
        assert_eq!(fact.metadata.source_overview, "birth certificate");
        assert_eq!(fact.metadata.created_at, fact.metadata.last_updated);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn identical_content_twice_yields_one_fact() {
        let store = store_with(ExactMatchOracle);
        let first = store.add_fact("Passport number is X1234567", "passport").unwrap();
        let second = store.add_fact("Passport number is X1234567", "passport").unwrap();

        assert!(second.is_merge());
        assert_eq!(first.id(), second.id());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unparsable_oracle_output_inserts_new() {
        let (oracle, _) = ScriptedOracle::always("not valid json");
        let store = store_with(oracle);
        store.add_fact("Salary in 2022 was 100k", "W-2 2022").unwrap();
        let outcome = store.add_fact("Salary in 2022 was 100k", "W-2 2022").unwrap();

        assert!(matches!(outcome, AddOutcome::Inserted { .. }));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn merge_rewrites_content_and_overview() {
        let store = store_with(NeverMerge);
        let id = store.add_fact("Salary 2022 was 90k", "W-2 2022").unwrap().id().unwrap().to_string();
        let before = store.get_by_id(&id).unwrap().metadata;

        let store = KnowledgeStore {
            oracle: Box::new(ScriptedOracle::always(ACCEPT).0),
            ..store
        };
        let outcome = store.add_fact("Salary 2023 was 100k", "W-2 2023").unwrap();
        assert_eq!(
            outcome,
            AddOutcome::Merged { id: id.clone(), reason: "newer info".into() }
        );

        let fact = store.get_by_id(&id).unwrap();
        assert_eq!(fact.content, "Merged statement");
        assert_eq!(fact.metadata.source_overview, "merged overview");
        assert_eq!(fact.metadata.created_at, before.created_at);
        assert!(fact.metadata.last_updated >= before.last_updated);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_merged_metadata_keeps_overview() {
        let (oracle, _) = ScriptedOracle::script(
            &[r#"{"merge_decision": true, "reason": "same info", "merged_information": "Lives in Toronto"}"#],
            REJECT,
        );
        let store = store_with(NeverMerge);
        let id = store.add_fact("Lives in Toronto", "lease").unwrap().id().unwrap().to_string();
        let store = KnowledgeStore { oracle: Box::new(oracle), ..store };

        store.add_fact("Resides in Toronto", "utility bill").unwrap();
        assert_eq!(store.get_by_id(&id).unwrap().metadata.source_overview, "lease");
    }

    #[test]
    fn accept_without_merged_information_inserts() {
        let (oracle, _) = ScriptedOracle::always(r#"{"merge_decision": true, "reason": "same"}"#);
        let store = store_with(oracle);
        store.add_fact("a fact", "doc").unwrap();
        let outcome = store.add_fact("a fact", "doc").unwrap();
        assert!(matches!(outcome, AddOutcome::Inserted { .. }));
    }

    #[test]
    fn candidates_are_offered_closest_first_and_stop_at_first_accept() {
        let store = store_with(NeverMerge);
        store.add_fact("annual salary at Acme in 2022", "W-2").unwrap();
        let near = store
            .add_fact("Jane Doe born in Boston in 1990", "birth certificate")
            .unwrap()
            .id()
            .unwrap()
            .to_string();

        let (oracle, seen) = ScriptedOracle::script(&[ACCEPT], REJECT);
        let store = KnowledgeStore { oracle: Box::new(oracle), ..store };
        let outcome = store.add_fact("Jane Doe born Boston", "passport").unwrap();

        assert_eq!(outcome.id(), Some(near.as_str()));
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].existing_content, "Jane Doe born in Boston in 1990");
        assert_eq!(seen[0].new_overview, "passport");
    }

    #[test]
    fn all_rejections_consult_at_most_k_candidates() {
        let store = store_with(NeverMerge);
        for i in 0..4 {
            store.add_fact(&format!("fact number {i}"), "doc").unwrap();
        }
        let (oracle, seen) = ScriptedOracle::always(REJECT);
        let store = KnowledgeStore { oracle: Box::new(oracle), ..store };

        assert!(matches!(store.add_fact("fact number 9", "doc").unwrap(), AddOutcome::Inserted { .. }));
        assert_eq!(seen.lock().unwrap().len(), DEFAULT_MERGE_CANDIDATES);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn batch_uses_last_line_as_overview() {
        let store = store_with(NeverMerge);
        let lines = ["Jane Doe passport number is X1", "", "  ", "Passport expires 2031", "Passport, 2021"];
        let outcomes = store.add_facts_from_batch(&lines).unwrap();

        assert_eq!(outcomes.len(), 2);
        let facts = store.list_all();
        assert_eq!(facts.len(), 2);
        assert!(facts.iter().all(|f| f.metadata.source_overview == "Passport, 2021"));
        assert!(store.add_facts_from_batch(&["only an overview"]).unwrap().is_empty());
        assert!(store.add_facts_from_batch::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn deleted_facts_never_come_back_from_search() {
        let store = store_with(NeverMerge);
        let id = store.add_fact("Phone is 555 0100", "form").unwrap().id().unwrap().to_string();
        store.add_fact("Email is jane@example.com", "form").unwrap();

        assert!(store.delete(&id));
        assert!(!store.delete(&id));
        assert!(store.search("Phone is 555 0100", 5).iter().all(|r| r.id != id));
        assert!(store.get_by_id(&id).is_none());
    }

    #[test]
    fn delete_all_reports_count() {
        let store = store_with(NeverMerge);
        store.add_fact("one", "d").unwrap();
        store.add_fact("two", "d").unwrap();
        assert_eq!(store.delete_all(), 2);
        assert!(store.search("one", 3).is_empty());
    }

    #[test]
    fn index_write_failures_propagate_and_reads_are_absorbed() {
        let store = KnowledgeStore::new(Box::new(BrokenIndex), Box::new(NeverMerge));
        assert!(matches!(store.add_fact("x", "d"), Err(StoreError::Index(_))));
        assert!(store.search("x", 3).is_empty());
        assert!(store.get_by_id("x").is_none());
        assert!(!store.delete("x"));
        assert!(store.list_all().is_empty());
        assert_eq!(store.len(), 0);
    }
}
