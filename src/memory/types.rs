//! Core fact type definitions.
//!
//! Defines [`Fact`] (a stored knowledge unit), [`FactMetadata`] (its flat
//! provenance mapping), [`RetrievalResult`] (a similarity hit) and
//! [`AddOutcome`] (what a write did).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::util;

/// Flat, string-keyed provenance for a fact.
///
/// The three well-known keys are typed; anything else an index hands back is
/// kept in `extra` and written back unchanged on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactMetadata {
    /// Creation timestamp (`YYYY-MM-DD HH:MM:SS.mmm`, local time).
    pub created_at: String,
    /// Last content change. Never earlier than `created_at`.
    pub last_updated: String,
    /// Free text describing where the fact came from.
    pub source_overview: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl FactMetadata {
    /// Fresh metadata for a fact created now.
    pub fn new(source_overview: impl Into<String>) -> Self {
        let now = util::timestamp_now();
        Self {
            created_at: now.clone(),
            last_updated: now,
            source_overview: source_overview.into(),
            extra: BTreeMap::new(),
        }
    }

    /// Bump `last_updated` to now, keeping it monotonic.
    pub fn touch(&mut self) {
        let now = util::timestamp_now();
        if now > self.last_updated {
            self.last_updated = now;
        }
    }

    /// Human-readable rendering, one `key: value` per line.
    ///
    /// Display only; not meant to be parsed back.
    pub fn render(&self) -> String {
        let mut lines = vec![
            format!("created_at: {}", self.created_at),
            format!("last_updated: {}", self.last_updated),
            format!("source_overview: {}", self.source_overview),
        ];
        lines.extend(self.extra.iter().map(|(k, v)| format!("{k}: {v}")));
        lines.join("\n")
    }

    /// The rendering from `source_overview` onward, dropping timestamps.
    pub fn provenance(&self) -> String {
        let rendered = self.render();
        match rendered.find("source_overview") {
            Some(idx) => rendered[idx..].to_string(),
            None => rendered,
        }
    }
}

/// A stored knowledge unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// UUID v7 (time-sortable).
    pub id: String,
    /// Self-contained statement, ideally at most ~100 words.
    pub content: String,
    pub metadata: FactMetadata,
}

/// A single similarity hit. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: String,
    pub content: String,
    pub metadata: FactMetadata,
    /// Index distance; smaller is closer.
    pub distance: f64,
}

/// Result of a single write through the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    /// A new fact was created.
    Inserted { id: String },
    /// An existing fact absorbed the new content.
    Merged { id: String, reason: String },
    /// Nothing was written (blank content).
    Skipped,
}

impl AddOutcome {
    /// Id of the fact that was written, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Inserted { id } | Self::Merged { id, .. } => Some(id),
            Self::Skipped => None,
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, Self::Merged { .. })
    }
}
