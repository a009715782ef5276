//! Data shapes exchanged with the classification and filling steps.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::memory::types::{FactMetadata, RetrievalResult};
use crate::util;

/// A question produced for one form field by the classification step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub field_name: String,
    pub question: String,
}

/// A question with a stable id (its position in the classified list).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub field_name: String,
    pub id: usize,
}

/// A raw form field as scraped from the page. Usually carries `id` and `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormField(pub Value);

impl FormField {
    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Text used to look up memories: the name, else the id, else the whole field.
    pub fn query_text(&self) -> String {
        match self.name().or(self.id()).filter(|s| !s.trim().is_empty()) {
            Some(text) => text.to_string(),
            None => self.0.to_string(),
        }
    }
}

/// Page-level context repeated on every chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormContext {
    pub website_overview: Value,
    pub comment: String,
    pub url: String,
}

/// What the browser side posts: the fields plus their context.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FormSubmission {
    #[serde(rename = "formFields")]
    pub form_fields: Vec<FormField>,
    #[serde(flatten)]
    pub context: FormContext,
}

/// A slice of form units small enough for one classification call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chunk<T> {
    #[serde(rename = "formFields")]
    pub units: Vec<T>,
    #[serde(flatten)]
    pub context: FormContext,
}

/// Parsed response of the classification step for one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkClassification {
    pub form_valid: bool,
    pub questions: Vec<GeneratedQuestion>,
}

/// An item to answer together with the memories retrieved for it.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem<T> {
    pub item: T,
    pub memories: Vec<RetrievalResult>,
}

/// A memory as handed to the filler. The id is dropped; dedup already happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchMemory {
    pub content: String,
    pub metadata: Value,
}

/// Items that can be planned into batches.
pub trait BatchEntry: Serialize {
    /// Key the items are serialized under.
    const KEY: &'static str;

    fn word_cost(&self) -> usize;

    /// How a memory's metadata is presented next to items of this kind.
    fn memory_metadata(metadata: &FactMetadata) -> Value;
}

impl BatchEntry for Question {
    const KEY: &'static str = "questions";

    fn word_cost(&self) -> usize {
        util::word_count(&self.question)
    }

    fn memory_metadata(metadata: &FactMetadata) -> Value {
        Value::String(metadata.provenance())
    }
}

impl BatchEntry for FormField {
    const KEY: &'static str = "fields";

    fn word_cost(&self) -> usize {
        util::json_word_cost(self)
    }

    fn memory_metadata(metadata: &FactMetadata) -> Value {
        Value::String(metadata.render())
    }
}

/// One unit of work for the filler.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub memories: Vec<BatchMemory>,
    /// Word cost charged against the budget while planning.
    pub word_count: usize,
}

impl<T> Batch<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            memories: Vec::new(),
            word_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.memories.is_empty()
    }
}

impl<T: BatchEntry> Serialize for Batch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(T::KEY, &self.items)?;
        map.serialize_entry("memories", &self.memories)?;
        map.end()
    }
}

/// Answer for one raw field from the filling step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldAnswer {
    pub id: String,
    pub name: String,
    pub answer: Option<String>,
}

/// Answer routed back to the field a question was generated for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilledField {
    pub field_name: String,
    pub answer: Option<String>,
}
