//! Form-filling pipeline around the fact store.
//!
//! - [`chunker`] splits raw form fields for classification
//! - [`retrieval`] attaches memories to questions or fields
//! - [`planner`] groups items and memories into word-budgeted batches
//! - [`answers`] parses classification and filling responses
//!
//! Prompting and the model calls themselves happen outside this crate.

pub mod answers;
pub mod chunker;
pub mod planner;
pub mod retrieval;
pub mod types;

pub use chunker::chunk_units;
pub use planner::plan_batches;
pub use types::{
    Batch, BatchEntry, BatchItem, BatchMemory, Chunk, ChunkClassification, FieldAnswer,
    FilledField, FormContext, FormField, FormSubmission, GeneratedQuestion, Question,
};
