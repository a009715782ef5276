//! Semantic fact memory for automatic form filling.
//!
//! mnemofill keeps a store of short, self-contained facts about a user and
//! feeds them to a form-filling model in bounded pieces. Every incoming fact
//! is compared with its nearest stored neighbors and a merge oracle decides
//! whether it updates one of them or becomes a new entry, so the store stays
//! free of near-duplicates.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for nearest-neighbor search, or an in-memory index for scratch runs
//! - **Embeddings**: local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions),
//!   or deterministic feature hashing when no model is available
//! - **Merging**: an OpenAI-compatible chat endpoint, or a local exact-match rule
//! - **Planning**: greedy word-budgeted chunking and batching, order preserving
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations and health checks
//! - [`embedding`]: text-to-vector providers
//! - [`index`]: the nearest-neighbor index seam and its implementations
//! - [`memory`]: facts, merge arbitration and the [`memory::KnowledgeStore`]
//! - [`form`]: chunking, retrieval, batch planning and answer parsing
//! - [`util`]: timestamps, word counts and JSON helpers

pub mod config;
pub mod db;
pub mod embedding;
pub mod form;
pub mod index;
pub mod memory;
pub mod util;
