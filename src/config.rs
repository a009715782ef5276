use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::form::chunker::DEFAULT_CHUNK_WORD_BUDGET;
use crate::form::planner::DEFAULT_BATCH_WORD_BUDGET;
use crate::form::retrieval::DEFAULT_MEMORIES_PER_ITEM;
use crate::memory::store::DEFAULT_MERGE_CANDIDATES;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MnemoConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub oracle: OracleConfig,
    pub retrieval: RetrievalConfig,
    pub planner: PlannerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `local` (ONNX) or `hashing`.
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OracleConfig {
    /// `chat`, `exact` or `never`.
    pub provider: String,
    /// Root of an OpenAI-compatible API, without `/chat/completions`.
    pub base_url: String,
    pub model: String,
    /// Falls back to `OPENAI_API_KEY` when empty.
    pub api_key: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Nearest facts offered to the merge oracle per insert.
    pub merge_candidates: usize,
    pub search_results: usize,
    /// Memories attached to each question or field before planning.
    pub question_results: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PlannerConfig {
    pub chunk_word_budget: usize,
    pub batch_word_budget: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_mnemofill_dir()
            .join("facts.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl EmbeddingConfig {
    /// Identifier stored with the vectors, e.g. `local:all-MiniLM-L6-v2`.
    /// Hashed vectors do not depend on `model`.
    pub fn model_id(&self) -> String {
        match self.provider.as_str() {
            "hashing" => crate::embedding::hashing::HASHING_MODEL_ID.to_string(),
            provider => format!("{provider}:{}", self.model),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_mnemofill_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: "chat".into(),
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: String::new(),
            timeout_secs: 60,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            merge_candidates: DEFAULT_MERGE_CANDIDATES,
            search_results: 5,
            question_results: DEFAULT_MEMORIES_PER_ITEM,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            chunk_word_budget: DEFAULT_CHUNK_WORD_BUDGET,
            batch_word_budget: DEFAULT_BATCH_WORD_BUDGET,
        }
    }
}

/// Returns `~/.mnemofill/`, or `./.mnemofill` when no home directory is known.
pub fn default_mnemofill_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mnemofill")
}

/// Returns `~/.mnemofill/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnemofill_dir().join("config.toml")
}

impl MnemoConfig {
    /// Load config from the default path (if it exists), then apply env overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            MnemoConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// MNEMOFILL_DB, MNEMOFILL_LOG_LEVEL, MNEMOFILL_ORACLE, OPENAI_API_KEY.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMOFILL_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MNEMOFILL_LOG_LEVEL") {
            self.logging.log_level = val;
        }
        if let Ok(val) = std::env::var("MNEMOFILL_ORACLE") {
            self.oracle.provider = val;
        }
        if self.oracle.api_key.is_empty() {
            if let Ok(val) = std::env::var("OPENAI_API_KEY") {
                self.oracle.api_key = val;
            }
        }
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
