pub mod chunk;
pub mod doctor;
pub mod export;
pub mod facts;
pub mod ingest;
pub mod plan;
pub mod reset;
pub mod search;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use mnemofill::config::{EmbeddingConfig, MnemoConfig};
use mnemofill::memory::KnowledgeStore;

const MODEL_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/onnx/model.onnx";
const TOKENIZER_URL: &str =
    "https://huggingface.co/sentence-transformers/all-MiniLM-L6-v2/resolve/main/tokenizer.json";

/// Where facts live for one invocation.
#[derive(Debug, Clone, Copy)]
pub enum Backing {
    Database,
    /// In-memory index; nothing survives the command.
    Ephemeral,
}

impl Backing {
    pub fn from_flag(ephemeral: bool) -> Self {
        if ephemeral {
            Backing::Ephemeral
        } else {
            Backing::Database
        }
    }
}

/// Build the store and run `f` on a blocking thread.
///
/// Model loading, SQLite and the merge oracle are all synchronous.
pub async fn with_store<T, F>(config: &MnemoConfig, backing: Backing, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&KnowledgeStore) -> Result<T> + Send + 'static,
{
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        let store = match backing {
            Backing::Database => KnowledgeStore::open(&config)?,
            Backing::Ephemeral => KnowledgeStore::ephemeral(&config)?,
        };
        f(&store)
    })
    .await
    .context("store task panicked")?
}

/// Read a whole file, or stdin when `path` is `-`.
pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).context("failed to read stdin");
    }
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// First `max` characters of `text`, with an ellipsis if cut.
pub fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Download the ONNX embedding model and tokenizer to the cache directory.
pub async fn model_download(config: &EmbeddingConfig) -> Result<()> {
    let cache_dir = mnemofill::config::expand_tilde(&config.cache_dir);
    std::fs::create_dir_all(&cache_dir)
        .with_context(|| format!("failed to create cache dir: {}", cache_dir.display()))?;

    for (name, url) in [("model.onnx", MODEL_URL), ("tokenizer.json", TOKENIZER_URL)] {
        let dest = cache_dir.join(name);
        if dest.exists() {
            println!("{name} already exists at {}", dest.display());
            continue;
        }
        println!("Downloading {name}...");
        download_file(url, &dest).await?;
        println!("Saved to {}", dest.display());
    }

    println!("Model download complete. Ready for use.");
    Ok(())
}

/// Stream `url` into `dest` through a temp file, renamed once complete.
async fn download_file(url: &str, dest: &PathBuf) -> Result<()> {
    let mut response = reqwest::get(url)
        .await
        .with_context(|| format!("HTTP request failed for {url}"))?;

    anyhow::ensure!(
        response.status().is_success(),
        "download failed with HTTP {}",
        response.status()
    );

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("  {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
                    .context("invalid progress template")?
                    .progress_chars("##-"),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };

    let tmp_path = dest.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp_path)
        .await
        .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;

    while let Some(chunk) = response.chunk().await.context("error reading response")? {
        file.write_all(&chunk).await.context("error writing to file")?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, dest)
        .await
        .context("failed to rename temp file")?;

    pb.finish_and_clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_cuts_on_char_boundaries() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("café au lait", 4), "café...");
    }

    fn offline_config(dir: &Path) -> MnemoConfig {
        let mut config = MnemoConfig::default();
        config.storage.db_path = dir.join("facts.db").to_string_lossy().into_owned();
        config.embedding.provider = "hashing".into();
        config.oracle.provider = "never".into();
        config
    }

    #[tokio::test]
    async fn ephemeral_backing_leaves_database_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let config = offline_config(dir.path());

        with_store(&config, Backing::Database, |store| {
            Ok(store.add_fact("Phone number is 555 0100", "profile")?)
        })
        .await
        .unwrap();

        let (added, removed) = with_store(&config, Backing::from_flag(true), |store| {
            let added = store.add_fact("Born in Boston", "certificate")?;
            Ok((added, store.delete_all()))
        })
        .await
        .unwrap();
        assert!(!added.is_merge());
        assert_eq!(removed, 1);

        let facts = with_store(&config, Backing::from_flag(false), |store| Ok(store.list_all()))
            .await
            .unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].content, "Phone number is 555 0100");
    }

    #[test]
    fn read_input_reports_missing_file() {
        let err = read_input(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
