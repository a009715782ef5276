//! CLI `ingest` command: add extractor output, one fact per line.
//!
//! The last non-blank line is the document overview shared by every fact.

use anyhow::Result;
use std::path::PathBuf;

use mnemofill::config::MnemoConfig;

use super::facts::describe;
use super::{read_input, with_store, Backing};

pub async fn ingest(config: &MnemoConfig, backing: Backing, path: PathBuf) -> Result<()> {
    let text = read_input(&path)?;
    let lines: Vec<String> = text.lines().map(str::to_string).collect();

    let outcomes = with_store(config, backing, move |store| Ok(store.add_facts_from_batch(&lines)?)).await?;

    if outcomes.is_empty() {
        println!("Nothing to ingest (need at least one fact line plus an overview line).");
        return Ok(());
    }
    for outcome in &outcomes {
        println!("{}", describe(outcome));
    }
    let merged = outcomes.iter().filter(|o| o.is_merge()).count();
    eprintln!("Ingested {} fact(s), {merged} merged.", outcomes.len());
    Ok(())
}
