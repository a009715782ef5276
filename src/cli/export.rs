use anyhow::Result;
use serde::Serialize;

use mnemofill::config::MnemoConfig;
use mnemofill::memory::types::Fact;

use super::{with_store, Backing};

#[derive(Debug, Serialize)]
struct ExportData {
    exported_at: String,
    facts: Vec<Fact>,
}

/// Export every fact as JSON to stdout.
pub async fn export(config: &MnemoConfig) -> Result<()> {
    let facts = with_store(config, Backing::Database, |store| Ok(store.list_all())).await?;
    let data = ExportData {
        exported_at: mnemofill::util::timestamp_now(),
        facts,
    };

    println!("{}", serde_json::to_string_pretty(&data)?);
    eprintln!("Exported {} facts.", data.facts.len());
    Ok(())
}
