use anyhow::Result;

use mnemofill::config::MnemoConfig;

use super::{preview, with_store, Backing};

/// Run a similarity search from the terminal.
pub async fn search(config: &MnemoConfig, query: String, limit: Option<usize>, json: bool) -> Result<()> {
    let k = limit.unwrap_or(config.retrieval.search_results);
    let results = with_store(config, Backing::Database, move |store| Ok(store.search(&query, k))).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", results.len());
    for (i, result) in results.iter().enumerate() {
        println!("  {}. {} (distance: {:.4})", i + 1, result.id, result.distance);
        println!("     {}", preview(&result.content, 120));
        println!("     [{}]", result.metadata.source_overview);
        println!();
    }
    Ok(())
}
