//! CLI `reset` command: delete all facts after confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use mnemofill::config::MnemoConfig;

use super::{with_store, Backing};

pub async fn reset(config: &MnemoConfig, assume_yes: bool) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !assume_yes {
        println!("WARNING: This will permanently delete ALL stored facts.");
        println!("Database: {}", db_path.display());
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
        if input.trim() != "YES" {
            bail!("reset cancelled");
        }
    }

    let removed = with_store(config, Backing::Database, |store| Ok(store.delete_all())).await?;
    println!("Deleted {removed} fact(s). Database reset complete.");
    Ok(())
}
