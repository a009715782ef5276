//! CLI `add`, `show`, `delete` and `list` commands.

use anyhow::{bail, Result};

use mnemofill::config::MnemoConfig;
use mnemofill::memory::types::AddOutcome;

use super::{preview, with_store, Backing};

pub fn describe(outcome: &AddOutcome) -> String {
    match outcome {
        AddOutcome::Inserted { id } => format!("added      {id}"),
        AddOutcome::Merged { id, reason } => format!("merged     {id} ({reason})"),
        AddOutcome::Skipped => "skipped    (empty content)".to_string(),
    }
}

pub async fn add(config: &MnemoConfig, backing: Backing, content: String, overview: String) -> Result<()> {
    let outcome = with_store(config, backing, move |store| {
        Ok(store.add_fact(&content, &overview)?)
    })
    .await?;
    println!("{}", describe(&outcome));
    Ok(())
}

pub async fn show(config: &MnemoConfig, id: String) -> Result<()> {
    let fact = with_store(config, Backing::Database, move |store| Ok(store.get_by_id(&id))).await?;
    let Some(fact) = fact else {
        bail!("no fact with that id");
    };

    println!("Fact: {}", fact.id);
    println!("{}", "=".repeat(50));
    for line in fact.metadata.render().lines() {
        println!("  {line}");
    }
    println!();
    println!("Content:");
    println!("  {}", fact.content);
    Ok(())
}

pub async fn delete(config: &MnemoConfig, id: String) -> Result<()> {
    let target = id.clone();
    let removed = with_store(config, Backing::Database, move |store| Ok(store.delete(&target))).await?;
    if !removed {
        bail!("no fact deleted for {id}");
    }
    println!("Deleted {id}");
    Ok(())
}

pub async fn list(config: &MnemoConfig, json: bool) -> Result<()> {
    let facts = with_store(config, Backing::Database, |store| Ok(store.list_all())).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
        return Ok(());
    }
    if facts.is_empty() {
        println!("No facts stored.");
        return Ok(());
    }
    for fact in &facts {
        println!("{}  {}", fact.id, preview(&fact.content, 80));
        println!("    {}", fact.metadata.source_overview);
    }
    println!("\n{} fact(s)", facts.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcomes_describe_themselves() {
        assert!(describe(&AddOutcome::Inserted { id: "x".into() }).starts_with("added"));
        assert!(describe(&AddOutcome::Merged { id: "x".into(), reason: "same info".into() })
            .ends_with("(same info)"));
        assert!(describe(&AddOutcome::Skipped).contains("empty"));
    }
}
