//! CLI `doctor` command: run database diagnostics and print a health report.

use anyhow::{Context, Result};

use mnemofill::config::MnemoConfig;
use mnemofill::db;

pub fn doctor(config: &MnemoConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("It is created on the first `mnemofill add` or `mnemofill ingest`.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("mnemofill Health Report");
    println!("=======================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("sqlite-vec:        {}", report.sqlite_vec_version);
    println!();
    println!("Embedding:");
    println!("  Provider:        {}", config.embedding.provider);
    println!("  Stored model:    {}", report.embedding_model.as_deref().unwrap_or("(not set)"));
    let configured = config.embedding.model_id();
    println!("  Configured:      {configured}");
    if report.model_mismatch(&configured) {
        println!("  WARNING: model mismatch; search quality will suffer until facts are re-ingested.");
    }
    println!();
    println!("Merge oracle:      {}", config.oracle.provider);
    println!();
    println!("Row counts:");
    println!("  Facts:           {}", report.fact_count);
    println!("  Vectors:         {}", report.vector_count);
    if !report.vectors_in_sync() {
        println!("  WARNING: fact and vector counts differ.");
    }
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup of {}", db_path.display());
        println!("  2. Or export what is readable, reset, and re-ingest:");
        println!("     mnemofill export > backup.json");
        println!("     mnemofill reset");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
