//! CLI `chunk` command: split a form submission for classification.

use anyhow::{Context, Result};
use std::path::Path;

use mnemofill::config::MnemoConfig;
use mnemofill::form::{chunk_units, FormSubmission};

use super::read_input;

pub fn chunk(config: &MnemoConfig, path: &Path, budget: Option<usize>) -> Result<()> {
    let raw = read_input(path)?;
    let submission: FormSubmission =
        serde_json::from_str(&raw).context("input is not a form submission object")?;
    let budget = budget.unwrap_or(config.planner.chunk_word_budget);

    let field_count = submission.form_fields.len();
    let chunks = chunk_units(submission.form_fields, &submission.context, budget);

    println!("{}", serde_json::to_string_pretty(&chunks)?);
    eprintln!("{field_count} field(s) in {} chunk(s), budget {budget} words.", chunks.len());
    Ok(())
}
