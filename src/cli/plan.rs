//! CLI `plan` command: retrieve memories and print filler batches.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use mnemofill::config::MnemoConfig;
use mnemofill::form::retrieval::{retrieve_for_fields, retrieve_for_questions};
use mnemofill::form::{plan_batches, ChunkClassification, FormField, FormSubmission, GeneratedQuestion};

use super::{read_input, with_store, Backing};

/// Accepted shapes for question input.
#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionInput {
    List(Vec<GeneratedQuestion>),
    Classified(ChunkClassification),
}

/// Accepted shapes for field input.
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldInput {
    List(Vec<FormField>),
    Submission(FormSubmission),
}

pub struct PlanArgs<'a> {
    pub path: &'a Path,
    pub fields: bool,
    pub budget: Option<usize>,
    pub per_item: Option<usize>,
}

pub async fn plan(config: &MnemoConfig, args: PlanArgs<'_>) -> Result<()> {
    let raw = read_input(args.path)?;
    let budget = args.budget.unwrap_or(config.planner.batch_word_budget);
    let k = args.per_item.unwrap_or(config.retrieval.question_results);

    let (json, batch_count) = if args.fields {
        let fields = match serde_json::from_str::<FieldInput>(&raw).context("input is not a field list")? {
            FieldInput::List(fields) => fields,
            FieldInput::Submission(s) => s.form_fields,
        };
        with_store(config, Backing::Database, move |store| {
            let batches = plan_batches(retrieve_for_fields(store, &fields, k), budget);
            Ok((serde_json::to_string_pretty(&batches)?, batches.len()))
        })
        .await?
    } else {
        let questions = match serde_json::from_str::<QuestionInput>(&raw).context("input is not a question list")? {
            QuestionInput::List(questions) => questions,
            QuestionInput::Classified(c) if c.form_valid => c.questions,
            QuestionInput::Classified(_) => {
                eprintln!("Form is not valid for filling; nothing to plan.");
                return Ok(());
            }
        };
        with_store(config, Backing::Database, move |store| {
            let batches = plan_batches(retrieve_for_questions(store, &questions, k), budget);
            Ok((serde_json::to_string_pretty(&batches)?, batches.len()))
        })
        .await?
    };

    println!("{json}");
    eprintln!("{batch_count} batch(es), budget {budget} words.");
    Ok(())
}
