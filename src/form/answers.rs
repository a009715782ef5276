//! Parsing of model responses from the classification and filling steps.
//!
//! Responses are free text that should contain one JSON object. Anything that
//! does not fit the expected shape is logged and treated as empty.

use std::collections::BTreeMap;

use serde_json::Value;

use super::types::{ChunkClassification, FieldAnswer, FilledField, Question};
use crate::util;

/// Answers keyed by question id. `None` means the filler declined to answer.
pub type QuestionAnswers = BTreeMap<usize, Option<String>>;

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Combine per-chunk classification responses.
///
/// The form is valid if any chunk says so; questions are concatenated from
/// valid chunks only, in chunk order. Unparsable responses are skipped.
pub fn combine_classifications<S: AsRef<str>>(responses: &[S]) -> ChunkClassification {
    let mut combined = ChunkClassification::default();
    for (i, raw) in responses.iter().enumerate() {
        let parsed = util::extract_json_object(raw.as_ref())
            .and_then(|v| serde_json::from_value::<ChunkClassification>(v).ok());
        let Some(result) = parsed else {
            tracing::warn!(chunk = i, "unparsable classification response, skipping");
            continue;
        };
        if result.form_valid {
            combined.form_valid = true;
            combined.questions.extend(result.questions);
        }
    }
    combined
}

/// Parse `{"answer": [{"id": .., "content": ..}]}`.
pub fn parse_question_answers(raw: &str) -> QuestionAnswers {
    let Some(value) = util::extract_json_object(raw) else {
        tracing::warn!("filler response had no JSON object");
        return QuestionAnswers::new();
    };
    let Some(entries) = value.get("answer").and_then(Value::as_array) else {
        tracing::warn!("filler response missing an `answer` list");
        return QuestionAnswers::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = match entry.get("id")? {
                Value::Number(n) => n.as_u64()? as usize,
                Value::String(s) => s.trim().parse().ok()?,
                _ => return None,
            };
            let answer = entry.get("content").and_then(text_of);
            Some((id, answer))
        })
        .collect()
}

/// Parse `{"form": [{"id": .., "name": .., "answer": ..}]}`.
pub fn parse_field_answers(raw: &str) -> Vec<FieldAnswer> {
    let entries = util::extract_json_object(raw)
        .and_then(|v| v.get("form").and_then(Value::as_array).cloned());
    let Some(entries) = entries else {
        tracing::warn!("filler response missing a `form` list");
        return Vec::new();
    };

    entries
        .iter()
        .filter(|e| e.is_object())
        .map(|entry| FieldAnswer {
            id: entry.get("id").and_then(text_of).unwrap_or_default(),
            name: entry.get("name").and_then(text_of).unwrap_or_default(),
            answer: entry.get("answer").and_then(text_of),
        })
        .collect()
}

/// Route answers back to the fields their questions were generated for,
/// in question order. Questions the filler did not mention are omitted.
pub fn merge_answers(questions: &[Question], answers: &QuestionAnswers) -> Vec<FilledField> {
    questions
        .iter()
        .filter_map(|q| {
            answers.get(&q.id).map(|answer| FilledField {
                field_name: q.field_name.clone(),
                answer: answer.clone(),
            })
        })
        .collect()
}
