//! Merge arbitration between an incoming fact and a stored neighbor.
//!
//! The store asks a [`MergeOracle`] for raw text and parses it with
//! [`parse_decision`]. Anything that does not parse into a [`MergeDecision`]
//! counts as "do not merge".

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::config::OracleConfig;
use crate::util;

/// Reason attached to decisions synthesized from unparsable oracle output.
pub const PARSE_FAILURE_REASON: &str = "Failed to parse AI response";

/// The two (content, overview) pairs an oracle arbitrates.
#[derive(Debug, Clone, Serialize)]
pub struct MergeRequest {
    pub existing_content: String,
    pub existing_overview: String,
    pub new_content: String,
    pub new_overview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeDecision {
    #[serde(default)]
    pub merge_decision: bool,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reason: String,
    #[serde(default, deserialize_with = "lenient_optional_text")]
    pub merged_metadata: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_text")]
    pub merged_information: Option<String>,
}

impl MergeDecision {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            merge_decision: false,
            reason: reason.into(),
            merged_metadata: None,
            merged_information: None,
        }
    }

    /// Merged text, if this decision is an accept with usable content.
    pub fn merged_content(&self) -> Option<&str> {
        if !self.merge_decision {
            return None;
        }
        self.merged_information
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Models sometimes answer with numbers or objects where text is expected.
fn lenient_optional_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient_optional_text(d).map(Option::unwrap_or_default)
}

/// Interpret raw oracle output. Never fails: garbage becomes a rejection.
pub fn parse_decision(raw: &str) -> MergeDecision {
    let Some(value) = util::extract_json_object(raw) else {
        tracing::warn!(response = %raw, "merge oracle returned no JSON object");
        return MergeDecision::rejected(PARSE_FAILURE_REASON);
    };
    match serde_json::from_value(value) {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, "merge oracle JSON did not match the decision shape");
            MergeDecision::rejected(PARSE_FAILURE_REASON)
        }
    }
}

/// Decides whether two facts should become one.
///
/// Implementations return raw text expected to contain a JSON object with
/// `merge_decision`, `reason`, `merged_metadata` and `merged_information`.
/// They should merge overlapping or newer information about the same thing,
/// refuse when the result would exceed about 100 words or the facts are
/// distinct, and keep merged text self-contained.
pub trait MergeOracle: Send + Sync {
    fn decide(&self, request: &MergeRequest) -> String;
}

/// Build an oracle from configuration: `chat`, `exact` or `never`.
pub fn create_oracle(config: &OracleConfig) -> Result<Box<dyn MergeOracle>> {
    match config.provider.as_str() {
        "chat" => Ok(Box::new(ChatMergeOracle::new(config)?)),
        "exact" => Ok(Box::new(ExactMatchOracle)),
        "never" => Ok(Box::new(NeverMerge)),
        other => anyhow::bail!("unknown merge oracle: {other}. Supported: chat, exact, never"),
    }
}

const SYSTEM_PROMPT: &str = "You are an AI assistant tasked with analyzing and merging \
information. Provide your response in valid JSON format.";

fn user_prompt(req: &MergeRequest) -> String {
    format!(
        r#"Existing information: "{existing}"
Existing metadata: {existing_meta}
New information: "{new}"
New metadata: {new_meta}

Analyze these entries for form-filling use. Each entry should be unique, concise, yet contextually complete.

1. Decide if merging is appropriate (same or newer information). When content overlaps, judge whether the extra detail deserves a separate entry given context and length. When entries differ but mean the same thing, use the metadata to decide.
2. If merging, write one combined statement that is precise, brief and self-contained (say whose, what document and which year).
3. Do not merge if the result would exceed 100 words or the entries hold distinct information.

Use plain text for information and metadata. Respond with:
{{"merge_decision": true/false, "reason": "short phrase", "merged_metadata": "updated metadata or null", "merged_information": "combined information or null"}}"#,
        existing = req.existing_content,
        existing_meta = req.existing_overview,
        new = req.new_content,
        new_meta = req.new_overview,
    )
}

/// Asks an OpenAI-compatible chat completions endpoint.
///
/// Transport and HTTP failures are logged and turned into empty output, which
/// the store reads as a rejection.
pub struct ChatMergeOracle {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl ChatMergeOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn complete(&self, request: &MergeRequest) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt(request)},
            ],
        });

        let mut req = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let response = req.send().context("chat request failed")?;
        let status = response.status();
        anyhow::ensure!(status.is_success(), "chat endpoint returned HTTP {status}");

        let payload: Value = response.json().context("chat response was not JSON")?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .context("chat response had no message content")
    }
}

impl MergeOracle for ChatMergeOracle {
    fn decide(&self, request: &MergeRequest) -> String {
        match self.complete(request) {
            Ok(text) => {
                tracing::debug!(
                    existing = %request.existing_content,
                    new = %request.new_content,
                    response = %text,
                    "merge oracle responded"
                );
                text
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "merge oracle unavailable");
                String::new()
            }
        }
    }
}

/// Merges only content that is identical up to case and whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExactMatchOracle;

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl MergeOracle for ExactMatchOracle {
    fn decide(&self, request: &MergeRequest) -> String {
        let decision = if normalize(&request.existing_content) == normalize(&request.new_content) {
            let overview = if request.new_overview.trim().is_empty()
                || request.new_overview == request.existing_overview
            {
                request.existing_overview.clone()
            } else if request.existing_overview.trim().is_empty() {
                request.new_overview.clone()
            } else {
                format!("{}; {}", request.existing_overview, request.new_overview)
            };
            MergeDecision {
                merge_decision: true,
                reason: "same info".into(),
                merged_metadata: Some(overview),
                merged_information: Some(request.existing_content.clone()),
            }
        } else {
            MergeDecision::rejected("different pieces")
        };
        serde_json::to_string(&decision).unwrap_or_default()
    }
}

/// Never merges; every write becomes a new fact.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverMerge;

impl MergeOracle for NeverMerge {
    fn decide(&self, _request: &MergeRequest) -> String {
        r#"{"merge_decision": false, "reason": "merging disabled"}"#.to_string()
    }
}
