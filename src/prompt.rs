// src/prompt.rs
//! Prompt document loading plus the fixed system instruction and output schema
//! sent alongside it.

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;

use crate::curate::CurationConfig;
use crate::story::REQUIRED_KEYS;

/// Read the prompt document. The path must be an existing regular file with
/// non-blank UTF-8 content.
pub fn load_prompt(path: &Path) -> Result<String> {
    if !path.is_file() {
        bail!("Prompt file not found: {}", path.display());
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading prompt file {}", path.display()))?;
    if text.trim().is_empty() {
        bail!("Prompt file is empty: {}", path.display());
    }
    Ok(text)
}

fn join_teams(teams: &[String]) -> String {
    match teams {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// The system message that frames the user prompt.
pub fn system_instruction(cfg: &CurationConfig) -> String {
    let sports = if cfg.favourite_teams.is_empty() {
        "and NBA/MLB".to_string()
    } else {
        format!(
            "and NBA/MLB with slight emphasis on the {}",
            join_teams(&cfg.favourite_teams)
        )
    };
    format!(
        "You must use web search before answering. Find {count} recent news articles \
         (last {days} days) emphasizing: how people are using AI, especially in \
         education, content creation and blogging, US politics, science; {sports}. \
         De-duplicate domains and topics: at most one story per source domain unless \
         the topics are clearly distinct. Return only JSON, no prose. Use canonical \
         article URLs that resolve to real articles, never placeholders. \
         Each item must be: {{\"title\",\"url\",\"summary\",\"published\"}} with a one or \
         two sentence summary and published as ISO 8601 UTC \"YYYY-MM-DDTHH:MM:SSZ\".",
        count = cfg.target_count,
        days = cfg.max_age_days,
    )
}

/// JSON schema of the story array.
pub fn output_schema(cfg: &CurationConfig) -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "required": REQUIRED_KEYS,
            "properties": {
                "title": { "type": "string" },
                "url": { "type": "string", "format": "uri" },
                "summary": { "type": "string" },
                "published": {
                    "type": "string",
                    "pattern": r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}Z$"
                }
            },
            "additionalProperties": false
        },
        "minItems": cfg.min_items,
        "maxItems": cfg.max_items
    })
}

/// Non-fatal prompt findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptLint {
    MissingKey(&'static str),
}

/// Check that the prompt mentions every output key literally.
pub fn lint_prompt(text: &str) -> Vec<PromptLint> {
    REQUIRED_KEYS
        .iter()
        .copied()
        .filter(|k| !text.contains(k))
        .map(PromptLint::MissingKey)
        .collect()
}
