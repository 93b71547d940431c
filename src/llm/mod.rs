// src/llm/mod.rs
//! Story sources: where the raw reply comes from.
//!
//! * `openai::OpenAiResponses` — the real agent (Responses API + web_search)
//! * `cache::CachedSource` — same-day disk cache around any source
//! * `file::FileSource` — a saved reply on disk (offline rendering, tests)

pub mod cache;
pub mod file;
pub mod openai;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Token usage as reported by the Responses API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// Raw reply text plus whatever call metadata the source knows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReply {
    pub text: String,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl SourceReply {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            response_id: None,
            model: None,
            usage: None,
        }
    }
}

#[async_trait::async_trait]
pub trait StorySource: Send + Sync {
    async fn fetch(&self, prompt: &str) -> Result<SourceReply>;
    fn name(&self) -> &'static str;
}

/// Build the remote source from config, wrapped in the disk cache when enabled.
pub fn build_remote_source(cfg: &AppConfig, use_cache: bool) -> Result<Box<dyn StorySource>> {
    let provider = openai::OpenAiResponses::from_config(&cfg.llm, &cfg.curation)?;
    if use_cache && cfg.cache.enabled {
        let salt = provider.cache_salt();
        return Ok(Box::new(cache::CachedSource::new(
            provider,
            cfg.cache.dir.clone(),
            salt,
        )));
    }
    Ok(Box::new(provider))
}
