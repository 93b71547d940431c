// src/config/llm.rs
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_MODEL: &str = "LATE_NEWS_MODEL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Only "openai" (any OpenAI-compatible Responses endpoint) is supported.
    pub provider: String,
    pub model: String,
    pub api_base: String,
    /// "ENV" means: read from OPENAI_API_KEY at request time.
    pub api_key: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Retries after the first attempt; 0 disables retrying.
    pub max_retries: u8,
    /// Attach the built-in `web_search` tool to the request.
    pub web_search: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-5".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: "ENV".to_string(),
            timeout_secs: 180,
            connect_timeout_secs: 10,
            max_retries: 3,
            web_search: true,
        }
    }
}

impl LlmConfig {
    /// Normalize provider, apply env overrides and sanity-check numbers.
    pub fn sanitize(&mut self) -> Result<()> {
        self.provider = self.provider.trim().to_lowercase();
        if self.provider != "openai" {
            bail!("Unsupported provider in config: {}", self.provider);
        }

        if let Ok(base) = env::var(ENV_OPENAI_BASE_URL) {
            if !base.trim().is_empty() {
                self.api_base = base.trim().to_string();
            }
        }
        if let Ok(model) = env::var(ENV_MODEL) {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        self.api_base = self.api_base.trim_end_matches('/').to_string();

        if self.timeout_secs == 0 {
            self.timeout_secs = Self::default().timeout_secs;
        }
        if self.connect_timeout_secs == 0 {
            self.connect_timeout_secs = Self::default().connect_timeout_secs;
        }
        Ok(())
    }

    /// Resolve the API key, reading the environment when the config says "ENV".
    pub fn resolved_api_key(&self) -> Result<String> {
        let key = if self.api_key.trim().eq_ignore_ascii_case("env") {
            env::var(ENV_OPENAI_API_KEY)
                .map_err(|_| anyhow!("Missing {ENV_OPENAI_API_KEY} env var"))?
        } else {
            self.api_key.clone()
        };
        if key.trim().is_empty() {
            bail!("LLM API key is empty");
        }
        Ok(key.trim().to_string())
    }

    pub fn responses_url(&self) -> String {
        format!("{}/responses", self.api_base)
    }
}
