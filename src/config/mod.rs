// src/config/mod.rs
//! Application config: one TOML file with a section per pipeline stage.
//! Every field has a default, so a missing file still yields a runnable setup.

pub mod llm;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::curate::CurationConfig;
use crate::feed::FeedMeta;
use crate::llm::cache::CacheConfig;
use crate::topics::TopicsConfig;
pub use llm::LlmConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/late_news.toml";
pub const ENV_CONFIG_PATH: &str = "LATE_NEWS_CONFIG_PATH";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedMeta,
    pub llm: LlmConfig,
    pub curation: CurationConfig,
    pub cache: CacheConfig,
    pub topics: TopicsConfig,
}

impl AppConfig {
    /// Parse a TOML document and sanitize it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing late-news config")?;
        cfg.sanitize()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let cfg = Self::from_toml_str(&content)
            .with_context(|| format!("in config file {}", path.display()))?;
        info!(target: "config", path = %path.display(), "config loaded");
        Ok(cfg)
    }

    /// Resolve the config path with fallbacks:
    /// 1) explicit path (CLI flag)
    /// 2) $LATE_NEWS_CONFIG_PATH
    /// 3) config/late_news.toml
    /// 4) built-in defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(p) = explicit {
            return Self::load_from(p);
        }
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        info!(target: "config", "no config file found, using defaults");
        let mut cfg = AppConfig::default();
        cfg.sanitize()?;
        Ok(cfg)
    }

    pub fn sanitize(&mut self) -> Result<()> {
        self.llm.sanitize()?;
        self.curation.sanitize();
        Ok(())
    }
}
