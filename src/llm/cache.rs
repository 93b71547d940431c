// src/llm/cache.rs
//! Same-day reply cache. Keyed by SHA-256 over (salt, prompt, UTC day), so a rerun
//! on the same day with the same prompt and settings does not pay for another
//! web-search call. Only replies that parse as a story array are stored.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{SourceReply, StorySource};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("cache/llm"),
        }
    }
}

pub struct CachedSource<S: StorySource> {
    inner: S,
    dir: PathBuf,
    salt: String,
}

impl<S: StorySource> CachedSource<S> {
    pub fn new(inner: S, dir: PathBuf, salt: String) -> Self {
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(target: "llm", dir = %dir.display(), error = %e, "cannot create cache dir");
        }
        Self { inner, dir, salt }
    }

    pub fn key_for(&self, prompt: &str, day: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update([0u8]);
        hasher.update(prompt.as_bytes());
        hasher.update([0u8]);
        hasher.update(day.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

fn read_cached(path: &Path) -> Option<SourceReply> {
    let s = fs::read_to_string(path).ok()?;
    serde_json::from_str(&s).ok()
}

fn write_cached(path: &Path, reply: &SourceReply) -> Result<()> {
    let json = serde_json::to_vec(reply)?;
    crate::feed::write_atomic(path, &json)
}

#[async_trait]
impl<S: StorySource> StorySource for CachedSource<S> {
    async fn fetch(&self, prompt: &str) -> Result<SourceReply> {
        let day = Utc::now().format("%Y-%m-%d").to_string();
        let key = self.key_for(prompt, &day);
        let path = self.path_for(&key);

        if let Some(hit) = read_cached(&path) {
            counter!("late_news_cache_hits_total").increment(1);
            info!(target: "llm", key = %&key[..12], "reply served from cache");
            return Ok(hit);
        }

        let fresh = self.inner.fetch(prompt).await?;
        if crate::story::parse_reply(&fresh.text).is_ok() {
            match write_cached(&path, &fresh) {
                Ok(()) => debug!(target: "llm", key = %&key[..12], "reply cached"),
                Err(e) => warn!(target: "llm", error = %format!("{e:#}"), "failed to write reply cache"),
            }
        }
        Ok(fresh)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
