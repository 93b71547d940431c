// src/llm/file.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;

use super::{SourceReply, StorySource};

/// Replays a reply saved on disk (e.g. from `--raw-out`). The prompt is ignored.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl StorySource for FileSource {
    async fn fetch(&self, _prompt: &str) -> Result<SourceReply> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading stories from {}", self.path.display()))?;
        tracing::info!(target: "llm", path = %self.path.display(), bytes = text.len(), "reply loaded from file");
        Ok(SourceReply::from_text(text))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
