// src/pipeline.rs
//! One run: prompt → source → parse/validate → curate → feed.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use metrics::counter;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::curate::curate;
use crate::feed::{write_atomic, write_feed, write_json};
use crate::llm::StorySource;
use crate::prompt::{lint_prompt, load_prompt, PromptLint};
use crate::story::{parse_reply, validate_all, Story};
use crate::telemetry::ensure_metrics_described;
use crate::topics::TopicMatcher;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Required unless the source ignores the prompt (file replay).
    pub prompt_file: Option<PathBuf>,
    pub out: PathBuf,
    pub json_out: Option<PathBuf>,
    pub raw_out: Option<PathBuf>,
    /// Evaluate recency against this instant instead of the wall clock.
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub received: usize,
    pub invalid: usize,
    pub stale: usize,
    pub duplicate_url: usize,
    pub duplicate_domain: usize,
    pub trimmed: usize,
    pub written: usize,
    pub out: PathBuf,
    pub response_id: Option<String>,
}

pub struct Pipeline {
    cfg: AppConfig,
    source: Box<dyn StorySource>,
    matcher: TopicMatcher,
}

impl Pipeline {
    pub fn new(cfg: AppConfig, source: Box<dyn StorySource>) -> Result<Self> {
        let matcher = TopicMatcher::from_config(&cfg.topics, &cfg.curation.favourite_teams)?;
        Ok(Self {
            cfg,
            source,
            matcher,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.cfg
    }

    /// Pure part of a run: reply text → curated stories. No I/O.
    pub fn process(&self, reply_text: &str, now: DateTime<Utc>) -> Result<(Vec<Story>, RunReport)> {
        let cur = &self.cfg.curation;
        let raws = parse_reply(reply_text).inspect_err(|_| {
            tracing::debug!(target: "story", raw = reply_text, "unparsable reply");
        })?;

        let mut report = RunReport {
            received: raws.len(),
            ..RunReport::default()
        };
        counter!("late_news_stories_received_total").increment(raws.len() as u64);

        let (valid, rejected) = validate_all(&raws, cur.max_summary_sentences, cur.strict)?;
        report.invalid = rejected.len();
        counter!("late_news_stories_rejected_total").increment(rejected.len() as u64);

        let curated = curate(valid, now, cur, &self.matcher);
        report.stale = curated.stale;
        report.duplicate_url = curated.duplicate_url;
        report.duplicate_domain = curated.duplicate_domain;
        report.trimmed = curated.trimmed;
        counter!("late_news_stories_dropped_total").increment(
            (curated.stale + curated.duplicate_url + curated.duplicate_domain + curated.trimmed)
                as u64,
        );

        let stories = curated.stories;
        if stories.is_empty() {
            bail!(
                "no usable stories in reply ({} received, {} invalid, {} stale)",
                report.received,
                report.invalid,
                report.stale
            );
        }
        if stories.len() < cur.min_items {
            if cur.strict {
                bail!(
                    "only {} stories left after curation, need at least {}",
                    stories.len(),
                    cur.min_items
                );
            }
            warn!(
                target: "curate",
                kept = stories.len(),
                min_items = cur.min_items,
                "fewer stories than requested minimum"
            );
        }
        Ok((stories, report))
    }

    pub async fn run(&self, opts: &RunOptions) -> Result<RunReport> {
        ensure_metrics_described();

        let prompt = match &opts.prompt_file {
            Some(p) => {
                let text = load_prompt(p)?;
                for lint in lint_prompt(&text) {
                    match lint {
                        PromptLint::MissingKey(k) => {
                            warn!(target: "prompt", key = k, "prompt does not mention output key")
                        }
                    }
                }
                text
            }
            None => String::new(),
        };

        info!(target: "pipeline", source = self.source.name(), out = %opts.out.display(), "run started");
        let reply = self
            .source
            .fetch(&prompt)
            .await
            .with_context(|| format!("fetching stories from {}", self.source.name()))?;

        if let Some(raw_out) = &opts.raw_out {
            write_atomic(raw_out, reply.text.as_bytes())?;
            info!(target: "pipeline", path = %raw_out.display(), "raw reply saved");
        }

        let now = opts.as_of.unwrap_or_else(Utc::now);
        let (stories, mut report) = self.process(&reply.text, now)?;

        write_feed(&opts.out, &self.cfg.feed, &stories, Utc::now())?;
        if let Some(json_out) = &opts.json_out {
            write_json(json_out, &stories)?;
        }
        counter!("late_news_stories_written_total").increment(stories.len() as u64);

        report.written = stories.len();
        report.out = opts.out.clone();
        report.response_id = reply.response_id;

        info!(
            target: "pipeline",
            received = report.received,
            invalid = report.invalid,
            stale = report.stale,
            duplicate_url = report.duplicate_url,
            duplicate_domain = report.duplicate_domain,
            trimmed = report.trimmed,
            written = report.written,
            "run finished"
        );
        Ok(report)
    }
}
