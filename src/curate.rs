// src/curate.rs
//! Curation of validated stories:
//!
//! 1. recency window (`max_age_days`, `future_skew_minutes`)
//! 2. exact duplicates by canonical URL
//! 3. domain policy: at most `max_per_domain` per domain unless topics are clearly distinct
//! 4. ranking by topic score then recency, capped at `target_count`, emitted newest first
//!
//! Same-domain similarity uses `strsim::normalized_levenshtein` over lowercased titles.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use strsim::normalized_levenshtein;
use url::Url;

use crate::story::Story;
use crate::topics::{TopicMatch, TopicMatcher};

/// Upper bounds applied by `sanitize`; larger windows are not meaningful for a news feed.
pub const MAX_AGE_DAYS_LIMIT: i64 = 3650;
pub const FUTURE_SKEW_MINUTES_LIMIT: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurationConfig {
    pub target_count: usize,
    pub min_items: usize,
    pub max_items: usize,
    pub max_age_days: i64,
    pub future_skew_minutes: i64,
    pub max_per_domain: usize,
    /// Same-domain titles at or above this similarity are never "distinct".
    pub distinct_title_threshold: f32,
    pub max_summary_sentences: usize,
    /// Teams the system instruction asks to slightly favour.
    pub favourite_teams: Vec<String>,
    pub strict: bool,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            target_count: 20,
            min_items: 5,
            max_items: 25,
            max_age_days: 30,
            future_skew_minutes: 60,
            max_per_domain: 1,
            distinct_title_threshold: 0.6,
            max_summary_sentences: 2,
            favourite_teams: vec!["New York Knicks".to_string(), "New York Mets".to_string()],
            strict: false,
        }
    }
}

impl CurationConfig {
    /// Keep `1 <= min_items <= target_count <= max_items` and thresholds in range.
    pub fn sanitize(&mut self) {
        let d = Self::default();
        if self.target_count == 0 {
            self.target_count = d.target_count;
        }
        if self.max_items < self.target_count {
            self.max_items = self.target_count;
        }
        self.min_items = self.min_items.clamp(1, self.target_count);
        if self.max_age_days <= 0 {
            self.max_age_days = d.max_age_days;
        }
        self.max_age_days = self.max_age_days.min(MAX_AGE_DAYS_LIMIT);
        self.future_skew_minutes = self.future_skew_minutes.clamp(0, FUTURE_SKEW_MINUTES_LIMIT);
        self.max_per_domain = self.max_per_domain.max(1);
        if !(0.0..=1.0).contains(&self.distinct_title_threshold) {
            self.distinct_title_threshold = d.distinct_title_threshold;
        }
        if self.max_summary_sentences == 0 {
            self.max_summary_sentences = d.max_summary_sentences;
        }
    }
}

/// Output of one curation pass with per-stage drop counts.
#[derive(Debug, Clone, Default)]
pub struct Curated {
    pub stories: Vec<Story>,
    pub stale: usize,
    pub duplicate_url: usize,
    pub duplicate_domain: usize,
    pub trimmed: usize,
}

/// Canonical form used for exact-duplicate detection.
pub fn canonical_url(url: &Url) -> String {
    let mut u = url.clone();
    u.set_fragment(None);

    let kept: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            !(k.starts_with("utm_") || k == "fbclid" || k == "gclid" || k == "mc_cid")
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        u.set_query(None);
    } else {
        u.query_pairs_mut().clear().extend_pairs(kept);
    }

    let path = u.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        u.set_path(path.trim_end_matches('/'));
    }

    let mut s = u.to_string();
    while s.ends_with('/') {
        s.pop();
    }
    s
}

/// Domain key: lowercased host without `www.`, `m.`, `amp.`, `mobile.` prefixes.
pub fn domain_key(url: &Url) -> String {
    let mut host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    for prefix in ["www.", "m.", "amp.", "mobile."] {
        if let Some(rest) = host.strip_prefix(prefix) {
            host = rest.to_string();
            break;
        }
    }
    host
}

pub fn curate(
    stories: Vec<Story>,
    now: DateTime<Utc>,
    cfg: &CurationConfig,
    matcher: &TopicMatcher,
) -> Curated {
    let mut out = Curated::default();

    // 1) Recency window. An unrepresentable bound means no bound on that side.
    let oldest = Duration::try_days(cfg.max_age_days).and_then(|d| now.checked_sub_signed(d));
    let newest =
        Duration::try_minutes(cfg.future_skew_minutes).and_then(|d| now.checked_add_signed(d));
    let mut fresh = Vec::with_capacity(stories.len());
    for s in stories {
        let too_old = oldest.is_some_and(|o| s.published < o);
        let too_new = newest.is_some_and(|n| s.published > n);
        if too_old || too_new {
            tracing::debug!(target: "curate", url = %s.url, published = %s.published, "stale story");
            out.stale += 1;
            continue;
        }
        fresh.push(s);
    }

    // 2) Exact URL duplicates (first wins).
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(fresh.len());
    for s in fresh {
        if !seen_urls.insert(canonical_url(&s.url)) {
            out.duplicate_url += 1;
            continue;
        }
        unique.push(s);
    }

    // 3) Domain policy.
    let mut by_domain: HashMap<String, Vec<(String, TopicMatch)>> = HashMap::new();
    let mut kept: Vec<(Story, TopicMatch)> = Vec::with_capacity(unique.len());
    for s in unique {
        let m = matcher.classify(&s);
        let domain = domain_key(&s.url);
        let title = s.title.to_lowercase();
        let bucket = by_domain.entry(domain.clone()).or_default();

        let admit = bucket.len() < cfg.max_per_domain
            || bucket.iter().all(|(other_title, other_m)| {
                m.is_distinct_from(other_m)
                    && (normalized_levenshtein(&title, other_title) as f32)
                        < cfg.distinct_title_threshold
            });
        if !admit {
            tracing::debug!(target: "curate", %domain, url = %s.url, "same-domain story dropped");
            out.duplicate_domain += 1;
            continue;
        }
        bucket.push((title, m.clone()));
        kept.push((s, m));
    }

    // 4) Rank, cap, then order newest first.
    kept.sort_by(|(a, am), (b, bm)| {
        bm.score
            .partial_cmp(&am.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.published.cmp(&a.published))
    });
    if kept.len() > cfg.target_count {
        out.trimmed = kept.len() - cfg.target_count;
        kept.truncate(cfg.target_count);
    }
    let mut stories: Vec<Story> = kept.into_iter().map(|(s, _)| s).collect();
    stories.sort_by(|a, b| b.published.cmp(&a.published));
    out.stories = stories;

    tracing::info!(
        target: "curate",
        kept = out.stories.len(),
        stale = out.stale,
        duplicate_url = out.duplicate_url,
        duplicate_domain = out.duplicate_domain,
        trimmed = out.trimmed,
        "curation done"
    );
    out
}
