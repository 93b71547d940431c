// src/topics.rs
//! Topic tagging: a table of regex-backed topics (from TOML or built-in) plus a
//! soft bonus for the favourite teams named in `[curation]`. Used for ranking and
//! for deciding whether two stories from one domain cover clearly distinct topics.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::BTreeSet;

use crate::story::Story;

fn default_weight() -> f32 {
    1.0
}

fn default_favourite_bonus() -> f32 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicCfg {
    pub id: String,
    /// Case-insensitive regexes matched against title + summary.
    pub patterns: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: f32,
    /// Generic topics count for ranking but never make two stories "distinct".
    #[serde(default)]
    pub generic: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TopicsConfig {
    /// Empty means: use the built-in table.
    pub table: Vec<TopicCfg>,
    /// Added when a story mentions one of `curation.favourite_teams`.
    pub favourite_bonus: f32,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            table: Vec::new(),
            favourite_bonus: default_favourite_bonus(),
        }
    }
}

fn topic(id: &str, weight: f32, generic: bool, patterns: &[&str]) -> TopicCfg {
    TopicCfg {
        id: id.to_string(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        weight,
        generic,
    }
}

/// Built-in table: practical AI use in education, content creation, US politics and
/// science, plus NBA/MLB coverage.
pub fn default_table() -> Vec<TopicCfg> {
    vec![
        topic(
            "ai-education",
            1.0,
            false,
            &[r"\b(schools?|students?|teachers?|classrooms?|education\w*|universit(y|ies)|colleges?|campus|tutor\w*|homework)\b"],
        ),
        topic(
            "ai-content-creation",
            1.0,
            false,
            &[r"\b(blog\w*|creators?|content creation|newsletters?|writers?|writing|youtube\w*|podcast\w*|substack|influencers?)\b"],
        ),
        topic(
            "ai-us-politics",
            1.0,
            false,
            &[r"\b(congress\w*|senate|senators?|white house|campaigns?|elections?|governors?|lawmakers?|legislat\w*|supreme court|democrats?|republicans?|gop|federal)\b"],
        ),
        topic(
            "ai-science",
            1.0,
            false,
            &[r"\b(science|scientists?|research\w*|laborator(y|ies)|biolog\w*|physics|chemist\w*|astronom\w*|climate|proteins?|clinical|medicine|genom\w*)\b"],
        ),
        topic(
            "nba",
            0.8,
            false,
            &[r"\b(nba|basketball|knicks|lakers|celtics|warriors)\b"],
        ),
        topic(
            "mlb",
            0.8,
            false,
            &[r"\b(mlb|baseball|mets|yankees|dodgers|pitchers?|home runs?)\b"],
        ),
        topic(
            "ai-general",
            0.5,
            true,
            &[r"\b(ai|artificial intelligence|chatgpt|openai|llms?|generative|machine learning|chatbots?)\b"],
        ),
    ]
}

/// Result of classifying one story.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopicMatch {
    /// Matched topic ids, in table order.
    pub topics: Vec<String>,
    pub score: f32,
    pub favourite: bool,
    /// Matched ids excluding generic topics.
    pub specific: BTreeSet<String>,
}

impl TopicMatch {
    /// Clearly distinct: both sides have specific topics and they share none.
    pub fn is_distinct_from(&self, other: &TopicMatch) -> bool {
        !self.specific.is_empty()
            && !other.specific.is_empty()
            && self.specific.is_disjoint(&other.specific)
    }
}

#[derive(Debug)]
struct CompiledTopic {
    cfg: TopicCfg,
    res: Vec<Regex>,
}

#[derive(Debug)]
pub struct TopicMatcher {
    topics: Vec<CompiledTopic>,
    favourites: Vec<Regex>,
    favourite_bonus: f32,
}

fn compile(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("compiling topic pattern {pattern:?}"))
}

/// Whole-word match on a team's nickname: "New York Knicks" -> `\bknicks\b`.
fn team_pattern(team: &str) -> Option<String> {
    let nickname = team.split_whitespace().last()?;
    Some(format!(r"\b{}\b", regex::escape(nickname)))
}

impl TopicMatcher {
    /// `favourite_teams` is the same list the system instruction names, so the
    /// prompt and the ranking bonus cannot drift apart.
    pub fn from_config(cfg: &TopicsConfig, favourite_teams: &[String]) -> Result<Self> {
        let table = if cfg.table.is_empty() {
            default_table()
        } else {
            cfg.table.clone()
        };

        let mut topics = Vec::with_capacity(table.len());
        for t in table {
            let res = t
                .patterns
                .iter()
                .map(|p| compile(p))
                .collect::<Result<Vec<_>>>()
                .with_context(|| format!("in topic `{}`", t.id))?;
            topics.push(CompiledTopic { cfg: t, res });
        }

        let favourites = favourite_teams
            .iter()
            .filter_map(|t| team_pattern(t))
            .map(|p| compile(&p))
            .collect::<Result<Vec<_>>>()
            .context("in favourite teams")?;

        Ok(Self {
            topics,
            favourites,
            favourite_bonus: cfg.favourite_bonus.max(0.0),
        })
    }

    pub fn classify_text(&self, text: &str) -> TopicMatch {
        let mut out = TopicMatch::default();
        for t in &self.topics {
            if t.res.iter().any(|re| re.is_match(text)) {
                out.topics.push(t.cfg.id.clone());
                out.score += t.cfg.weight;
                if !t.cfg.generic {
                    out.specific.insert(t.cfg.id.clone());
                }
            }
        }
        if self.favourites.iter().any(|re| re.is_match(text)) {
            out.favourite = true;
            out.score += self.favourite_bonus;
        }
        out
    }

    pub fn classify(&self, story: &Story) -> TopicMatch {
        self.classify_text(&format!("{} {}", story.title, story.summary))
    }
}
