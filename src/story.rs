// src/story.rs
//! Story records: extraction from model replies, parsing, and the output contract
//! (`title`, `url`, `summary`, `published`, nothing else).

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::{Host, Url};

pub const REQUIRED_KEYS: [&str; 4] = ["title", "url", "summary", "published"];
pub const PUBLISHED_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// One validated story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Story {
    pub title: String,
    pub url: Url,
    pub summary: String,
    #[serde(with = "published_format")]
    pub published: DateTime<Utc>,
}

mod published_format {
    use super::{parse_published, PUBLISHED_FORMAT};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format(PUBLISHED_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_published(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("bad published timestamp: {raw}")))
    }
}

/// Why a reply element was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryIssue {
    NotAnObject,
    MissingField(&'static str),
    WrongType(&'static str),
    EmptyField(&'static str),
    UnknownField(String),
    InvalidUrl(String),
    PlaceholderUrl(String),
    BadTimestamp(String),
}

impl fmt::Display for StoryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoryIssue::NotAnObject => write!(f, "element is not a JSON object"),
            StoryIssue::MissingField(k) => write!(f, "missing field `{k}`"),
            StoryIssue::WrongType(k) => write!(f, "field `{k}` is not a string"),
            StoryIssue::EmptyField(k) => write!(f, "field `{k}` is empty"),
            StoryIssue::UnknownField(k) => write!(f, "unexpected field `{k}`"),
            StoryIssue::InvalidUrl(e) => write!(f, "invalid url: {e}"),
            StoryIssue::PlaceholderUrl(h) => write!(f, "placeholder url host `{h}`"),
            StoryIssue::BadTimestamp(v) => {
                write!(f, "published `{v}` is not UTC YYYY-MM-DDTHH:MM:SSZ")
            }
        }
    }
}

/// A reply element that failed validation, with its position in the array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub index: usize,
    pub issues: Vec<StoryIssue>,
}

// ------------------------------------------------------------
// Extraction + parsing
// ------------------------------------------------------------

/// Locate the JSON payload inside a model reply. Handles fenced code blocks
/// (any or no language tag) and stray prose before or after the payload.
pub fn extract_json(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let body = fenced_body(trimmed).unwrap_or(trimmed);
    scan_payload(body)
        .or_else(|| scan_payload(trimmed))
        .or_else(|| bracket_span(body))
}

/// Inner text of the first fenced block, minus its language tag.
fn fenced_body(s: &str) -> Option<&str> {
    let start = s.find("```")? + 3;
    let rest = &s[start..];
    let inner = &rest[..rest.find("```")?];
    let inner = match inner.split_once('\n') {
        Some((tag, body)) if tag.trim().chars().all(|c| c.is_ascii_alphanumeric()) => body,
        _ => inner,
    };
    Some(inner.trim())
}

/// Try a streaming parse at every `[` / `{` and return the first complete value
/// shaped like a story payload; otherwise the first value that parsed at all.
fn scan_payload(s: &str) -> Option<&str> {
    let mut first = None;
    for (i, _) in s.match_indices(['[', '{']) {
        let mut stream = serde_json::Deserializer::from_str(&s[i..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            let span = &s[i..i + stream.byte_offset()];
            if looks_like_payload(&value) {
                return Some(span);
            }
            first.get_or_insert(span);
        }
    }
    first
}

fn looks_like_payload(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty() || items.iter().any(Value::is_object),
        Value::Object(_) => true,
        _ => false,
    }
}

// Nothing parses: hand the widest bracketed span to serde so the error says why.
fn bracket_span(s: &str) -> Option<&str> {
    let open = s.find(['[', '{'])?;
    let close_ch = if s[open..].starts_with('[') { ']' } else { '}' };
    let close = s.rfind(close_ch)?;
    if close < open {
        return None;
    }
    Some(&s[open..=close])
}

/// Parse a reply into its array elements. Accepts a bare array, or an object whose
/// only key is `stories` holding an array (the structured-output envelope).
pub fn parse_reply(text: &str) -> Result<Vec<Value>> {
    let json = extract_json(text)
        .ok_or_else(|| anyhow!("no JSON found in model reply: {}", preview(text, 200)))?;
    let value: Value = serde_json::from_str(json)
        .with_context(|| format!("model reply is not valid JSON: {}", preview(json, 200)))?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) if obj.len() == 1 && obj.contains_key("stories") => {
            match obj.remove("stories") {
                Some(Value::Array(items)) => Ok(items),
                _ => bail!("model did not return a JSON array"),
            }
        }
        _ => bail!("model did not return a JSON array"),
    }
}

fn preview(s: &str, max: usize) -> String {
    let flat: String = s.chars().take(max).collect();
    if s.chars().count() > max {
        format!("{flat}...")
    } else {
        flat
    }
}

// ------------------------------------------------------------
// Validation
// ------------------------------------------------------------

/// Validate one element against the output contract.
pub fn validate(raw: &Value, max_summary_sentences: usize) -> Result<Story, Vec<StoryIssue>> {
    let Value::Object(obj) = raw else {
        return Err(vec![StoryIssue::NotAnObject]);
    };

    let mut issues = Vec::new();

    let mut field = |key: &'static str| -> Option<String> {
        match obj.get(key) {
            None | Some(Value::Null) => {
                issues.push(StoryIssue::MissingField(key));
                None
            }
            Some(Value::String(s)) => {
                let norm = normalize_text(s);
                if norm.is_empty() {
                    issues.push(StoryIssue::EmptyField(key));
                    None
                } else {
                    Some(norm)
                }
            }
            Some(_) => {
                issues.push(StoryIssue::WrongType(key));
                None
            }
        }
    };

    let title = field("title");
    let url_raw = field("url");
    let summary = field("summary");
    let published_raw = field("published");

    for k in obj.keys() {
        if !REQUIRED_KEYS.contains(&k.as_str()) {
            issues.push(StoryIssue::UnknownField(k.clone()));
        }
    }

    let url = url_raw.and_then(|u| match check_url(&u) {
        Ok(parsed) => Some(parsed),
        Err(issue) => {
            issues.push(issue);
            None
        }
    });

    let published = published_raw.and_then(|p| match parse_published(&p) {
        Some(dt) => Some(dt),
        None => {
            issues.push(StoryIssue::BadTimestamp(p));
            None
        }
    });

    match (title, url, summary, published) {
        (Some(title), Some(url), Some(summary), Some(published)) if issues.is_empty() => {
            Ok(Story {
                title,
                url,
                summary: truncate_sentences(&summary, max_summary_sentences),
                published,
            })
        }
        _ => Err(issues),
    }
}

/// Validate every element. Lenient mode drops invalid elements (logged at warn);
/// strict mode fails on the first one.
pub fn validate_all(
    raws: &[Value],
    max_summary_sentences: usize,
    strict: bool,
) -> Result<(Vec<Story>, Vec<Rejected>)> {
    let mut stories = Vec::with_capacity(raws.len());
    let mut rejected = Vec::new();

    for (index, raw) in raws.iter().enumerate() {
        match validate(raw, max_summary_sentences) {
            Ok(story) => stories.push(story),
            Err(issues) => {
                let joined = issues
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                if strict {
                    bail!("story #{index} rejected: {joined}");
                }
                tracing::warn!(target: "story", index, issues = %joined, "story rejected");
                rejected.push(Rejected { index, issues });
            }
        }
    }

    Ok((stories, rejected))
}

/// Parse `published`. The canonical form is `YYYY-MM-DDTHH:MM:SSZ`; RFC 3339 with
/// fractional seconds or a `+00:00` offset is accepted and truncated to seconds.
pub fn parse_published(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, PUBLISHED_FORMAT) {
        return Some(naive.and_utc());
    }
    let dt = DateTime::parse_from_rfc3339(s).ok()?;
    if dt.offset().local_minus_utc() != 0 {
        return None;
    }
    dt.with_timezone(&Utc).with_nanosecond(0)
}

pub fn check_url(raw: &str) -> Result<Url, StoryIssue> {
    let url = Url::parse(raw.trim()).map_err(|e| StoryIssue::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(StoryIssue::InvalidUrl(format!(
            "unsupported scheme `{}`",
            url.scheme()
        )));
    }
    match url.host() {
        None => Err(StoryIssue::InvalidUrl("missing host".to_string())),
        Some(Host::Ipv4(ip)) => Err(StoryIssue::PlaceholderUrl(ip.to_string())),
        Some(Host::Ipv6(ip)) => Err(StoryIssue::PlaceholderUrl(ip.to_string())),
        Some(Host::Domain(d)) => {
            if is_placeholder_host(d) {
                Err(StoryIssue::PlaceholderUrl(d.to_string()))
            } else {
                Ok(url)
            }
        }
    }
}

/// Reserved or obviously fake hosts (RFC 2606 names, localhost, single labels).
pub fn is_placeholder_host(host: &str) -> bool {
    let h = host.trim_end_matches('.').to_ascii_lowercase();
    if !h.contains('.') {
        return true;
    }
    const RESERVED: [&str; 3] = ["example.com", "example.org", "example.net"];
    if RESERVED
        .iter()
        .any(|r| h == *r || h.ends_with(&format!(".{r}")))
    {
        return true;
    }
    let tld = h.rsplit('.').next().unwrap_or_default();
    matches!(tld, "example" | "test" | "invalid" | "localhost" | "local")
}

// ------------------------------------------------------------
// Text helpers
// ------------------------------------------------------------

/// Normalize text: decode entities, strip tags, fold quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

const ABBREVIATIONS: [&str; 12] = [
    "mr.", "mrs.", "ms.", "dr.", "st.", "vs.", "jr.", "sr.", "inc.", "co.", "no.", "gov.",
];

fn ends_sentence(word: &str) -> bool {
    let w = word.trim_end_matches(['"', '\'', ')', ']']);
    if !w.ends_with(['.', '!', '?']) {
        return false;
    }
    if w.ends_with(['!', '?']) {
        return true;
    }
    let lower = w.to_lowercase();
    let body = lower.trim_end_matches('.');
    // "U.S." and single initials are abbreviations, not sentence ends.
    if body.contains('.') || body.chars().count() <= 1 {
        return false;
    }
    !ABBREVIATIONS.contains(&lower.as_str())
}

/// Count sentences with a small abbreviation-aware heuristic.
pub fn count_sentences(text: &str) -> usize {
    let mut count = 0;
    let mut open = false;
    for word in text.split_whitespace() {
        open = true;
        if ends_sentence(word) {
            count += 1;
            open = false;
        }
    }
    if open {
        count += 1;
    }
    count
}

/// Keep at most `max` sentences.
pub fn truncate_sentences(text: &str, max: usize) -> String {
    if max == 0 || count_sentences(text) <= max {
        return text.to_string();
    }
    let mut kept = Vec::new();
    let mut seen = 0;
    for word in text.split_whitespace() {
        kept.push(word);
        if ends_sentence(word) {
            seen += 1;
            if seen == max {
                break;
            }
        }
    }
    kept.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_handles_fences_and_prose() {
        let fenced = "Here you go:\n```json\n[{\"a\":1}]\n```\nEnjoy!";
        assert_eq!(extract_json(fenced), Some("[{\"a\":1}]"));

        let prose = "Sure! [1, 2, 3] hope that helps";
        assert_eq!(extract_json(prose), Some("[1, 2, 3]"));

        assert_eq!(extract_json("no json at all"), None);
    }

    #[test]
    fn extract_ignores_trailing_prose_and_bracketed_words() {
        let trailing = "[{\"a\":1}]\n\nLet me know if you need more stories!";
        assert_eq!(extract_json(trailing), Some("[{\"a\":1}]"));
        assert_eq!(parse_reply(trailing).unwrap().len(), 1);

        let counted = "Here are the [20] stories: [{\"a\":1}] (sources [1], [2])";
        assert_eq!(extract_json(counted), Some("[{\"a\":1}]"));
        assert_eq!(parse_reply(counted).unwrap().len(), 1);

        let upper = "```JSON\n{\"stories\":[{\"a\":1}]}\n```";
        assert_eq!(extract_json(upper), Some("{\"stories\":[{\"a\":1}]}"));
        assert_eq!(parse_reply(upper).unwrap().len(), 1);
    }

    #[test]
    fn broken_json_reports_a_parse_error() {
        let err = parse_reply("[{\"a\": 1,]").unwrap_err().to_string();
        assert!(err.contains("not valid JSON"), "{err}");
    }

    #[test]
    fn parse_accepts_envelope_but_not_other_objects() {
        let env = r#"{"stories":[{"title":"x"}]}"#;
        assert_eq!(parse_reply(env).unwrap().len(), 1);

        let other = r#"{"items":[]}"#;
        let err = parse_reply(other).unwrap_err().to_string();
        assert!(err.contains("JSON array"), "{err}");
    }

    #[test]
    fn validate_collects_every_issue() {
        let raw = json!({
            "title": "  ",
            "url": "https://example.com/story",
            "published": "2025-01-01 10:00",
            "author": "someone"
        });
        let issues = validate(&raw, 2).unwrap_err();
        assert!(issues.contains(&StoryIssue::EmptyField("title")));
        assert!(issues.contains(&StoryIssue::MissingField("summary")));
        assert!(issues.contains(&StoryIssue::UnknownField("author".into())));
        assert!(issues.contains(&StoryIssue::PlaceholderUrl("example.com".into())));
        assert!(issues.contains(&StoryIssue::BadTimestamp("2025-01-01 10:00".into())));
    }

    #[test]
    fn published_accepts_canonical_and_utc_rfc3339_only() {
        let a = parse_published("2025-09-01T12:30:00Z").unwrap();
        let b = parse_published("2025-09-01T12:30:00.750+00:00").unwrap();
        assert_eq!(a, b);
        assert!(parse_published("2025-09-01T12:30:00+02:00").is_none());
        assert!(parse_published("September 1, 2025").is_none());
    }

    #[test]
    fn placeholder_hosts() {
        assert!(is_placeholder_host("example.com"));
        assert!(is_placeholder_host("news.example.org"));
        assert!(is_placeholder_host("localhost"));
        assert!(is_placeholder_host("site.test"));
        assert!(!is_placeholder_host("www.nytimes.com"));
        assert!(!is_placeholder_host("examples.com"));
    }

    #[test]
    fn sentence_counting_skips_abbreviations() {
        assert_eq!(count_sentences("The U.S. Senate voted. It passed."), 2);
        assert_eq!(count_sentences("Dr. Smith spoke"), 1);
        assert_eq!(
            truncate_sentences("One. Two! Three? Four.", 2),
            "One. Two!".to_string()
        );
    }

    #[test]
    fn story_serializes_with_exact_keys() {
        let story = Story {
            title: "T".into(),
            url: Url::parse("https://www.nba.com/news/x").unwrap(),
            summary: "S.".into(),
            published: parse_published("2025-09-01T12:30:00Z").unwrap(),
        };
        let v = serde_json::to_value(&story).unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 4);
        assert_eq!(obj["published"], "2025-09-01T12:30:00Z");
        assert_eq!(obj["url"], "https://www.nba.com/news/x");
    }
}
