// src/feed.rs
//! RSS 2.0 output (with `atom:link rel="self"`), written atomically.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write as _;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::info;

use crate::story::Story;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const UNTITLED: &str = "(untitled)";

/// Channel-level metadata (`[feed]` section of the config).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedMeta {
    pub title: String,
    pub site_url: String,
    pub self_url: String,
    pub description: String,
    pub language: String,
}

impl Default for FeedMeta {
    fn default() -> Self {
        Self {
            title: "Late News (AI practical uses)".to_string(),
            site_url: "https://example.com/".to_string(),
            self_url: "https://example.com/feed.xml".to_string(),
            description: "Auto-generated feed of practical AI stories.".to_string(),
            language: "en".to_string(),
        }
    }
}

fn text_element<W: std::io::Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_item<W: std::io::Write>(w: &mut Writer<W>, story: &Story) -> Result<()> {
    let title = if story.title.trim().is_empty() {
        UNTITLED
    } else {
        story.title.as_str()
    };
    let link = story.url.as_str();

    w.write_event(Event::Start(BytesStart::new("item")))?;
    text_element(w, "title", title)?;
    text_element(w, "link", link)?;
    text_element(w, "description", &story.summary)?;

    w.write_event(Event::Start(
        BytesStart::new("guid").with_attributes([("isPermaLink", "true")]),
    ))?;
    w.write_event(Event::Text(BytesText::new(link)))?;
    w.write_event(Event::End(BytesEnd::new("guid")))?;

    text_element(w, "pubDate", &story.published.to_rfc2822())?;
    w.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

/// Render the full RSS document.
pub fn render_rss(meta: &FeedMeta, stories: &[Story], built_at: DateTime<Utc>) -> Result<String> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    w.write_event(Event::Start(
        BytesStart::new("rss").with_attributes([("version", "2.0"), ("xmlns:atom", ATOM_NS)]),
    ))?;
    w.write_event(Event::Start(BytesStart::new("channel")))?;

    text_element(&mut w, "title", &meta.title)?;
    text_element(&mut w, "link", &meta.site_url)?;
    w.write_event(Event::Empty(BytesStart::new("atom:link").with_attributes([
        ("href", meta.self_url.as_str()),
        ("rel", "self"),
        ("type", "application/rss+xml"),
    ])))?;
    text_element(&mut w, "description", &meta.description)?;
    text_element(&mut w, "language", &meta.language)?;
    text_element(&mut w, "lastBuildDate", &built_at.to_rfc2822())?;
    text_element(
        &mut w,
        "generator",
        concat!("late-news ", env!("CARGO_PKG_VERSION")),
    )?;

    for story in stories {
        write_item(&mut w, story)?;
    }

    w.write_event(Event::End(BytesEnd::new("channel")))?;
    w.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut xml = String::from_utf8(w.into_inner()).context("rss output is not UTF-8")?;
    xml.push('\n');
    Ok(xml)
}

/// Write `content` to `path` via a temporary sibling + rename, creating parents.
/// The temporary file is removed again if any step fails.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(p) => {
            fs::create_dir_all(p)
                .with_context(|| format!("creating output directory {}", p.display()))?;
            p
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("creating temporary file in {}", parent.display()))?;
    tmp.write_all(content)
        .with_context(|| format!("writing {}", tmp.path().display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("syncing {}", tmp.path().display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("moving {} into place", path.display()))?;
    Ok(())
}

pub fn write_feed(path: &Path, meta: &FeedMeta, stories: &[Story], built_at: DateTime<Utc>) -> Result<()> {
    let xml = render_rss(meta, stories, built_at)?;
    write_atomic(path, xml.as_bytes())?;
    info!(target: "rss", path = %path.display(), items = stories.len(), "feed written");
    Ok(())
}

/// Side output: the curated array in the exact four-key shape.
pub fn write_json(path: &Path, stories: &[Story]) -> Result<()> {
    let mut json = serde_json::to_string_pretty(stories).context("serializing stories")?;
    json.push('\n');
    write_atomic(path, json.as_bytes())?;
    info!(target: "rss", path = %path.display(), items = stories.len(), "stories json written");
    Ok(())
}
