// tests/pipeline_replay.rs
use late_news::llm::file::FileSource;
use late_news::story::parse_published;
use late_news::{AppConfig, Pipeline, RunOptions};
use std::fs;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[tokio::test]
async fn replay_writes_feed_json_and_raw_copy() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("public/feed.xml");
    let json_out = dir.path().join("public/stories.json");
    let raw_out = dir.path().join("raw/reply.txt");

    let mut cfg = AppConfig::default();
    cfg.feed.title = "Replay Feed".into();
    let pipeline =
        Pipeline::new(cfg, Box::new(FileSource::new(fixture("reply_mixed.json")))).unwrap();

    let opts = RunOptions {
        prompt_file: None,
        out: out.clone(),
        json_out: Some(json_out.clone()),
        raw_out: Some(raw_out.clone()),
        as_of: parse_published("2025-09-30T12:00:00Z"),
    };
    let report = pipeline.run(&opts).await.expect("run ok");
    assert_eq!(report.written, 5);
    assert_eq!(report.out, out);
    assert!(report.response_id.is_none());

    let xml = fs::read_to_string(&out).unwrap();
    assert!(xml.contains("<title>Replay Feed</title>"));
    assert_eq!(xml.matches("<item>").count(), 5);
    assert!(xml.contains("https://www.nba.com/knicks/news/ai-analytics-scouting"));
    assert!(!xml.contains("example.com/ai-bloggers"));

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_out).unwrap()).unwrap();
    let arr = json.as_array().unwrap();
    assert_eq!(arr.len(), 5);
    for item in arr {
        let obj = item.as_object().unwrap();
        let mut keys: Vec<_> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["published", "summary", "title", "url"]);
        assert!(obj["published"].as_str().unwrap().ends_with('Z'));
    }

    let raw = fs::read_to_string(&raw_out).unwrap();
    assert!(raw.starts_with("```json"));
}

#[tokio::test]
async fn missing_prompt_file_fails_before_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("feed.xml");
    let pipeline = Pipeline::new(
        AppConfig::default(),
        Box::new(FileSource::new(fixture("reply_mixed.json"))),
    )
    .unwrap();

    let opts = RunOptions {
        prompt_file: Some(dir.path().join("missing.md")),
        out: out.clone(),
        ..RunOptions::default()
    };
    let err = pipeline.run(&opts).await.unwrap_err().to_string();
    assert!(err.contains("Prompt file not found"), "{err}");
    assert!(!out.exists());
}

#[tokio::test]
async fn failed_run_keeps_previous_feed() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("feed.xml");
    fs::write(&out, "previous").unwrap();

    let pipeline = Pipeline::new(
        AppConfig::default(),
        Box::new(FileSource::new(fixture("reply_mixed.json"))),
    )
    .unwrap();
    let opts = RunOptions {
        out: out.clone(),
        // every story is outside the window
        as_of: parse_published("2027-01-01T00:00:00Z"),
        ..RunOptions::default()
    };
    assert!(pipeline.run(&opts).await.is_err());
    assert_eq!(fs::read_to_string(&out).unwrap(), "previous");
}
