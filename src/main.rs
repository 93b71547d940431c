//! late-news — one-shot CLI: prompt file in, RSS feed out.
//! Meant to run from cron or CI; see `config/late_news.toml` for tunables.

use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use late_news::llm::{build_remote_source, file::FileSource, StorySource};
use late_news::{telemetry, AppConfig, Pipeline, RunOptions};

#[derive(Parser, Debug)]
#[command(name = "late-news", version, about = "Build an RSS feed of recent news via a web-search LLM")]
struct Args {
    /// Path to the prompt text/markdown file
    #[arg(long, value_name = "FILE", required_unless_present = "from_json")]
    prompt_file: Option<PathBuf>,

    /// Output RSS path, e.g. public/feed.xml
    #[arg(long, value_name = "FILE")]
    out: PathBuf,

    /// Path to late_news.toml (default: $LATE_NEWS_CONFIG_PATH, then config/late_news.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Render from a saved reply instead of calling the API
    #[arg(long, value_name = "FILE")]
    from_json: Option<PathBuf>,

    /// Save the raw model reply here before parsing
    #[arg(long, value_name = "FILE")]
    raw_out: Option<PathBuf>,

    /// Also write the curated stories as a JSON array
    #[arg(long, value_name = "FILE")]
    json_out: Option<PathBuf>,

    /// Write Prometheus text metrics here at exit
    #[arg(long, value_name = "FILE")]
    metrics_file: Option<PathBuf>,

    /// Judge recency as of this RFC 3339 instant (replaying old replies)
    #[arg(long, value_name = "TIME")]
    as_of: Option<DateTime<Utc>>,

    /// Fail on any invalid story instead of dropping it
    #[arg(long)]
    strict: bool,

    /// Bypass the same-day reply cache
    #[arg(long)]
    no_cache: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG overrides
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    telemetry::init_tracing(&args.log_level, args.log_json);

    let metrics = match &args.metrics_file {
        Some(_) => Some(telemetry::install_prometheus()?),
        None => None,
    };

    let mut cfg = AppConfig::load(args.config.as_deref())?;
    if args.strict {
        cfg.curation.strict = true;
    }

    let source: Box<dyn StorySource> = match &args.from_json {
        Some(path) => Box::new(FileSource::new(path)),
        None => build_remote_source(&cfg, !args.no_cache)?,
    };

    let pipeline = Pipeline::new(cfg, source)?;
    let opts = RunOptions {
        prompt_file: args.prompt_file.clone(),
        out: args.out.clone(),
        json_out: args.json_out.clone(),
        raw_out: args.raw_out.clone(),
        as_of: args.as_of,
    };
    let result = pipeline.run(&opts).await;

    // Metrics are exported for failed runs too.
    if let (Some(handle), Some(path)) = (&metrics, &args.metrics_file) {
        telemetry::write_metrics(handle, path)?;
    }

    let report = result?;
    info!(
        out = %report.out.display(),
        written = report.written,
        response_id = report.response_id.as_deref().unwrap_or("-"),
        "done"
    );
    Ok(())
}
