// src/telemetry.rs
//! Logging setup and the optional Prometheus textfile export.

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
/// Logs go to stderr so stdout stays clean for scripting.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},hyper=warn,reqwest=warn")));

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = res;
}

/// One-time metric descriptions so series carry help text in the export.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "late_news_stories_received_total",
            "Elements found in model replies."
        );
        describe_counter!(
            "late_news_stories_rejected_total",
            "Elements rejected by validation."
        );
        describe_counter!(
            "late_news_stories_dropped_total",
            "Valid stories dropped by curation (stale, duplicate, over target)."
        );
        describe_counter!(
            "late_news_stories_written_total",
            "Stories written to the feed."
        );
        describe_counter!(
            "late_news_llm_retries_total",
            "Retried Responses API calls."
        );
        describe_counter!(
            "late_news_cache_hits_total",
            "Replies served from the same-day cache."
        );
        describe_histogram!(
            "late_news_llm_request_ms",
            "Responses API call time in milliseconds, retries included."
        );
    });
}

/// Install the Prometheus recorder. Call once, before the pipeline runs.
pub fn install_prometheus() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing prometheus recorder")?;
    ensure_metrics_described();
    Ok(handle)
}

/// Render the current metrics in text exposition format to `path`
/// (node_exporter textfile collector layout).
pub fn write_metrics(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    crate::feed::write_atomic(path, handle.render().as_bytes())
        .with_context(|| format!("writing metrics to {}", path.display()))
}
