// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod curate;
pub mod feed;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod story;
pub mod telemetry;
pub mod topics;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::llm::{SourceReply, StorySource};
pub use crate::pipeline::{Pipeline, RunOptions, RunReport};
pub use crate::story::Story;
