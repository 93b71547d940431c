// src/llm/openai.rs
//! OpenAI Responses API client with the built-in `web_search` tool and
//! structured (json_schema) output. Requires an API key (see `LlmConfig`).

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::{SourceReply, StorySource, Usage};
use crate::config::LlmConfig;
use crate::curate::CurationConfig;
use crate::prompt::{output_schema, system_instruction};

const SCHEMA_NAME: &str = "NewsItems";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct OpenAiResponses {
    http: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    system: String,
    schema: Value,
    web_search: bool,
    max_retries: u8,
    backoff_base: Duration,
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Tool {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct Format<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
    schema: &'a Value,
    strict: bool,
}

#[derive(Serialize)]
struct TextCfg<'a> {
    format: Format<'a>,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    text: TextCfg<'a>,
    input: Vec<Msg<'a>>,
}

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    content: Option<Value>,
}

impl Resp {
    /// Concatenate every `output_text` part of every `message` item, unless the
    /// server already provided the aggregate.
    fn text(&self) -> String {
        if let Some(t) = self.output_text.as_deref().filter(|t| !t.trim().is_empty()) {
            return t.to_string();
        }
        let mut out = String::new();
        for item in self.output.iter().filter(|i| i.kind == "message") {
            let Some(Value::Array(parts)) = &item.content else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(Value::as_str) == Some("output_text") {
                    if let Some(t) = part.get("text").and_then(Value::as_str) {
                        out.push_str(t);
                    }
                }
            }
        }
        out
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Strict structured output needs an object at the root, so the story array is
/// wrapped as `{"stories": [...]}`.
fn envelope_schema(curation: &CurationConfig) -> Value {
    json!({
        "type": "object",
        "properties": { "stories": output_schema(curation) },
        "required": ["stories"],
        "additionalProperties": false
    })
}

impl OpenAiResponses {
    pub fn from_config(llm: &LlmConfig, curation: &CurationConfig) -> Result<Self> {
        let api_key = llm.resolved_api_key()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("late-news/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(llm.connect_timeout_secs))
            .timeout(Duration::from_secs(llm.timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            http,
            url: llm.responses_url(),
            api_key,
            model: llm.model.clone(),
            system: system_instruction(curation),
            schema: envelope_schema(curation),
            web_search: llm.web_search,
            max_retries: llm.max_retries,
            backoff_base: Duration::from_millis(500),
        })
    }

    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Everything besides the prompt that shapes the reply; feeds the cache key.
    pub fn cache_salt(&self) -> String {
        format!("{}\n{}\n{}\n{}", self.model, self.web_search, self.system, self.schema)
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> Req<'a> {
        let tools = if self.web_search {
            vec![Tool { kind: "web_search" }]
        } else {
            Vec::new()
        };
        Req {
            model: &self.model,
            tools,
            text: TextCfg {
                format: Format {
                    kind: "json_schema",
                    name: SCHEMA_NAME,
                    schema: &self.schema,
                    strict: true,
                },
            },
            input: vec![
                Msg {
                    role: "system",
                    content: &self.system,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(MAX_BACKOFF)
    }

    async fn send_with_retries(&self, req: &Req<'_>) -> Result<Resp> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let res = self
                .http
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .json(req)
                .send()
                .await;

            let err = match res {
                Ok(rsp) if rsp.status().is_success() => {
                    return rsp.json::<Resp>().await.context("decoding Responses API body");
                }
                Ok(rsp) => {
                    let status = rsp.status();
                    let body = rsp.text().await.unwrap_or_default();
                    let err = anyhow!("Responses API error {status}: {}", truncate(&body, 500));
                    if !is_retryable(status) {
                        return Err(err);
                    }
                    err
                }
                Err(e) => anyhow::Error::new(e).context("Responses API request failed"),
            };

            // One initial attempt plus `max_retries` retries.
            if attempt > u32::from(self.max_retries) {
                return Err(err.context(format!("giving up after {attempt} attempt(s)")));
            }
            let wait = self.backoff(attempt);
            counter!("late_news_llm_retries_total").increment(1);
            warn!(
                target: "llm",
                attempt,
                backoff_ms = wait.as_millis() as u64,
                error = %err,
                "Responses API call failed, retrying"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait]
impl StorySource for OpenAiResponses {
    async fn fetch(&self, prompt: &str) -> Result<SourceReply> {
        if prompt.trim().is_empty() {
            bail!("refusing to call the Responses API with an empty prompt");
        }

        info!(target: "llm", model = %self.model, web_search = self.web_search, "calling Responses API");
        let t0 = Instant::now();
        let req = self.build_request(prompt);
        let resp = self.send_with_retries(&req).await?;
        histogram!("late_news_llm_request_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let usage = resp.usage.clone().unwrap_or_default();
        info!(
            target: "llm",
            response_id = resp.id.as_deref().unwrap_or("-"),
            model = resp.model.as_deref().unwrap_or(&self.model),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            total_tokens = usage.total_tokens,
            "Responses API call finished"
        );
        if let Some(status) = resp.status.as_deref().filter(|s| *s != "completed") {
            warn!(target: "llm", status, "response did not complete normally");
        }

        let text = resp.text();
        if text.trim().is_empty() {
            bail!("Responses API returned no output text");
        }
        Ok(SourceReply {
            text,
            response_id: resp.id,
            model: resp.model,
            usage: resp.usage,
        })
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiResponses {
        let llm = LlmConfig {
            api_key: "sk-test".into(),
            ..LlmConfig::default()
        };
        OpenAiResponses::from_config(&llm, &CurationConfig::default()).unwrap()
    }

    #[test]
    fn request_has_web_search_schema_and_no_temperature() {
        let p = provider();
        let v = serde_json::to_value(p.build_request("Give me news")).unwrap();
        assert_eq!(v["model"], "gpt-5");
        assert_eq!(v["tools"][0]["type"], "web_search");
        assert_eq!(v["text"]["format"]["type"], "json_schema");
        assert_eq!(v["text"]["format"]["name"], "NewsItems");
        assert_eq!(v["text"]["format"]["strict"], true);
        assert_eq!(
            v["text"]["format"]["schema"]["properties"]["stories"]["type"],
            "array"
        );
        assert_eq!(v["input"][0]["role"], "system");
        assert_eq!(v["input"][1]["content"], "Give me news");
        assert!(v.get("temperature").is_none());
    }

    #[test]
    fn output_text_is_concatenated_from_message_parts() {
        let body = r#"{
            "id": "resp_1",
            "output": [
                {"type": "web_search_call", "id": "ws_1", "status": "completed"},
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "[{\"a\":"},
                    {"type": "output_text", "text": "1}]"}
                ]}
            ]
        }"#;
        let resp: Resp = serde_json::from_str(body).unwrap();
        assert_eq!(resp.text(), r#"[{"a":1}]"#);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = provider();
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
        assert_eq!(p.backoff(3), Duration::from_millis(2000));
        assert_eq!(p.backoff(40), MAX_BACKOFF);
    }

    #[test]
    fn retry_policy() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }
}
