// tests/openai_mock.rs
use late_news::config::LlmConfig;
use late_news::curate::CurationConfig;
use late_news::llm::openai::OpenAiResponses;
use late_news::llm::StorySource;
use std::time::Duration;

const RESPONSES_BODY: &str = include_str!("fixtures/responses_api.json");

fn provider(base: String, retries: u8) -> OpenAiResponses {
    let llm = LlmConfig {
        api_base: base,
        api_key: "fake-api-key".into(),
        max_retries: retries,
        timeout_secs: 5,
        ..LlmConfig::default()
    };
    OpenAiResponses::from_config(&llm, &CurationConfig::default())
        .unwrap()
        .with_backoff(Duration::from_millis(1))
}

#[tokio::test]
async fn successful_call_returns_output_text_and_metadata() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/responses")
        .match_header("authorization", "Bearer fake-api-key")
        .match_body(mockito::Matcher::PartialJsonString(
            r#"{"model":"gpt-5","tools":[{"type":"web_search"}]}"#.to_string(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(RESPONSES_BODY)
        .create_async()
        .await;

    let reply = provider(server.url(), 3)
        .fetch("Find me AI news")
        .await
        .expect("fetch ok");

    assert_eq!(reply.response_id.as_deref(), Some("resp_test_123"));
    assert_eq!(reply.model.as_deref(), Some("gpt-5-2025-08-07"));
    assert_eq!(reply.usage.unwrap().total_tokens, 2000);
    let items = late_news::story::parse_reply(&reply.text).unwrap();
    assert_eq!(items.len(), 2);

    mock.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/responses")
        .with_status(401)
        .with_body(r#"{"error":{"message":"bad key"}}"#)
        .expect(1)
        .create_async()
        .await;

    let err = provider(server.url(), 3)
        .fetch("Find me AI news")
        .await
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("401"), "{msg}");
    assert!(msg.contains("bad key"), "{msg}");

    mock.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried_up_to_the_limit() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/responses")
        .with_status(503)
        .with_body("overloaded")
        .expect(3)
        .create_async()
        .await;

    let err = provider(server.url(), 2)
        .fetch("Find me AI news")
        .await
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("503"), "{msg}");
    assert!(msg.contains("giving up after 3 attempt(s)"), "{msg}");

    mock.assert_async().await;
}

#[tokio::test]
async fn zero_retries_means_a_single_attempt() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/responses")
        .with_status(502)
        .expect(1)
        .create_async()
        .await;

    let err = provider(server.url(), 0)
        .fetch("Find me AI news")
        .await
        .unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("giving up after 1 attempt(s)"), "{msg}");

    mock.assert_async().await;
}

#[tokio::test]
async fn empty_prompt_never_hits_the_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/responses")
        .expect(0)
        .create_async()
        .await;

    assert!(provider(server.url(), 1).fetch("   ").await.is_err());
    mock.assert_async().await;
}
