//! Gemini streaming generator integration tests
//!
//! Use `set_body_raw(bytes, "text/event-stream")` so wiremock keeps the
//! SSE content type.

use std::sync::Arc;

use futures::StreamExt;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dbcoach::config::GeminiConfig;
use dbcoach::generation::{GeminiGenerator, GenerationRequest, TextGenerator};
use dbcoach::session::{GenerationSession, SessionRunner, TaskDefinition};

const STREAM_PATH: &str = "/v1beta/models/gemini-1.5-flash:streamGenerateContent";

fn make_generator(server: &MockServer) -> GeminiGenerator {
    GeminiGenerator::new(GeminiConfig {
        api_base: server.uri(),
        api_key: Some("gemini-test-key".to_string()),
        timeout_seconds: 5,
        ..Default::default()
    })
    .expect("valid gemini config")
}

fn request() -> GenerationRequest {
    GenerationRequest {
        task_id: "schema".to_string(),
        task_label: "Schema Design".to_string(),
        system_prompt: "You are the Schema Architect".to_string(),
        prompt: "a shop".to_string(),
    }
}

fn sse_event(text: &str) -> String {
    format!(
        "data: {}\r\n\r\n",
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
    )
}

#[tokio::test]
async fn test_stream_yields_candidate_text() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{}data: {{\"candidates\":[{{\"content\":{{\"parts\":[]}},\"finishReason\":\"STOP\"}}]}}\r\n\r\n",
        sse_event("Hel"),
        sse_event("lo")
    );

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "gemini-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let chunks: Vec<String> = make_generator(&server)
        .stream(request())
        .await
        .unwrap()
        .map(|c| c.unwrap())
        .collect()
        .await;
    assert_eq!(chunks, vec!["Hel", "lo"]);
}

#[tokio::test]
async fn test_http_error_carries_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":{"message":"API key not valid"}}"#),
        )
        .mount(&server)
        .await;

    let result = make_generator(&server).stream(request()).await;
    let err = match result {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert!(err.to_string().contains("API key not valid"));
}

#[tokio::test]
async fn test_error_event_ends_stream_with_error() {
    let server = MockServer::start().await;
    let body = format!(
        "{}data: {{\"error\":{{\"code\":503,\"message\":\"overloaded\"}}}}\n\n",
        sse_event("partial")
    );
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream"))
        .mount(&server)
        .await;

    let items: Vec<_> = make_generator(&server)
        .stream(request())
        .await
        .unwrap()
        .collect()
        .await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "partial");
    assert!(items[1].as_ref().unwrap_err().to_string().contains("overloaded"));
}

#[tokio::test]
async fn test_session_over_gemini() {
    let server = MockServer::start().await;
    let body = format!("{}{}", sse_event("CREATE "), sse_event("TABLE"));
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.into_bytes(), "text/event-stream"))
        .expect(2)
        .mount(&server)
        .await;

    let session = GenerationSession::with_tasks(
        "a bookshop",
        "PostgreSQL",
        vec![
            TaskDefinition::new("analysis", "Requirements Analysis", "Requirements Analyst"),
            TaskDefinition::new("schema", "Schema Design", "Schema Architect"),
        ],
    )
    .unwrap();
    let runner = SessionRunner::new(Arc::new(make_generator(&server)), 4);
    let conversation = runner.spawn(session).wait().await.unwrap();

    assert_eq!(conversation.generated_content["analysis"], "CREATE TABLE");
    assert_eq!(conversation.generated_content["schema"], "CREATE TABLE");
    assert_eq!(conversation.metadata.unwrap().chunk_count, 4);
}
