//! HTTP adapter tests against a throwaway axum server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Router;
use serde_json::{json, Value};

use study_forge::gemini::GeminiClient;
use study_forge::retry::RetryPolicy;
use study_forge::Synthesizer;
use study_forge_core::cancel::CancelFlag;
use study_forge_core::completion::{
    CompletionRequest, CompletionService, ContentPart, FailureKind, GenerationConfig,
};
use study_forge_core::models::Document;
use study_forge_core::policy::ModelPolicy;

struct Recorded {
    path: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Default)]
struct MockGemini {
    responses: Mutex<VecDeque<(StatusCode, String)>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockGemini {
    fn respond(&self, status: StatusCode, body: impl Into<String>) {
        self.responses.lock().unwrap().push_back((status, body.into()));
    }

    fn reply_text(&self, text: &str) {
        self.respond(
            StatusCode::OK,
            json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] }).to_string(),
        );
    }
}

async fn handle(
    State(mock): State<Arc<MockGemini>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    mock.requests.lock().unwrap().push(Recorded {
        path: uri.path().to_string(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    });
    mock.responses
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, "no response queued".into()))
}

async fn start_mock() -> (Arc<MockGemini>, String) {
    let mock = Arc::new(MockGemini::default());
    let app = Router::new().fallback(handle).with_state(mock.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (mock, format!("http://{}", addr))
}

fn client(base_url: &str) -> GeminiClient {
    GeminiClient::new(base_url, "test-key", Duration::from_secs(5)).unwrap()
}

fn text_request() -> CompletionRequest {
    CompletionRequest {
        model: "gemini-test".into(),
        parts: vec![ContentPart::text("Summarize this.")],
        config: GenerationConfig::text(0.4, 1024).with_thinking(512),
    }
}

#[tokio::test]
async fn sends_generate_content_request() {
    let (mock, base) = start_mock().await;
    mock.reply_text("All done.");

    let reply = client(&base).complete(&text_request()).await.unwrap();
    assert_eq!(reply, "All done.");

    let requests = mock.requests.lock().unwrap();
    let recorded = &requests[0];
    assert_eq!(recorded.path, "/v1beta/models/gemini-test:generateContent");
    assert_eq!(recorded.api_key.as_deref(), Some("test-key"));
    assert_eq!(
        recorded.body["contents"][0]["parts"][0]["text"],
        "Summarize this."
    );
    assert_eq!(recorded.body["generationConfig"]["maxOutputTokens"], 1024);
    assert_eq!(
        recorded.body["generationConfig"]["thinkingConfig"]["thinkingBudget"],
        512
    );
}

#[tokio::test]
async fn failures_are_classified() {
    let (mock, base) = start_mock().await;
    mock.respond(StatusCode::TOO_MANY_REQUESTS, "quota");
    mock.respond(StatusCode::SERVICE_UNAVAILABLE, "try later");
    mock.respond(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "code": 500, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" } })
            .to_string(),
    );
    mock.respond(
        StatusCode::BAD_REQUEST,
        json!({ "error": { "code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT" } })
            .to_string(),
    );
    mock.respond(StatusCode::OK, json!({ "candidates": [] }).to_string());

    let client = client(&base);
    let request = text_request();
    let kinds: Vec<(FailureKind, String)> = {
        let mut out = Vec::new();
        for _ in 0..5 {
            let err = client.complete(&request).await.unwrap_err();
            out.push((err.kind, err.message));
        }
        out
    };
    assert_eq!(kinds[0].0, FailureKind::RateLimited);
    assert_eq!(kinds[1].0, FailureKind::Unavailable);
    assert_eq!(kinds[2].0, FailureKind::Overloaded);
    assert_eq!(kinds[3].0, FailureKind::Fatal);
    assert!(kinds[3].1.contains("API key not valid"));
    assert_eq!(kinds[4].0, FailureKind::Fatal);
}

#[tokio::test]
async fn connection_errors_are_fatal() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}", addr))
        .complete(&text_request())
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Fatal);
}

#[tokio::test]
async fn synthesizer_retries_over_http() {
    let (mock, base) = start_mock().await;
    mock.respond(StatusCode::SERVICE_UNAVAILABLE, "busy");
    mock.respond(StatusCode::SERVICE_UNAVAILABLE, "busy");
    mock.reply_text("OVERVIEW:\nA short image summary.");

    let synth = Synthesizer::new(
        Arc::new(client(&base)),
        ModelPolicy::two_tier("fast-model", "capable-model"),
        RetryPolicy::new(3, Duration::from_millis(5), Duration::from_millis(5)),
    );
    let image = Document::new(vec![0x89, b'P', b'N', b'G'], "image/png");
    let summary = synth
        .summarize(&image, "tldr", &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(summary.text, "OVERVIEW:\nA short image summary.");

    let requests = mock.requests.lock().unwrap();
    assert_eq!(requests.len(), 3);
    assert_eq!(
        requests[2].path,
        "/v1beta/models/capable-model:generateContent"
    );
    let blob = &requests[2].body["contents"][0]["parts"][0]["inlineData"];
    assert_eq!(blob["mimeType"], "image/png");
    assert_eq!(blob["data"], "iVBORw==");
}
