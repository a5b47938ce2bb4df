//! Model clients and sessions against mock provider endpoints.

use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use equity_tool::config::ModelConfig;
use equity_tool::fetch::FetchOptions;
use equity_tool::llm::{self, FailureKind};
use equity_tool::models::Role;
use equity_tool::qa::{QaEngine, QaError};
use equity_tool::session::Session;
use equity_tool::traits::LanguageModel as _;

#[derive(Default)]
struct Seen {
    paths: Mutex<Vec<String>>,
    bodies: Mutex<Vec<Value>>,
    calls: AtomicUsize,
    /// Number of leading calls answered with 503.
    fail_first: usize,
}

async fn gemini(
    State(seen): State<Arc<Seen>>,
    headers: HeaderMap,
    uri: Uri,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let call = seen.calls.fetch_add(1, Ordering::SeqCst);
    seen.paths.lock().unwrap().push(uri.path().to_string());
    seen.bodies.lock().unwrap().push(body);

    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    if call < seen.fail_first {
        return (StatusCode::SERVICE_UNAVAILABLE, "overloaded").into_response();
    }
    Json(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": "Revenue grew 12%." }] },
            "finishReason": "STOP"
        }]
    }))
    .into_response()
}

async fn openai(headers: HeaderMap, Json(body): Json<Value>) -> axum::response::Response {
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer test-key") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    let model = body["model"].as_str().unwrap_or_default().to_string();
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": format!("answered by {}", model) } }]
    }))
    .into_response()
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn spawn_gemini(fail_first: usize) -> (String, Arc<Seen>) {
    let seen = Arc::new(Seen {
        fail_first,
        ..Seen::default()
    });
    let app = Router::new().fallback(gemini).with_state(seen.clone());
    (spawn(app).await, seen)
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn gemini_config(base_url: String) -> ModelConfig {
    ModelConfig {
        model: "gemini-test".to_string(),
        base_url: Some(base_url),
        timeout_secs: Some(5),
        ..ModelConfig::default()
    }
}

#[tokio::test]
async fn gemini_request_shape_and_answer() {
    let (base, seen) = spawn_gemini(0).await;
    let model = llm::build_model(&gemini_config(base), "test-key".to_string()).unwrap();

    let answer = model.generate("How much did revenue grow?").await.unwrap();
    assert_eq!(answer, "Revenue grew 12%.");

    let paths = seen.paths.lock().unwrap();
    assert_eq!(paths[0], "/v1beta/models/gemini-test:generateContent");
    let bodies = seen.bodies.lock().unwrap();
    assert_eq!(
        bodies[0]["contents"][0]["parts"][0]["text"],
        "How much did revenue grow?"
    );
}

#[tokio::test]
async fn wrong_key_is_a_status_failure() {
    let (base, _) = spawn_gemini(0).await;
    let model = llm::build_model(&gemini_config(base), "wrong".to_string()).unwrap();
    let failure = model.generate("q").await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Status(401));
    assert!(!failure.is_retryable());
}

#[tokio::test]
async fn openai_compatible_endpoint() {
    let base = spawn(Router::new().fallback(openai)).await;
    let config = ModelConfig {
        provider: "openai".to_string(),
        model: "gpt-test".to_string(),
        base_url: Some(base),
        ..ModelConfig::default()
    };
    let model = llm::build_model(&config, "test-key".to_string()).unwrap();
    assert_eq!(model.generate("q").await.unwrap(), "answered by gpt-test");
}

#[tokio::test]
async fn transport_fault_leaves_no_assistant_message() {
    let dead = format!("http://127.0.0.1:{}", find_free_port());
    let model = llm::build_model(&gemini_config(dead), "test-key".to_string()).unwrap();
    let engine = QaEngine::new(model, "EquityTool");
    let mut session = Session::new("alice", engine, FetchOptions::default()).unwrap();
    session.load_direct_text("Revenue grew 12% in Q3.").unwrap();

    let err = session.ask("How much?").await.unwrap_err();
    match err {
        QaError::ModelFailure(f) => assert_eq!(f.kind, FailureKind::Transport),
        other => panic!("unexpected error: {:?}", other),
    }

    let last = session.messages().last().unwrap();
    assert_eq!(last.role, Role::User);
    assert_eq!(last.content, "How much?");
    assert_eq!(
        session
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count(),
        1,
        "only the welcome message"
    );
}

#[tokio::test]
async fn session_prompt_carries_the_whole_corpus() {
    let (base, seen) = spawn_gemini(0).await;
    let model = llm::build_model(&gemini_config(base), "test-key".to_string()).unwrap();
    let engine = QaEngine::new(model, "EquityTool");
    let mut session = Session::new("alice", engine, FetchOptions::default()).unwrap();

    let corpus = "Q3 revenue: $4.2M.\n".repeat(500);
    session.load_direct_text(&corpus).unwrap();
    let answer = session.ask("What was revenue?").await.unwrap();
    assert_eq!(answer, "Revenue grew 12%.");

    let bodies = seen.bodies.lock().unwrap();
    let prompt = bodies[0]["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains(&corpus));
    assert!(prompt.ends_with("Question: What was revenue?\nAnswer in English:\n"));
    assert_eq!(session.messages().last().unwrap().role, Role::Assistant);
}

#[tokio::test]
async fn server_errors_are_retried_only_when_configured() {
    let (base, seen) = spawn_gemini(2).await;
    let model = llm::build_model(&gemini_config(base.clone()), "test-key".to_string()).unwrap();

    let mut corpus = equity_tool::corpus::CorpusManager::new();
    corpus.load_direct_text("text");

    let no_retry = QaEngine::new(model.clone(), "EquityTool");
    assert!(no_retry.ask(corpus.corpus(), "q").await.is_err());
    assert_eq!(seen.calls.load(Ordering::SeqCst), 1);

    let retrying = QaEngine::new(model, "EquityTool")
        .with_max_retries(3)
        .with_retry_base(Duration::from_millis(5));
    assert_eq!(
        retrying.ask(corpus.corpus(), "q").await.unwrap(),
        "Revenue grew 12%."
    );
    // One more 503, then success.
    assert_eq!(seen.calls.load(Ordering::SeqCst), 3);
}
