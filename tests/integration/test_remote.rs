//! Integration tests for the HTTP-facing pieces against a mock service.
//!
//! The mock implements the lesson, execution and validation endpoints with
//! behaviour keyed on the submitted code, so each test can drive one path.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use academy_client::{
    submit_exercise, ApiClient, ExerciseValidator, ValidationClient, VerdictStatus,
};
use academy_core::{parse, BackendKind, Config, MemoryStore, ProgressLedger, ProgressStore};
use academy_render::LessonRenderer;
use academy_runtime::{ExecutionBackend, ExecutionGateway, GatewayState, RemoteBackend};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// Request timeout used by every client in these tests.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(1);

/// How long the mock stalls on "slow" requests; longer than `CLIENT_TIMEOUT`.
const STALL: Duration = Duration::from_secs(3);

#[derive(Default)]
struct Mock {
    healthy: AtomicBool,
    health_delay_ms: u64,
    health_hits: AtomicUsize,
    validate_hits: AtomicUsize,
    last_validate: Mutex<Option<Value>>,
}

impl Mock {
    fn healthy() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            ..Self::default()
        }
    }
}

async fn health(State(mock): State<Arc<Mock>>) -> StatusCode {
    mock.health_hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(mock.health_delay_ms)).await;
    if mock.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn execute(Json(request): Json<Value>) -> Response {
    let code = request["code"].as_str().unwrap_or_default().to_string();
    let timeout = request["timeout"].as_u64().unwrap_or_default();
    match code.as_str() {
        "slow" => {
            tokio::time::sleep(STALL).await;
            Json(json!({"success": true})).into_response()
        }
        "server-error" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Sandbox crashed"})),
        )
            .into_response(),
        "garbage" => (StatusCode::OK, "not json").into_response(),
        c if c.contains("raise") => Json(json!({
            "success": false,
            "stdout": "before\n",
            "stderr": "Traceback (most recent call last):\nValueError: bad\n",
            "result": null,
            "execution_time": 0.5,
            "error": "ValueError: bad"
        }))
        .into_response(),
        _ => Json(json!({
            "success": true,
            "stdout": format!("timeout={timeout}\n"),
            "stderr": "",
            "result": null,
            "execution_time": 0.25,
            "error": null
        }))
        .into_response(),
    }
}

async fn validate(State(mock): State<Arc<Mock>>, Json(request): Json<Value>) -> Response {
    mock.validate_hits.fetch_add(1, Ordering::SeqCst);
    let code = request["code"].as_str().unwrap_or_default().to_string();
    *mock.last_validate.lock().expect("lock") = Some(request);

    match code.as_str() {
        "correct" => Json(json!({
            "result": "passed",
            "passed_tests": 2,
            "total_tests": 2,
            "feedback": "All tests passed!",
            "error_message": null,
            "stdout": "",
            "stderr": ""
        }))
        .into_response(),
        "wrong" => Json(json!({
            "result": "failed",
            "passed_tests": 1,
            "total_tests": 2,
            "feedback": "Test 1 passed\nTest 2 failed: AssertionError",
            "stdout": "",
            "stderr": ""
        }))
        .into_response(),
        "crash" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Validator crashed"})),
        )
            .into_response(),
        "teapot" => StatusCode::IM_A_TEAPOT.into_response(),
        "slow" => {
            tokio::time::sleep(STALL).await;
            Json(json!({"result": "passed"})).into_response()
        }
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": "Exercise not found"})),
        )
            .into_response(),
    }
}

async fn module(Path(id): Path<String>) -> Response {
    if id != "01-tensors" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": format!("Module {id} not found")})),
        )
            .into_response();
    }
    Json(json!({
        "metadata": {
            "id": "01-tensors",
            "title": "Tensors",
            "order": 1,
            "prerequisites": [],
            "estimated_minutes": 20,
            "pytorch_version": "2.2",
            "section": "fundamentals",
            "section_order": 1
        },
        "content": "Intro\n<CodeCell id=\"c1\">print(1)</CodeCell>\n<Exercise id=\"ex1\">Do it.</Exercise>\n",
        "exercises": {
            "ex1": {
                "starter_code": "x = None",
                "hints": ["one"],
                "validation": {"type": "assert", "tests": ["assert x == 1"]},
                "solution": "x = 1",
                "difficulty": "easy"
            }
        }
    }))
    .into_response()
}

async fn curriculum() -> Json<Value> {
    Json(json!({
        "sections": [{
            "id": "fundamentals",
            "title": "Fundamentals",
            "order": 1,
            "modules": [
                {"id": "01-tensors", "title": "Tensors", "order": 1},
                {"id": "02-operations", "title": "Operations", "order": 2, "estimated_minutes": 45}
            ]
        }],
        "total_modules": 2,
        "total_estimated_minutes": 75
    }))
}

async fn docs(Path(symbol): Path<String>) -> Json<Value> {
    Json(json!({
        "symbol": symbol,
        "signature": format!("{symbol}(*size, dtype=None)"),
        "url": format!("https://pytorch.org/docs/stable/generated/{symbol}.html")
    }))
}

/// Starts the mock service on an ephemeral port and returns its base URL.
async fn spawn_mock(mock: Arc<Mock>) -> String {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/execute", post(execute))
        .route("/api/validate", post(validate))
        .route("/api/modules/:id", get(module))
        .route("/api/curriculum", get(curriculum))
        .route("/api/docs/pytorch/:symbol", get(docs))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");

    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });

    format!("http://{addr}")
}

/// A base URL on which nothing is listening.
fn dead_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let port = listener.local_addr().expect("Failed to get local addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}")
}

fn remote_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.backend = BackendKind::Remote;
    config.api_url = format!("{base_url}/");
    config.http.request_timeout_seconds = 1;
    config
}

// ============================================================================
// Remote execution
// ============================================================================

#[tokio::test]
async fn test_remote_gateway_executes_after_health_check() {
    let mock = Arc::new(Mock::healthy());
    let base = spawn_mock(mock.clone()).await;
    let gateway = ExecutionGateway::from_config(&remote_config(&base)).expect("gateway");

    assert_eq!(gateway.backend_name(), "remote");
    assert!(!gateway.execute("print(1)").await.success);

    gateway.initialize().await.expect("initialize");
    assert_eq!(gateway.state(), GatewayState::Ready);

    let result = gateway.execute("print(1)").await;
    assert!(result.success, "{result:?}");
    assert_eq!(result.stdout, "timeout=10\n");
    assert_eq!(result.execution_time_ms, Some(250));
    assert_eq!(mock.health_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_fault_is_reported_in_result() {
    let base = spawn_mock(Arc::new(Mock::healthy())).await;
    let backend = RemoteBackend::new(&base, 10, CLIENT_TIMEOUT).expect("backend");

    let result = backend.execute("print('before')\nraise ValueError('bad')").await;
    assert!(!result.success);
    assert_eq!(result.stdout, "before\n");
    assert!(result.stderr.contains("Traceback"));
    assert_eq!(result.error.as_deref(), Some("ValueError: bad"));
    assert_eq!(result.execution_time_ms, Some(500));
}

#[tokio::test]
async fn test_remote_http_errors_become_failures() {
    let base = spawn_mock(Arc::new(Mock::healthy())).await;
    let backend = RemoteBackend::new(&base, 10, CLIENT_TIMEOUT).expect("backend");

    let result = backend.execute("server-error").await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Sandbox crashed"));

    let result = backend.execute("garbage").await;
    assert!(!result.success);
    assert!(result.error.expect("error").contains("Invalid response"));
}

#[tokio::test]
async fn test_remote_timeout_becomes_failure() {
    let base = spawn_mock(Arc::new(Mock::healthy())).await;
    let backend = RemoteBackend::new(&base, 10, CLIENT_TIMEOUT).expect("backend");

    let result = backend.execute("slow").await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Execution request timed out"));
}

#[tokio::test]
async fn test_unhealthy_service_fails_then_recovers() {
    let mock = Arc::new(Mock::default());
    let base = spawn_mock(mock.clone()).await;
    let gateway = ExecutionGateway::from_config(&remote_config(&base)).expect("gateway");

    let err = gateway.initialize().await.expect_err("service is down");
    assert!(err.is_retryable());
    assert!(matches!(gateway.state(), GatewayState::Failed(reason) if reason.contains("503")));

    mock.healthy.store(true, Ordering::SeqCst);
    gateway.initialize().await.expect("retry succeeds");
    assert!(gateway.ready());
    assert_eq!(mock.health_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_initialize_hits_health_once() {
    let mock = Arc::new(Mock {
        healthy: AtomicBool::new(true),
        health_delay_ms: 100,
        ..Mock::default()
    });
    let base = spawn_mock(mock.clone()).await;
    let gateway = ExecutionGateway::from_config(&remote_config(&base)).expect("gateway");

    let calls = (0..5).map(|_| {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.initialize().await })
    });
    for outcome in futures::future::join_all(calls).await {
        outcome.expect("task").expect("initialize");
    }
    assert_eq!(mock.health_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_service() {
    let gateway = ExecutionGateway::from_config(&remote_config(&dead_url())).expect("gateway");

    let err = gateway.initialize().await.expect_err("nothing is listening");
    assert!(err.to_string().contains("remote backend unavailable"));
    assert!(!gateway.execute("print(1)").await.success);
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_validation_request_shape_and_verdicts() {
    let mock = Arc::new(Mock::healthy());
    let base = spawn_mock(mock.clone()).await;
    let client = ValidationClient::new(&base, CLIENT_TIMEOUT).expect("client");

    let verdict = client.validate("01-tensors", "ex1", "wrong").await;
    assert_eq!(verdict.result, VerdictStatus::Failed);
    assert_eq!((verdict.passed_tests, verdict.total_tests), (1, 2));
    assert_eq!(verdict.feedback.lines().count(), 2);
    assert!(verdict.feedback.ends_with("AssertionError"));

    let sent = mock.last_validate.lock().expect("lock").clone().expect("request");
    assert_eq!(
        sent,
        json!({"module_id": "01-tensors", "exercise_id": "ex1", "code": "wrong"})
    );
}

#[tokio::test]
async fn test_validation_error_statuses() {
    let base = spawn_mock(Arc::new(Mock::healthy())).await;
    let client = ValidationClient::new(&base, CLIENT_TIMEOUT).expect("client");

    let verdict = client.validate("01-tensors", "ex1", "crash").await;
    assert_eq!(verdict.result, VerdictStatus::Error);
    assert_eq!(verdict.error_message.as_deref(), Some("Validator crashed"));
    assert_eq!((verdict.passed_tests, verdict.total_tests), (0, 0));

    let verdict = client.validate("01-tensors", "ex1", "teapot").await;
    assert_eq!(verdict.result, VerdictStatus::Error);
    assert_eq!(verdict.error_message.as_deref(), Some("HTTP 418"));
}

#[tokio::test]
async fn test_validation_timeout_verdict() {
    let base = spawn_mock(Arc::new(Mock::healthy())).await;
    let client = ValidationClient::new(&base, CLIENT_TIMEOUT).expect("client");

    let verdict = client.validate("01-tensors", "ex1", "slow").await;
    assert_eq!(verdict.result, VerdictStatus::Timeout);
    assert_eq!((verdict.passed_tests, verdict.total_tests), (0, 0));
    assert!(verdict.error_message.is_some());
}

#[tokio::test]
async fn test_validation_unreachable_is_error_verdict() {
    let client = ValidationClient::new(dead_url(), CLIENT_TIMEOUT).expect("client");

    let verdict = client.validate("01-tensors", "ex1", "correct").await;
    assert_eq!(verdict.result, VerdictStatus::Error);
    assert_eq!((verdict.passed_tests, verdict.total_tests), (0, 0));
}

#[tokio::test]
async fn test_submit_records_pass_once() {
    let mock = Arc::new(Mock::healthy());
    let base = spawn_mock(mock.clone()).await;
    let client = ValidationClient::new(&base, CLIENT_TIMEOUT).expect("client");
    let storage = Arc::new(MemoryStore::new());
    let mut store = ProgressStore::load(storage.clone(), "academy");

    let failed = submit_exercise(&client, &mut store, "01-tensors", "ex1", "wrong").await;
    assert!(!failed.passed());
    assert!(!store.is_exercise_completed("01-tensors", "ex1"));
    assert!(storage.is_empty());

    for _ in 0..2 {
        let verdict = submit_exercise(&client, &mut store, "01-tensors", "ex1", "correct").await;
        assert!(verdict.passed());
    }
    assert_eq!(store.completed_exercise_count("01-tensors"), 1);
    assert_eq!(mock.validate_hits.load(Ordering::SeqCst), 3);

    let reloaded = ProgressStore::load(storage, "academy");
    assert!(reloaded.is_exercise_completed("01-tensors", "ex1"));
}

// ============================================================================
// Lesson API
// ============================================================================

#[tokio::test]
async fn test_fetch_and_render_module() {
    let base = spawn_mock(Arc::new(Mock::healthy())).await;
    let client = ApiClient::new(&base, CLIENT_TIMEOUT).expect("client");

    let lesson = client.get_module("01-tensors").await.expect("module");
    assert_eq!(lesson.metadata.title, "Tensors");
    assert_eq!(lesson.metadata.estimated_minutes, 20);
    assert_eq!(lesson.exercise_count(), 1);

    let segments = parse(&lesson.raw_body);
    let rendered = LessonRenderer::new(&lesson, &ProgressLedger::default()).render(&segments);
    assert!(rendered.issues.is_empty());
    assert!(rendered.markdown.contains("<!-- cell: c1 -->"));
    assert!(rendered.markdown.contains("Exercise `ex1` (easy)"));
}

#[tokio::test]
async fn test_missing_module_is_not_found() {
    let base = spawn_mock(Arc::new(Mock::healthy())).await;
    let client = ApiClient::new(&base, CLIENT_TIMEOUT).expect("client");

    let err = client.get_module("99-nope").await.expect_err("missing module");
    assert!(err.is_not_found());
    assert!(err.to_string().contains("Module 99-nope not found"));
}

#[tokio::test]
async fn test_fetch_curriculum_and_docs() {
    let base = spawn_mock(Arc::new(Mock::healthy())).await;
    let client = ApiClient::new(&base, CLIENT_TIMEOUT).expect("client");

    let curriculum = client.get_curriculum().await.expect("curriculum");
    assert_eq!(curriculum.total_modules, 2);
    assert_eq!(curriculum.module("02-operations").expect("module").estimated_minutes, 45);
    assert_eq!(curriculum.module("01-tensors").expect("module").estimated_minutes, 30);

    let info = client.get_doc_info("torch.zeros").await.expect("docs");
    assert_eq!(info.symbol, "torch.zeros");
    assert_eq!(info.signature.as_deref(), Some("torch.zeros(*size, dtype=None)"));
    assert_eq!(info.description, None);
}

#[tokio::test]
async fn test_doc_symbol_is_sent_as_one_path_segment() {
    let base = spawn_mock(Arc::new(Mock::healthy())).await;
    let client = ApiClient::new(&base, CLIENT_TIMEOUT).expect("client");

    let info = client.get_doc_info("torch.Tensor/view as").await.expect("docs");
    assert_eq!(info.symbol, "torch.Tensor/view as");
    assert!(info.url.contains("torch.Tensor/view as"));
}
