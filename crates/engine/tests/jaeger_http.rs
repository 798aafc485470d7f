use std::collections::HashMap;
use std::net::TcpListener as StdTcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use locator_core::config::Config;
use locator_core::error::LocatorError;
use locator_core::model::StepStatus;
use locator_core::query::TraceSearchParams;
use locator_engine::{JaegerClient, TraceSearchService, TraceStore};
use testkit::{failed_trace, healthy_trace, jaeger_envelope, jaeger_list, sample_trace};

type Captured = Arc<Mutex<Vec<HashMap<String, String>>>>;

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn fake_jaeger(captured: Captured) -> Router {
    Router::new()
        .route("/api/traces", get(find_traces))
        .route("/api/traces/{id}", get(get_trace))
        .route("/api/services", get(services))
        .route("/api/services/{service}/operations", get(operations))
        .with_state(captured)
}

async fn find_traces(
    State(captured): State<Captured>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    captured.lock().unwrap().push(params);
    Json(jaeger_envelope(&[
        failed_trace("f1", "alice"),
        healthy_trace("h1", "alice"),
        failed_trace("f2", "bob"),
        healthy_trace("h2", "bob"),
        failed_trace("f3", "carol"),
    ]))
}

async fn get_trace(Path(id): Path<String>) -> impl IntoResponse {
    match id.as_str() {
        "t1" => (StatusCode::OK, Json(jaeger_envelope(&[sample_trace("t1")]))),
        "empty" => (
            StatusCode::OK,
            Json(serde_json::json!({
                "data": null,
                "errors": [{"code": 404, "msg": "trace not found"}]
            })),
        ),
        _ => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"data": null, "errors": [{"code": 404, "msg": "not found"}]})),
        ),
    }
}

async fn services() -> Json<serde_json::Value> {
    Json(jaeger_list(&["AIAssistantInfra/aiai-api", "jaeger-all-in-one"]))
}

async fn operations(Path(service): Path<String>) -> Json<serde_json::Value> {
    Json(jaeger_list(&[&format!("{service}:POST /chat")]))
}

fn config(base: &str) -> Config {
    Config {
        jaeger_base_url: base.to_string(),
        service_name: "AIAssistantInfra/aiai-api".to_string(),
        fetch_timeout: Duration::from_millis(300),
        ..Config::default()
    }
}

fn closed_port() -> u16 {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn get_trace_over_http() {
    let base = spawn(fake_jaeger(Captured::default())).await;
    let svc = TraceSearchService::from_config(&config(&base)).unwrap();

    let trace = svc.get_trace("t1").await.unwrap().unwrap();
    assert_eq!(trace.status, StepStatus::Failed);
    assert_eq!(trace.duration_ms, 100);
    assert_eq!(trace.steps.len(), 3);
    assert_eq!(trace.service, "AIAssistantInfra/aiai-api");

    assert!(svc.get_trace("nope").await.unwrap().is_none());
    assert!(svc.get_trace("empty").await.unwrap().is_none());
}

#[tokio::test]
async fn search_sends_backend_params_and_filters_locally() {
    let captured = Captured::default();
    let base = spawn(fake_jaeger(captured.clone())).await;
    let svc = TraceSearchService::from_config(&config(&base)).unwrap();

    let params = TraceSearchParams {
        status: Some(StepStatus::Failed),
        operation: Some("POST /chat".to_string()),
        limit: 2,
        ..TraceSearchParams::default()
    };
    let result = svc.search_traces(&params).await.unwrap();
    assert_eq!(result.total, 2);
    assert!(result.has_more);
    assert_eq!(result.traces.len(), 2);

    let sent = captured.lock().unwrap().pop().unwrap();
    assert_eq!(sent["service"], "AIAssistantInfra/aiai-api");
    assert_eq!(sent["limit"], "2");
    assert_eq!(sent["operation"], "POST /chat");
    let start: i64 = sent["start"].parse().unwrap();
    let end: i64 = sent["end"].parse().unwrap();
    assert_eq!(end - start, 3_600_000_000);
}

#[tokio::test]
async fn operations_and_services_decode_lists() {
    let base = spawn(fake_jaeger(Captured::default())).await;
    let svc = TraceSearchService::from_config(&config(&base)).unwrap();

    let ops = svc.list_operations().await.unwrap();
    assert_eq!(ops, vec!["AIAssistantInfra/aiai-api:POST /chat"]);

    let services = svc.list_services().await.unwrap();
    assert_eq!(services.len(), 2);
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let router = Router::new().route(
        "/api/traces/{id}",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(jaeger_envelope(&[]))
        }),
    );
    let base = spawn(router).await;
    let client = JaegerClient::new(&config(&base)).unwrap();

    let err = client.fetch_trace("t1").await.unwrap_err();
    match err {
        LocatorError::UpstreamTimeout { target, elapsed } => {
            assert_eq!(target, "/api/traces/t1");
            assert!(elapsed >= Duration::from_millis(250));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_keep_status_and_body() {
    let router = Router::new().route(
        "/api/traces",
        get(|| async { (StatusCode::BAD_GATEWAY, "storage backend unavailable") }),
    );
    let base = spawn(router).await;
    let svc = TraceSearchService::from_config(&config(&base)).unwrap();

    let err = svc
        .search_traces(&TraceSearchParams::default())
        .await
        .unwrap_err();
    match err {
        LocatorError::Upstream {
            status, message, ..
        } => {
            assert_eq!(status, Some(502));
            assert!(message.contains("storage backend unavailable"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_an_upstream_error() {
    let router = Router::new().route("/api/services", get(|| async { "<html>login</html>" }));
    let base = spawn(router).await;
    let client = JaegerClient::new(&config(&base)).unwrap();

    let err = client.services().await.unwrap_err();
    assert!(matches!(err, LocatorError::Upstream { .. }));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn malformed_traces_do_not_hide_good_ones() {
    let router = Router::new().route(
        "/api/traces",
        get(|| async {
            let mut envelope = jaeger_envelope(&[sample_trace("good")]);
            let data = envelope["data"].as_array_mut().unwrap();
            data.push(serde_json::json!({
                "traceID": "junk",
                "spans": [{"spanID": "x", "tags": [{"key": "error", "value": true}, "garbage"]}]
            }));
            data.push(serde_json::json!({
                "traceID": "floaty",
                "spans": [{"spanID": "y", "operationName": "POST /chat", "startTime": 1.7e15, "duration": 2.5e3}]
            }));
            data.push(serde_json::json!("not a trace"));
            Json(envelope)
        }),
    );
    let base = spawn(router).await;
    let svc = TraceSearchService::from_config(&config(&base)).unwrap();

    let result = svc
        .search_traces(&TraceSearchParams::default())
        .await
        .unwrap();
    let ids = result
        .traces
        .iter()
        .map(|t| t.trace_id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["good", "junk", "floaty"]);
    assert_eq!(result.traces[0].steps.len(), 3);
    assert_eq!(result.traces[1].status, StepStatus::Failed);
    assert_eq!(result.traces[2].steps[0].duration_ms, 2);
}

#[tokio::test]
async fn refused_connection_is_an_upstream_error() {
    let base = format!("http://127.0.0.1:{}", closed_port());
    let client = JaegerClient::new(&config(&base)).unwrap();

    let err = client.fetch_trace("t1").await.unwrap_err();
    assert!(matches!(err, LocatorError::Upstream { status: None, .. }));
}
