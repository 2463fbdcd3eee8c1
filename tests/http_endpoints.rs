//! `/debug/pprof/` endpoint tests
//!
//! Most requests go through the router in-process; one test serves on a real
//! socket to cover binding and graceful shutdown.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;
use profiling_demos::api::{create_app, serve, start_server};
use profiling_demos::{AppState, Config, Error};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

#[inline(never)]
fn endpoint_symbol_marker() -> u32 {
    std::hint::black_box(7)
}

async fn send(state: AppState, method: Method, uri: &str, body: Body) -> Response {
    create_app(state)
        .oneshot(Request::builder().method(method).uri(uri).body(body).unwrap())
        .await
        .unwrap()
}

async fn get(uri: &str) -> Response {
    send(AppState::default(), Method::GET, uri, Body::empty()).await
}

async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_index_lists_profiles() {
    let response = get("/debug/pprof/").await;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_text(response).await;
    assert!(page.contains("Types of profiles available"));
    for name in ["cmdline", "heap", "profile", "symbol", "trace"] {
        assert!(page.contains(&format!("href=\"{}\"", name)), "missing {name}");
    }
}

#[tokio::test]
async fn test_cmdline_returns_process_args() {
    let response = get("/debug/pprof/cmdline").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

    let expected = std::env::args().collect::<Vec<_>>().join("\0");
    assert_eq!(body_text(response).await, expected);
}

#[tokio::test]
async fn test_unregistered_name_falls_through_to_index() {
    let response = get("/debug/pprof/goroutine").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("Types of profiles available"));
}

#[tokio::test]
async fn test_heap_routes_serve_profile() {
    for uri in ["/debug/pprof/heap", "/debug/pprof/allocs"] {
        let response = get(uri).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert!(!body_bytes(response).await.is_empty(), "{uri}");
    }
}

#[tokio::test]
async fn test_profile_rejects_overlong_capture() {
    let response = get("/debug/pprof/profile?seconds=100000").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("exceeds"));
}

#[tokio::test]
async fn test_profile_captures_cpu_profile() {
    let response = get("/debug/pprof/profile?seconds=1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"profile\""
    );
    assert!(!body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_symbol_without_addresses() {
    let response = get("/debug/pprof/symbol").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "num_symbols: 1\n");
}

#[tokio::test]
async fn test_symbol_post_resolves_function() {
    assert_eq!(endpoint_symbol_marker(), 7);
    let addr = endpoint_symbol_marker as usize;

    let response = send(
        AppState::default(),
        Method::POST,
        "/debug/pprof/symbol",
        Body::from(format!("{:#x}+0", addr)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let text = body_text(response).await;
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("num_symbols: 1"));
    let resolved = lines.next().expect("one resolved address");
    assert!(resolved.starts_with(&format!("{:#x} ", addr)));
    assert!(resolved.contains("endpoint_symbol_marker"), "got {resolved}");
    assert_eq!(lines.next(), None);
}

#[tokio::test]
async fn test_trace_returns_chrome_trace() {
    let response = get("/debug/pprof/trace?seconds=0.05").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(json["traceEvents"].is_array());
    assert!(json["otherData"]["duration_us"].as_u64().unwrap() >= 50_000);
}

#[tokio::test]
async fn test_trace_rejected_while_capture_runs() {
    let state = AppState::default();
    let _running = state.trace.begin().unwrap();

    let response = send(state, Method::GET, "/debug/pprof/trace?seconds=0.01", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.contains("Could not enable tracing"));
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = Config::default();
    config.server.addr = taken.local_addr().unwrap().to_string();

    let err = start_server(&config, AppState::default()).await.unwrap_err();
    assert!(matches!(err, Error::Bind { .. }));
    assert!(err.to_string().contains(&config.server.addr));
}

#[tokio::test]
async fn test_serves_over_tcp_and_shuts_down() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(serve(listener, AppState::default(), async move {
        let _ = stop_rx.await;
    }));

    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /debug/pprof/cmdline HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8_lossy(&raw);
    assert!(raw.starts_with("HTTP/1.1 200"), "got {raw}");

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
