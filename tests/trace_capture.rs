//! Requests served during a `/debug/pprof/trace` capture show up in it
//!
//! Kept in its own binary: the recorder is installed as this thread's
//! default subscriber, and the current-thread runtime keeps every request
//! on that thread.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use profiling_demos::api::create_app;
use profiling_demos::AppState;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;
use tracing_subscriber::layer::SubscriberExt;

fn request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn events<'a>(trace: &'a Value, name: &'a str, ph: &'a str) -> impl Iterator<Item = &'a Value> {
    trace["traceEvents"]
        .as_array()
        .unwrap()
        .iter()
        .filter(move |e| e["name"] == name && e["ph"] == ph)
}

#[tokio::test]
async fn test_trace_records_request_spans() {
    let state = AppState::default();
    let _default =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(state.trace.layer()));
    let app = create_app(state);

    let capture = tokio::spawn(app.clone().oneshot(request("/debug/pprof/trace?seconds=0.3")));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = app.oneshot(request("/debug/pprof/cmdline")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = capture.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let trace: Value = serde_json::from_slice(&body).unwrap();

    let cmdline_span = events(&trace, "request", "B")
        .find(|e| e["args"]["uri"] == "/debug/pprof/cmdline")
        .expect("request span entered during the capture");
    let exited = events(&trace, "request", "E").any(|e| {
        e["tid"] == cmdline_span["tid"]
            && e["ts"].as_f64().unwrap() >= cmdline_span["ts"].as_f64().unwrap()
    });
    assert!(exited, "request span never exited: {trace}");
}
