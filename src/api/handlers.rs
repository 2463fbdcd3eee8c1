//! HTTP request handlers for the `/debug/pprof/` endpoints

use axum::{
    extract::{Path, Query, RawQuery, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS},
        StatusCode,
    },
    response::{Html, IntoResponse, Response},
};
use bytes::Bytes;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::{AppState, Error};
use crate::profile::{cpu, heap, symbol};

/// Shared state as the router hands it to handlers
pub type SharedState = Arc<AppState>;

/// One entry on the index page
pub struct ProfileEntry {
    /// Path segment under `/debug/pprof/`
    pub name: &'static str,
    /// What the endpoint returns
    pub description: &'static str,
}

/// Profiles listed on the index page
pub const PROFILES: &[ProfileEntry] = &[
    ProfileEntry {
        name: "allocs",
        description: "A sampling of memory allocations of live objects. Same data as heap.",
    },
    ProfileEntry {
        name: "cmdline",
        description: "The command line invocation of the current program, arguments separated by NUL bytes.",
    },
    ProfileEntry {
        name: "heap",
        description: "A sampling of memory allocations of live objects, taken from jemalloc.",
    },
    ProfileEntry {
        name: "profile",
        description: "CPU profile. You can specify the duration in the seconds GET parameter. Open the result with pprof.",
    },
    ProfileEntry {
        name: "symbol",
        description: "Maps program counters to function names. Send addresses joined by + in the query or POST body.",
    },
    ProfileEntry {
        name: "trace",
        description: "A timeline of tracing spans and events in Chrome trace format. You can specify the duration in the seconds GET parameter.",
    },
];

static INDEX_PAGE: Lazy<String> = Lazy::new(|| {
    let mut rows = String::new();
    let mut descriptions = String::new();
    for profile in PROFILES {
        rows.push_str(&format!(
            "<tr><td><a href=\"{name}\">{name}</a></td></tr>\n",
            name = profile.name
        ));
        descriptions.push_str(&format!(
            "<li><div class=profile-name>{}: </div> {}</li>\n",
            profile.name, profile.description
        ));
    }

    format!(
        "<html>\n<head>\n<title>/debug/pprof/</title>\n</head>\n<body>\n/debug/pprof/\n<br>\n\
         Types of profiles available:\n<table>\n<thead><td>Profile</td></thead>\n{rows}</table>\n\
         <a href=\"profile\">full CPU profile</a>\n<br>\n<p>\nProfile Descriptions:\n<ul>\n{descriptions}</ul>\n</p>\n\
         </body>\n</html>\n"
    )
});

/// Errors surfaced to HTTP clients as plain text
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or out-of-range request parameters
    BadRequest(String),
    /// The requested profiler is compiled out or switched off
    Forbidden(String),
    /// The profiler failed or is busy
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        warn!(status = status.as_u16(), error = %message, "pprof request failed");

        (
            status,
            [
                (CONTENT_TYPE, "text/plain; charset=utf-8"),
                (X_CONTENT_TYPE_OPTIONS, "nosniff"),
            ],
            message,
        )
            .into_response()
    }
}

/// `seconds` parameter shared by the capture endpoints
#[derive(Debug, Default, Deserialize)]
pub struct CaptureQuery {
    /// Requested capture length; parsed leniently
    pub seconds: Option<String>,
}

/// Whole seconds for CPU profiles: missing, unparsable or non-positive
/// values fall back to the default
pub fn profile_duration(raw: Option<&str>, default: u64, max: u64) -> Result<Duration, ApiError> {
    let seconds = raw
        .and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|s| *s > 0)
        .map(|s| s as u64)
        .unwrap_or(default);

    if seconds > max {
        return Err(ApiError::BadRequest(
            "profile duration exceeds server's maximum capture duration".to_string(),
        ));
    }
    Ok(Duration::from_secs(seconds))
}

/// Fractional seconds for traces, same fallback rules
pub fn trace_duration(raw: Option<&str>, default: f64, max: u64) -> Result<Duration, ApiError> {
    let seconds = raw
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(default);

    if seconds > max as f64 {
        return Err(ApiError::BadRequest(
            "profile duration exceeds server's maximum capture duration".to_string(),
        ));
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// `GET /debug/pprof/`
pub async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE.as_str())
}

/// `GET /debug/pprof/{cmd}`: named profiles; anything else gets the index
pub async fn named_profile(Path(cmd): Path<String>) -> Response {
    match cmd.as_str() {
        "heap" | "allocs" => heap_profile().await.into_response(),
        other => {
            debug!(name = other, "unknown profile name, serving index");
            index().await.into_response()
        }
    }
}

async fn heap_profile() -> Result<Response, ApiError> {
    let body = heap::dump().await.map_err(|e| match e {
        Error::HeapProfilingUnavailable | Error::HeapProfilingInactive => {
            ApiError::Forbidden(e.to_string())
        }
        e => ApiError::Internal(e.to_string()),
    })?;

    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream"),
            (CONTENT_DISPOSITION, "attachment; filename=\"heap\""),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Bytes::from(body),
    )
        .into_response())
}

/// `GET /debug/pprof/cmdline`
pub async fn cmdline() -> impl IntoResponse {
    let args: Vec<String> = std::env::args_os()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    (
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        args.join("\0"),
    )
}

/// `GET /debug/pprof/profile?seconds=N`
pub async fn profile(
    State(state): State<SharedState>,
    Query(query): Query<CaptureQuery>,
) -> Result<Response, ApiError> {
    let duration = profile_duration(
        query.seconds.as_deref(),
        state.server.default_profile_seconds,
        state.server.max_capture_seconds,
    )?;

    let body = cpu::capture(duration, state.cpu.clone())
        .await
        .map_err(|e| match e {
            e if e.is_busy() => {
                ApiError::Internal(format!("Could not enable CPU profiling: {}", e))
            }
            e => ApiError::Internal(e.to_string()),
        })?;

    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream"),
            (CONTENT_DISPOSITION, "attachment; filename=\"profile\""),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Bytes::from(body),
    )
        .into_response())
}

/// `GET /debug/pprof/symbol?0x...+0x...`
pub async fn symbol(RawQuery(query): RawQuery) -> Result<Response, ApiError> {
    symbol_response(query.unwrap_or_default()).await
}

/// `POST /debug/pprof/symbol` with `0x...+0x...` in the body
pub async fn symbol_post(body: Bytes) -> Result<Response, ApiError> {
    symbol_response(String::from_utf8_lossy(&body).into_owned()).await
}

async fn symbol_response(request: String) -> Result<Response, ApiError> {
    // Loading debug info can take a while the first time
    let body = tokio::task::spawn_blocking(move || symbol::symbolize(&request))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        body,
    )
        .into_response())
}

/// `GET /debug/pprof/trace?seconds=N`
pub async fn trace(
    State(state): State<SharedState>,
    Query(query): Query<CaptureQuery>,
) -> Result<Response, ApiError> {
    let duration = trace_duration(
        query.seconds.as_deref(),
        state.server.default_trace_seconds,
        state.server.max_capture_seconds,
    )?;

    let body = state.trace.capture(duration).await.map_err(|e| match e {
        e if e.is_busy() => ApiError::Internal(format!("Could not enable tracing: {}", e)),
        e => ApiError::Internal(e.to_string()),
    })?;

    Ok((
        [
            (CONTENT_TYPE, "application/json"),
            (CONTENT_DISPOSITION, "attachment; filename=\"trace\""),
            (X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        Bytes::from(body),
    )
        .into_response())
}
