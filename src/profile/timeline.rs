//! Execution timeline recording
//!
//! A `tracing` layer that, while a capture is active, records span entry/exit
//! and events as Chrome trace events. The output opens in `chrome://tracing`
//! or Perfetto. Only one capture can run at a time.

use crate::core::error::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: u64 = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
}

/// One Chrome trace-event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Span or event name
    pub name: String,
    /// Category; the `tracing` target
    pub cat: String,
    /// Phase: `B` span enter, `E` span exit, `i` instant event
    pub ph: String,
    /// Microseconds since the recorder was created
    pub ts: f64,
    /// Process id
    pub pid: u32,
    /// Recorder-assigned thread id
    pub tid: u64,
    /// Recorded fields
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

/// Top-level document returned by a finished capture
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceDocument {
    /// Recorded events in arrival order
    pub trace_events: Vec<TraceEvent>,
    /// Display unit hint for viewers
    pub display_time_unit: String,
    /// Capture metadata
    pub other_data: TraceMetadata,
}

/// Capture metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct TraceMetadata {
    /// Events discarded after the buffer filled up
    pub dropped_events: u64,
    /// Wall-clock length of the capture in microseconds
    pub duration_us: u64,
}

#[derive(Default)]
struct Buffer {
    events: Vec<TraceEvent>,
    dropped: u64,
}

struct Inner {
    epoch: Instant,
    active: AtomicBool,
    max_events: usize,
    buffer: Mutex<Buffer>,
}

impl Inner {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn record(&self, name: &str, cat: &str, ph: &str, args: Map<String, Value>) {
        let event = TraceEvent {
            name: name.to_string(),
            cat: cat.to_string(),
            ph: ph.to_string(),
            ts: self.epoch.elapsed().as_secs_f64() * 1_000_000.0,
            pid: std::process::id(),
            tid: THREAD_ID.with(|id| *id),
            args,
        };

        let mut buffer = self.buffer.lock();
        if buffer.events.len() >= self.max_events {
            buffer.dropped += 1;
        } else {
            buffer.events.push(event);
        }
    }
}

/// Shared handle to the process trace recorder
#[derive(Clone)]
pub struct TraceRecorder {
    inner: Arc<Inner>,
}

impl TraceRecorder {
    /// Create a recorder that keeps at most `max_events` per capture
    pub fn new(max_events: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                epoch: Instant::now(),
                active: AtomicBool::new(false),
                max_events,
                buffer: Mutex::new(Buffer::default()),
            }),
        }
    }

    /// The `tracing` layer feeding this recorder
    pub fn layer(&self) -> TimelineLayer {
        TimelineLayer {
            inner: self.inner.clone(),
        }
    }

    /// Whether a capture is running
    pub fn is_active(&self) -> bool {
        self.inner.is_active()
    }

    /// Start a capture; fails if one is already running
    pub fn begin(&self) -> Result<TraceCapture> {
        self.inner
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::TraceActive)?;

        *self.inner.buffer.lock() = Buffer::default();

        Ok(TraceCapture {
            inner: self.inner.clone(),
            started: Instant::now(),
            finished: false,
        })
    }

    /// Record for `duration`, then return the encoded trace
    pub async fn capture(&self, duration: Duration) -> Result<Vec<u8>> {
        let capture = self.begin()?;
        tracing::info!(seconds = duration.as_secs_f64(), "trace capture started");
        tokio::time::sleep(duration).await;
        let trace = capture.finish()?;
        tracing::info!(bytes = trace.len(), "trace capture finished");
        Ok(trace)
    }
}

/// A running capture; dropping it without `finish` discards the events
pub struct TraceCapture {
    inner: Arc<Inner>,
    started: Instant,
    finished: bool,
}

impl TraceCapture {
    /// Stop recording and collect the events
    pub fn document(mut self) -> TraceDocument {
        self.finished = true;

        // Take the events before releasing the recorder to the next capture
        let buffer = std::mem::take(&mut *self.inner.buffer.lock());
        self.inner.active.store(false, Ordering::Release);
        TraceDocument {
            trace_events: buffer.events,
            display_time_unit: "ms".to_string(),
            other_data: TraceMetadata {
                dropped_events: buffer.dropped,
                duration_us: self.started.elapsed().as_micros() as u64,
            },
        }
    }

    /// Stop recording and encode the events as Chrome trace JSON
    pub fn finish(self) -> Result<Vec<u8>> {
        let document = self.document();
        serde_json::to_vec(&document).map_err(|e| Error::Io(e.into()))
    }
}

impl Drop for TraceCapture {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.active.store(false, Ordering::Release);
            *self.inner.buffer.lock() = Buffer::default();
        }
    }
}

/// Fields captured when a span is created during an active capture
struct SpanArgs(Map<String, Value>);

/// Layer half of [`TraceRecorder`]
pub struct TimelineLayer {
    inner: Arc<Inner>,
}

impl<S> Layer<S> for TimelineLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if !self.inner.is_active() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            let mut args = Map::new();
            attrs.record(&mut JsonVisitor(&mut args));
            span.extensions_mut().insert(SpanArgs(args));
        }
    }

    fn on_enter(&self, id: &Id, ctx: Context<'_, S>) {
        if !self.inner.is_active() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            let args = span
                .extensions()
                .get::<SpanArgs>()
                .map(|a| a.0.clone())
                .unwrap_or_default();
            let meta = span.metadata();
            self.inner.record(meta.name(), meta.target(), "B", args);
        }
    }

    fn on_exit(&self, id: &Id, ctx: Context<'_, S>) {
        if !self.inner.is_active() {
            return;
        }
        if let Some(span) = ctx.span(id) {
            let meta = span.metadata();
            self.inner.record(meta.name(), meta.target(), "E", Map::new());
        }
    }

    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !self.inner.is_active() {
            return;
        }
        let mut args = Map::new();
        event.record(&mut JsonVisitor(&mut args));

        let meta = event.metadata();
        let name = match args.remove("message") {
            Some(Value::String(message)) => message,
            Some(other) => other.to_string(),
            None => meta.name().to_string(),
        };
        args.insert("level".to_string(), Value::from(meta.level().as_str()));
        self.inner.record(&name, meta.target(), "i", args);
    }
}

struct JsonVisitor<'a>(&'a mut Map<String, Value>);

impl Visit for JsonVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0
            .insert(field.name().to_string(), Value::from(format!("{:?}", value)));
    }
}
