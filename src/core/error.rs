//! Error types and handling for the profiling demos
//!
//! Every failure a demo or a route can hit is a variant here; callers
//! propagate with `?` and the binary turns the final error into an exit code.

use std::path::PathBuf;
use thiserror::Error;

/// Main result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the profiling demos
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The output file could not be created
    #[error("could not create output file {path:?}: {source}")]
    CreateOutput {
        /// Path that was being created
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// The profile could not be written to its output file
    #[error("could not write profile to {path:?}: {source}")]
    WriteOutput {
        /// Path that was being written
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// The CPU profiler refused to start, usually because it is already running
    #[error("could not start CPU profiler: {0}")]
    ProfilerStart(#[source] pprof::Error),

    /// The CPU profiler could not produce a report
    #[error("could not build CPU profile report: {0}")]
    ProfileReport(#[source] pprof::Error),

    /// The CPU profile could not be encoded as protobuf
    #[error("could not encode CPU profile: {0}")]
    ProfileEncode(String),

    /// The allocator was not built with heap profiling enabled
    #[error("could not write memory profile: heap profiling is not available in this build")]
    HeapProfilingUnavailable,

    /// Heap profiling is compiled in but switched off
    #[error("could not write memory profile: heap profiling is not activated")]
    HeapProfilingInactive,

    /// jemalloc failed to dump its heap profile
    #[error("could not write memory profile: {0}")]
    HeapDump(#[source] anyhow::Error),

    /// A trace capture is already in progress
    #[error("tracing is already enabled")]
    TraceActive,

    /// The HTTP listener could not bind its address
    #[error("pprof server listen failed on {addr}: {source}")]
    Bind {
        /// Address as configured
        addr: String,
        /// Underlying I/O failure
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error
    #[error("pprof server failed: {0}")]
    Serve(#[source] std::io::Error),

    /// A blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// I/O errors from std
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means a process-wide profiler was busy with another capture
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::ProfilerStart(_) | Self::TraceActive)
    }
}

/// Format a bind failure for an address that may not have resolved to a `SocketAddr`
pub(crate) fn bind_error(addr: impl std::fmt::Display, source: std::io::Error) -> Error {
    Error::Bind {
        addr: addr.to_string(),
        source,
    }
}
