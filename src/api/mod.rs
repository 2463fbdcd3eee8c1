//! # API Module
//!
//! HTTP surface for on-demand profiling.
//!
//! ## Endpoints Overview
//!
//! - `GET /debug/pprof/` - Index of available profiles
//! - `GET /debug/pprof/cmdline` - Process arguments, NUL separated
//! - `GET /debug/pprof/profile?seconds=N` - CPU profile (pprof protobuf)
//! - `GET|POST /debug/pprof/symbol` - Address to function name lookup
//! - `GET /debug/pprof/trace?seconds=N` - Span/event timeline (Chrome trace JSON)
//! - `GET /debug/pprof/heap`, `/debug/pprof/allocs` - jemalloc heap profile
//! - `GET /debug/pprof/{anything else}` - Index

pub mod handlers;
pub mod server;

// Re-export commonly used items
pub use handlers::ApiError;
pub use server::{create_app, serve, shutdown_signal, start_server};
