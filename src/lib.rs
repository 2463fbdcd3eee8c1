//! Profiling Demos - CPU, heap and trace profiling from inside a Rust process
//!
//! Four small programs drive profilers that already live in the process:
//! file-based CPU profiles (`cpu-loop`, `cpu-sum`), a heap snapshot (`heap`)
//! and an HTTP server exposing captures on demand under `/debug/pprof/`
//! (`serve`).
#![warn(missing_docs)]

// jemalloc as the global allocator so its heap profiler sees every allocation
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Read by jemalloc at startup: turn heap profiling on, sampling every 2^19 bytes
#[allow(non_upper_case_globals)]
#[used]
#[export_name = "malloc_conf"]
pub static malloc_conf: &[u8] = b"prof:true,prof_active:true,lg_prof_sample:19\0";

// Core foundational modules
pub mod core;

// Main functional modules
pub mod api;
pub mod demos;
pub mod profile;
pub mod workload;

// Re-export commonly used items for convenience
pub use crate::core::{AppState, Config, Error, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
