//! Profiler front-ends
//!
//! Thin, resource-safe wrappers around the profilers the process carries:
//! the `pprof` CPU sampler, jemalloc's heap profiler, the symbol resolver and
//! the `tracing` timeline recorder.

pub mod cpu;
pub mod heap;
pub mod output;
pub mod symbol;
pub mod timeline;

pub use cpu::{CpuProfileSession, CpuSettings};
pub use output::OutputFile;
pub use timeline::TraceRecorder;
