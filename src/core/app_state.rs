//! Application state shared by the endpoint handlers

use crate::core::config::{Config, ServerConfig};
use crate::profile::{CpuSettings, TraceRecorder};

/// Everything a request handler may read. Cloned into the router once;
/// handlers never mutate it.
#[derive(Clone)]
pub struct AppState {
    /// Capture limits and defaults
    pub server: ServerConfig,

    /// Sampler settings for `/debug/pprof/profile`
    pub cpu: CpuSettings,

    /// Recorder behind `/debug/pprof/trace`; the same one installed in the
    /// global subscriber
    pub trace: TraceRecorder,
}

impl AppState {
    /// Build state from configuration and the process trace recorder
    pub fn new(config: &Config, trace: TraceRecorder) -> Self {
        Self {
            server: config.server.clone(),
            cpu: CpuSettings::from(&config.cpu),
            trace,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        let config = Config::default();
        let trace = TraceRecorder::new(config.server.max_trace_events);
        Self::new(&config, trace)
    }
}
