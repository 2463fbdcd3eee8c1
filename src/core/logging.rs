//! Logging setup
//!
//! Installs the global `tracing` subscriber: a formatted console layer filtered
//! by `RUST_LOG` (or the configured level) and the timeline layer that feeds
//! `/debug/pprof/trace` captures.

use crate::core::config::LoggingConfig;
use crate::core::error::{Error, Result};
use crate::profile::timeline::TraceRecorder;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Install the global subscriber
pub fn init(config: &LoggingConfig, recorder: &TraceRecorder) -> Result<()> {
    let filter = console_filter(config)?;
    let registry = tracing_subscriber::registry()
        .with(recorder.layer().with_filter(LevelFilter::DEBUG));

    let installed = match config.format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_filter(filter))
            .try_init(),
        _ => registry
            .with(fmt::layer().with_target(true).with_filter(filter))
            .try_init(),
    };

    installed.map_err(|e| Error::config(format!("Failed to install log subscriber: {}", e)))
}

/// `RUST_LOG` wins; otherwise the configured level applies to everything
fn console_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| Error::config(format!("Invalid log level {:?}: {}", config.level, e))),
    }
}
