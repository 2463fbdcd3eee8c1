//! Core system types and foundations
//!
//! Error handling, configuration, logging setup and the state shared with
//! the endpoint server.

pub mod app_state;
pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used items
pub use app_state::AppState;
pub use config::Config;
pub use error::{Error, Result};
