//! Configuration management for the profiling demos
//!
//! Defaults reproduce the fixed paths, bounds and address of the demo
//! programs; a TOML file and `PD_*` environment variables can override them.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `-c` is not given
pub const DEFAULT_CONFIG_FILE: &str = "profiling-demos.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output file locations
    pub output: OutputConfig,

    /// CPU-bound workload sizes
    pub workload: WorkloadConfig,

    /// CPU sampler settings
    pub cpu: CpuConfig,

    /// Endpoint server settings
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Output file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// CPU profile written by `cpu-loop`
    pub cpu_loop_path: PathBuf,

    /// CPU profile written by `cpu-sum`
    pub cpu_sum_path: PathBuf,

    /// Heap profile written by `heap`
    pub heap_path: PathBuf,
}

/// Workload sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Inclusive upper bound of the inline loop in `cpu-loop`
    pub loop_bound: u64,

    /// Inclusive upper bound passed to `sum_numbers` in `cpu-sum`
    pub sum_bound: u64,
}

/// CPU sampler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Samples per second
    pub frequency: i32,

    /// Shared objects whose frames are skipped while sampling
    pub blocklist: Vec<String>,
}

/// Endpoint server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address; host names are resolved at startup
    pub addr: String,

    /// Profile duration when `seconds` is absent or invalid
    pub default_profile_seconds: u64,

    /// Trace duration when `seconds` is absent or invalid
    pub default_trace_seconds: f64,

    /// Longest capture a single request may ask for
    pub max_capture_seconds: u64,

    /// Events kept per trace capture before dropping
    pub max_trace_events: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cpu_loop_path: PathBuf::from("./result.pb"),
            cpu_sum_path: PathBuf::from("./cpu.pprof"),
            heap_path: PathBuf::from("./heap.prof"),
        }
    }
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            loop_bound: 787_766_777,
            sum_bound: 1_000_000_000,
        }
    }
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            frequency: 100,
            blocklist: ["libc", "libgcc", "pthread", "vdso"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:6060".to_string(),
            default_profile_seconds: 30,
            default_trace_seconds: 1.0,
            max_capture_seconds: 300,
            max_trace_events: 1_000_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit file, or the default file if present,
    /// then apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE)?,
            None => Config::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!("Failed to read config file {:?}: {}", path.as_ref(), e))
        })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
    }

    /// Apply `PD_*` overrides; `lookup` is `std::env::var` outside of tests
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("PD_SERVER_ADDR") {
            self.server.addr = addr;
        }

        if let Some(freq) = lookup("PD_CPU_FREQUENCY") {
            self.cpu.frequency = freq
                .parse()
                .map_err(|e| Error::config(format!("Invalid CPU frequency: {}", e)))?;
        }

        if let Some(dir) = lookup("PD_OUTPUT_DIR") {
            self.output.rebase(Path::new(&dir));
        }

        if let Some(level) = lookup("PD_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("PD_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(1..=10_000).contains(&self.cpu.frequency) {
            return Err(Error::config("CPU frequency must be between 1 and 10000 Hz"));
        }

        if self.server.addr.trim().is_empty() {
            return Err(Error::config("Server address must not be empty"));
        }

        if self.server.max_capture_seconds == 0 {
            return Err(Error::config("Maximum capture duration must be at least one second"));
        }

        if self.server.default_profile_seconds > self.server.max_capture_seconds
            || self.server.default_trace_seconds > self.server.max_capture_seconds as f64
        {
            return Err(Error::config("Default capture duration exceeds the maximum"));
        }

        if self.server.default_profile_seconds == 0 {
            return Err(Error::config("Default profile duration must be positive"));
        }

        if !(self.server.default_trace_seconds > 0.0) {
            return Err(Error::config("Default trace duration must be positive"));
        }

        if self.server.max_trace_events == 0 {
            return Err(Error::config("Trace event limit must be positive"));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(Error::config("Invalid log level")),
        }

        match self.logging.format.as_str() {
            "pretty" | "json" => {}
            _ => return Err(Error::config("Invalid log format (expected pretty or json)")),
        }

        Ok(())
    }
}

impl OutputConfig {
    /// Move relative output paths under `dir`, keeping their file names
    pub fn rebase(&mut self, dir: &Path) {
        for path in [&mut self.cpu_loop_path, &mut self.cpu_sum_path, &mut self.heap_path] {
            if path.is_relative() {
                if let Some(name) = path.file_name() {
                    *path = dir.join(name);
                }
            }
        }
    }
}
