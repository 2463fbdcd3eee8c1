//! CPU profiling through the `pprof` sampler
//!
//! Two ways in: a [`CpuProfileSession`] that writes to a file when it ends,
//! and [`capture`] which samples for a fixed duration and returns the encoded
//! profile. Both share the process-wide sampler, so only one can run at a time.

use crate::core::config::CpuConfig;
use crate::core::error::{Error, Result};
use crate::profile::output::OutputFile;
use pprof::protos::Message;
use pprof::{ProfilerGuard, ProfilerGuardBuilder};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Sampler settings
#[derive(Debug, Clone)]
pub struct CpuSettings {
    /// Samples per second
    pub frequency: i32,
    /// Shared objects whose frames are skipped
    pub blocklist: Vec<String>,
}

impl Default for CpuSettings {
    fn default() -> Self {
        Self::from(&CpuConfig::default())
    }
}

impl From<&CpuConfig> for CpuSettings {
    fn from(config: &CpuConfig) -> Self {
        Self {
            frequency: config.frequency,
            blocklist: config.blocklist.clone(),
        }
    }
}

fn start_profiler(settings: &CpuSettings) -> Result<ProfilerGuard<'static>> {
    ProfilerGuardBuilder::default()
        .frequency(settings.frequency)
        .blocklist(settings.blocklist.as_slice())
        .build()
        .map_err(Error::ProfilerStart)
}

/// Build the report while the sampler is still running and encode it as
/// uncompressed pprof protobuf
fn encode_report(guard: &ProfilerGuard<'_>) -> Result<Vec<u8>> {
    let report = guard.report().build().map_err(Error::ProfileReport)?;
    let profile = report.pprof().map_err(Error::ProfileReport)?;

    let mut body = Vec::new();
    profile
        .encode(&mut body)
        .map_err(|e| Error::ProfileEncode(e.to_string()))?;
    Ok(body)
}

struct Running {
    guard: ProfilerGuard<'static>,
    output: OutputFile,
    started: Instant,
}

impl Running {
    fn stop(self) -> Result<PathBuf> {
        let Running {
            guard,
            output,
            started,
        } = self;

        let encoded = encode_report(&guard);
        // Dropping the guard stops the sampler before anything touches the disk
        drop(guard);

        let body = encoded?;
        let path = output.commit(&body)?;
        info!(
            path = %path.display(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "CPU profile written"
        );
        Ok(path)
    }
}

/// A running CPU profile bound to an output file.
///
/// The profile is stopped and flushed exactly once: by [`finish`](Self::finish)
/// or, if that never runs, when the session is dropped.
pub struct CpuProfileSession {
    running: Option<Running>,
}

impl CpuProfileSession {
    /// Start sampling into `output`. If the sampler cannot start, `output`
    /// is dropped and its file removed.
    pub fn start(output: OutputFile, settings: &CpuSettings) -> Result<Self> {
        let guard = start_profiler(settings)?;
        info!(
            path = %output.path().display(),
            frequency = settings.frequency,
            "CPU profiling started"
        );

        Ok(Self {
            running: Some(Running {
                guard,
                output,
                started: Instant::now(),
            }),
        })
    }

    /// Stop sampling and write the profile; returns the written path
    pub fn finish(mut self) -> Result<PathBuf> {
        let running = self.running.take().ok_or_else(|| {
            Error::Io(std::io::Error::other("CPU profiling session already stopped"))
        })?;
        running.stop()
    }
}

impl Drop for CpuProfileSession {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            if let Err(e) = running.stop() {
                error!(error = %e, "CPU profile could not be written on early exit");
            }
        }
    }
}

/// Sample the whole process for `duration` and return the encoded profile.
/// Runs on a blocking thread; fails immediately if the sampler is busy.
pub async fn capture(duration: Duration, settings: CpuSettings) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || {
        let guard = start_profiler(&settings)?;
        info!(
            seconds = duration.as_secs_f64(),
            frequency = settings.frequency,
            "CPU profile capture started"
        );
        std::thread::sleep(duration);
        let body = encode_report(&guard)?;
        info!(bytes = body.len(), "CPU profile capture finished");
        Ok(body)
    })
    .await?
}
