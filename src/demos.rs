//! The four demo programs
//!
//! Each function is one program body: open the output, start the profiler,
//! do the work, stop. Errors propagate to the caller instead of being printed
//! and swallowed, so the binary can exit non-zero.

use crate::core::config::Config;
use crate::core::error::Result;
use crate::profile::{heap, CpuProfileSession, CpuSettings, OutputFile};
use crate::workload;
use std::hint::black_box;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a CPU demo produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuRun {
    /// Result of the workload
    pub sum: u64,
    /// Where the profile was written
    pub profile: PathBuf,
}

/// Profile `work` into `path`: the file is created first, then the sampler
/// starts, then `work` runs. The session is finished here on success and by
/// its destructor on any other exit.
pub fn profile_to_file<T>(
    path: &Path,
    settings: &CpuSettings,
    work: impl FnOnce() -> T,
) -> Result<(T, PathBuf)> {
    let output = OutputFile::create(path)?;
    let session = CpuProfileSession::start(output, settings)?;

    let value = work();

    let written = session.finish()?;
    Ok((value, written))
}

/// `cpu-loop`: inline summing loop profiled into `output.cpu_loop_path`
pub fn run_cpu_loop(config: &Config) -> Result<CpuRun> {
    let bound = config.workload.loop_bound;
    let settings = CpuSettings::from(&config.cpu);

    let (sum, profile) = profile_to_file(&config.output.cpu_loop_path, &settings, || {
        let mut sum: u64 = 0;
        for i in 0..=bound {
            sum = black_box(sum.wrapping_add(i));
        }
        sum
    })?;

    println!("Sum: {}", sum);
    info!(bound, sum, "cpu-loop finished");
    Ok(CpuRun { sum, profile })
}

/// `cpu-sum`: the same work behind `workload::sum_numbers`, profiled into
/// `output.cpu_sum_path`
pub fn run_cpu_sum(config: &Config) -> Result<CpuRun> {
    let bound = config.workload.sum_bound;
    let settings = CpuSettings::from(&config.cpu);

    let (sum, profile) = profile_to_file(&config.output.cpu_sum_path, &settings, || {
        workload::sum_numbers(bound)
    })?;

    println!("Sum: {}", sum);
    info!(bound, sum, "cpu-sum finished");
    Ok(CpuRun { sum, profile })
}

/// `heap`: snapshot live allocations into `output.heap_path`
pub async fn run_heap(config: &Config) -> Result<PathBuf> {
    heap::write_heap_profile(&config.output.heap_path).await
}
