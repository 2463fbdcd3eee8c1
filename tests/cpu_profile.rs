//! CPU profiling sessions against real files
//!
//! The sampler is process-wide, so every test here takes `SERIAL` first.

use profiling_demos::demos::{profile_to_file, run_cpu_loop, run_cpu_sum};
use profiling_demos::profile::{cpu, CpuProfileSession, CpuSettings, OutputFile};
use profiling_demos::workload::{sum_numbers, triangular};
use profiling_demos::{Config, Error};
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

#[test]
fn test_cpu_sum_writes_profile() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.output.cpu_sum_path = dir.path().join("cpu.pprof");
    config.workload.sum_bound = 2_000_000;

    let run = run_cpu_sum(&config).unwrap();
    assert_eq!(run.sum, triangular(2_000_000));
    assert_eq!(run.profile, config.output.cpu_sum_path);
    assert!(file_len(&run.profile) > 0);
}

#[test]
fn test_cpu_loop_writes_profile() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::default();
    config.output.cpu_loop_path = dir.path().join("result.pb");
    config.workload.loop_bound = 1_000_000;

    let run = run_cpu_loop(&config).unwrap();
    assert_eq!(run.sum, 500_000_500_000);
    assert!(file_len(&config.output.cpu_loop_path) > 0);
}

#[test]
fn test_unwritable_output_never_starts_work() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("cpu.pprof");
    let ran = AtomicBool::new(false);

    let result = profile_to_file(&path, &CpuSettings::default(), || {
        ran.store(true, Ordering::SeqCst);
    });

    assert!(matches!(result, Err(Error::CreateOutput { .. })));
    assert!(!ran.load(Ordering::SeqCst));
    assert!(!path.exists());
}

#[test]
fn test_busy_profiler_removes_output_and_skips_work() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.pprof");
    let second = dir.path().join("second.pprof");
    let settings = CpuSettings::default();

    let session = CpuProfileSession::start(OutputFile::create(&first).unwrap(), &settings).unwrap();

    let ran = AtomicBool::new(false);
    let result = profile_to_file(&second, &settings, || {
        ran.store(true, Ordering::SeqCst);
    });
    assert!(matches!(result, Err(Error::ProfilerStart(_))));
    assert!(!ran.load(Ordering::SeqCst));
    assert!(!second.exists());

    session.finish().unwrap();
    assert!(file_len(&first) > 0);
}

#[test]
fn test_dropped_session_still_writes_once() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dropped.pprof");
    let settings = CpuSettings::default();

    {
        let _session =
            CpuProfileSession::start(OutputFile::create(&path).unwrap(), &settings).unwrap();
        assert_eq!(sum_numbers(100_000), triangular(100_000));
    }
    assert!(file_len(&path) > 0);

    // The sampler was released, so a new session can start
    let again = dir.path().join("again.pprof");
    let session = CpuProfileSession::start(OutputFile::create(&again).unwrap(), &settings).unwrap();
    session.finish().unwrap();
    assert!(file_len(&again) > 0);
}

#[test]
fn test_panicking_workload_still_flushes_profile() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("panic.pprof");
    let settings = CpuSettings::default();

    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
        profile_to_file(&path, &settings, || -> u64 { panic!("workload failed") })
    }));

    assert!(outcome.is_err());
    assert!(file_len(&path) > 0);
}

#[tokio::test]
async fn test_capture_returns_profile_bytes() {
    let _serial = serial();

    let body = cpu::capture(Duration::from_millis(200), CpuSettings::default())
        .await
        .unwrap();
    assert!(!body.is_empty());
}

#[tokio::test]
async fn test_capture_rejected_while_session_runs() {
    let _serial = serial();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("held.pprof");
    let settings = CpuSettings::default();

    let session = CpuProfileSession::start(OutputFile::create(&path).unwrap(), &settings).unwrap();
    let result = cpu::capture(Duration::from_millis(10), settings).await;
    assert!(matches!(result, Err(ref e) if e.is_busy()));

    session.finish().unwrap();
}
