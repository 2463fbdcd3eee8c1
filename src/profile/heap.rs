//! Heap profiling through jemalloc
//!
//! jemalloc samples allocations itself once `prof:true` is set (see the
//! exported `malloc_conf` in the crate root). A dump is a point-in-time
//! snapshot of live allocations, gzip-compressed pprof.

use crate::core::error::{Error, Result};
use crate::profile::output::OutputFile;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reference the exported `malloc_conf` so the linker keeps it in any
/// binary that can take a heap dump
fn link_malloc_conf() {
    std::hint::black_box(crate::malloc_conf);
}

/// Whether jemalloc was built and configured with heap profiling
pub fn is_available() -> bool {
    link_malloc_conf();
    jemalloc_pprof::PROF_CTL.as_ref().is_some()
}

/// Snapshot current heap allocations as a pprof profile
pub async fn dump() -> Result<Vec<u8>> {
    link_malloc_conf();
    let prof_ctl = jemalloc_pprof::PROF_CTL
        .as_ref()
        .ok_or(Error::HeapProfilingUnavailable)?;

    let mut prof_ctl = prof_ctl.lock().await;
    if !prof_ctl.activated() {
        return Err(Error::HeapProfilingInactive);
    }

    prof_ctl.dump_pprof().map_err(Error::HeapDump)
}

/// Write a heap snapshot to `path`. The file is removed again if the
/// snapshot cannot be taken.
pub async fn write_heap_profile(path: impl AsRef<Path>) -> Result<PathBuf> {
    let output = OutputFile::create(path)?;
    let profile = dump().await?;
    let path = output.commit(&profile)?;

    info!(path = %path.display(), bytes = profile.len(), "heap profile written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_profiling_is_available() {
        assert!(is_available(), "jemalloc did not pick up malloc_conf");
    }

    #[test]
    fn test_write_heap_profile_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heap.prof");

        let written = tokio_test::block_on(write_heap_profile(&path)).unwrap();

        assert_eq!(written, path);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_unwritable_path_reports_create_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("heap.prof");

        let err = tokio_test::block_on(write_heap_profile(&path)).unwrap_err();
        assert!(matches!(err, Error::CreateOutput { .. }));
        assert!(!path.exists());
    }
}
