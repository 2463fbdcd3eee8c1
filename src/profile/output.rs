//! Output files that disappear unless committed
//!
//! A profile is only useful once fully written. `OutputFile` creates the
//! destination up front, so an unwritable path fails before any profiler
//! starts, and removes it again if the write never completes.

use crate::core::error::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A created output file, removed on drop unless [`OutputFile::commit`] ran
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl OutputFile {
    /// Create (or truncate) the file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| Error::CreateOutput {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "created output file");

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Destination path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the whole profile, flush and sync it, and keep the file.
    /// Returns the path that was written.
    pub fn commit(mut self, contents: &[u8]) -> Result<PathBuf> {
        let path = self.path.clone();
        let wrap = |source| Error::WriteOutput {
            path: path.clone(),
            source,
        };

        // An empty writer means commit already ran; the constructor always sets it
        let mut writer = self.writer.take().ok_or_else(|| {
            wrap(std::io::Error::new(std::io::ErrorKind::Other, "output already committed"))
        })?;

        let written = writer
            .write_all(contents)
            .and_then(|_| writer.flush())
            .and_then(|_| writer.get_ref().sync_all());

        match written {
            Ok(()) => {
                debug!(path = %path.display(), bytes = contents.len(), "committed output file");
                Ok(path)
            }
            Err(source) => {
                drop(writer);
                remove_partial(&path);
                Err(wrap(source))
            }
        }
    }
}

impl Drop for OutputFile {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
            remove_partial(&self.path);
        }
    }
}

fn remove_partial(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed incomplete output file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove incomplete output file"),
    }
}
