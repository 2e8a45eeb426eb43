//! Per-document scratch directories.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{trace, warn};

const PREFIX: &str = "batch-ocr-";

/// 32 random alphanumeric characters, comfortably above 128 bits.
const RANDOM_CHARS: usize = 32;

/// A uniquely named directory owned by one document job.
///
/// The directory and everything in it is removed when the handle is
/// dropped or [`Workspace::release`]d. Removal failures are logged and
/// otherwise ignored.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a workspace under the system temporary directory.
    pub fn acquire() -> std::io::Result<Self> {
        Self::acquire_in(&std::env::temp_dir())
    }

    /// Create a workspace under `root`.
    pub fn acquire_in(root: &Path) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .rand_bytes(RANDOM_CHARS)
            .tempdir_in(root)?;
        let path = dir.path().to_path_buf();
        trace!("workspace created {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory now instead of waiting for drop.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => trace!("workspace removed {}", self.path.display()),
                Err(err) => warn!("failed to remove workspace {}: {err}", self.path.display()),
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}
