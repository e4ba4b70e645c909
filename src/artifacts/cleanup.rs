//! Temporary file cleanup
//!
//! Every temporary path collected during a request is guaranteed removal on
//! every exit path. Writes into the store go through a temp file plus rename,
//! with a guard covering the window before the rename lands.

use std::path::PathBuf;

/// Removes a temporary file on drop unless disarmed.
///
/// Holds the path from creation until the owning operation either completes
/// (and calls [`TempFileGuard::disarm`]) or unwinds, in which case the file
/// is removed on drop. Removal failures are ignored; the hourly stray-file
/// backstop picks up anything left behind.
pub struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    /// Guard the given path
    pub fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    /// The operation succeeded; leave the file alone.
    pub fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(&path);
        }
    }
}
