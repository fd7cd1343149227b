use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use runonchange::watch::WatchBackend;

/// A `WatchBackend` that records subscriptions instead of watching.
#[derive(Debug, Clone, Default)]
pub struct RecordingWatch {
    subscribed: Arc<Mutex<Vec<PathBuf>>>,
    fail_on: Arc<Mutex<Option<PathBuf>>>,
}

impl RecordingWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subscribing `dir` fail with "path not found".
    pub fn fail_on(&self, dir: impl Into<PathBuf>) {
        *self.fail_on.lock().unwrap() = Some(dir.into());
    }

    /// Subscribed directories, sorted.
    pub fn subscribed(&self) -> Vec<PathBuf> {
        let mut dirs = self.subscribed.lock().unwrap().clone();
        dirs.sort();
        dirs
    }
}

impl WatchBackend for RecordingWatch {
    fn subscribe(&mut self, dir: &Path) -> notify::Result<()> {
        if self.fail_on.lock().unwrap().as_deref() == Some(dir) {
            return Err(notify::Error::path_not_found().add_path(dir.to_path_buf()));
        }
        self.subscribed.lock().unwrap().push(dir.to_path_buf());
        Ok(())
    }
}
