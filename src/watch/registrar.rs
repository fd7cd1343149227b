// src/watch/registrar.rs

//! Subscribes the watch targets with the notification backend and owns the
//! backend until shutdown closes it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info};

use crate::errors::{Result, RunOnChangeError};
use crate::fs::FileSystem;

/// The one call the registrar needs from a notification backend.
///
/// Production uses [`RecommendedWatcher`]; tests can record subscriptions
/// instead.
pub trait WatchBackend: Send {
    /// Start watching a single directory (not its children).
    fn subscribe(&mut self, dir: &Path) -> notify::Result<()>;
}

impl WatchBackend for RecommendedWatcher {
    fn subscribe(&mut self, dir: &Path) -> notify::Result<()> {
        self.watch(dir, RecursiveMode::NonRecursive)
    }
}

pub struct Registrar {
    backend: Mutex<Option<Box<dyn WatchBackend>>>,
    fs: Arc<dyn FileSystem>,
    recursive: bool,
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("recursive", &self.recursive)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Registrar {
    pub fn new(backend: Box<dyn WatchBackend>, fs: Arc<dyn FileSystem>, recursive: bool) -> Self {
        Self {
            backend: Mutex::new(Some(backend)),
            fs,
            recursive,
        }
    }

    /// Subscribe every target, walking each one when recursive.
    ///
    /// Returns how many directories were subscribed. On failure the error
    /// carries the count reached so far.
    pub fn register(&self, targets: &[PathBuf]) -> Result<usize> {
        let mut guard = self.lock();
        let backend = guard.as_mut().ok_or_else(|| {
            RunOnChangeError::WatcherError(notify::Error::generic("watcher already closed"))
        })?;

        let mut registered = 0;
        for target in targets {
            self.subscribe_tree(backend.as_mut(), target, &mut registered)?;
        }

        info!(registered, recursive = self.recursive, "watch targets registered");
        Ok(registered)
    }

    /// Subscribe a directory created after startup, along with anything
    /// beneath it.
    ///
    /// Does nothing unless recursive, when `dir` is not a directory, or once
    /// the registrar is closed.
    pub fn subscribe_created(&self, dir: &Path) -> Result<usize> {
        if !self.recursive || !self.fs.is_dir(dir) {
            return Ok(0);
        }

        let mut guard = self.lock();
        let Some(backend) = guard.as_mut() else {
            return Ok(0);
        };

        let mut registered = 0;
        self.subscribe_tree(backend.as_mut(), dir, &mut registered)?;
        Ok(registered)
    }

    /// Drop the backend so no further raw events are produced.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        let closed = self.lock().take().is_some();
        if closed {
            debug!("watcher closed");
        }
        closed
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    fn subscribe_tree(
        &self,
        backend: &mut dyn WatchBackend,
        root: &Path,
        registered: &mut usize,
    ) -> Result<()> {
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            backend
                .subscribe(&dir)
                .map_err(|source| RunOnChangeError::RegisterError {
                    registered: *registered,
                    path: dir.clone(),
                    source,
                })?;
            *registered += 1;
            debug!(path = %dir.display(), "subscribed");

            if !self.recursive {
                continue;
            }

            let children =
                self.fs
                    .subdirectories(&dir)
                    .map_err(|err| RunOnChangeError::RegisterError {
                        registered: *registered,
                        path: dir.clone(),
                        source: notify::Error::io(err),
                    })?;
            pending.extend(children);
        }

        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn WatchBackend>>> {
        // A panic while holding the lock leaves the Option itself intact.
        self.backend
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
