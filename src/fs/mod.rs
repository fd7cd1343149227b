// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub mod mock;

/// The directory queries the watch registrar needs.
pub trait FileSystem: Send + Sync + Debug {
    /// True if `path` is a directory, following symlinks.
    fn is_dir(&self, path: &Path) -> bool;

    /// Full paths of the directories directly inside `path`.
    ///
    /// Symlinks are not followed, so a link back up the tree cannot loop a
    /// recursive walk. Any I/O error reading an entry is returned.
    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn subdirectories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }
}
