// src/errors.rs

//! Crate-wide error type and the exit codes it maps onto.

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunOnChangeError {
    #[error("{0}")]
    UsageError(String),

    #[error("invalid FILE_PATTERN {pattern:?}: {source}")]
    PatternError {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("$SHELL: {0}")]
    ShellError(String),

    #[error("DIR_TO_WATCH {}: {reason}", path.display())]
    TargetError { path: PathBuf, reason: String },

    #[error("starting filesystem watcher: {0}")]
    WatcherError(#[source] notify::Error),

    #[error("subscribing {} (after {registered} directories): {source}", path.display())]
    RegisterError {
        registered: usize,
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("{0}")]
    EventStreamError(String),

    #[error("killing process group {pgid}: {source}")]
    KillError {
        pgid: i32,
        #[source]
        source: Errno,
    },

    #[error("starting `{command}`: {source}")]
    SpawnError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Why the supervisor is exiting with a non-zero status.
///
/// The discriminants are the process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Usage = 1,
    Watcher = 2,
    Event = 3,
}

impl ExitReason {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            ExitReason::Usage => "usage",
            ExitReason::Watcher => "watcher",
            ExitReason::Event => "event",
        }
    }
}

impl RunOnChangeError {
    pub fn exit_reason(&self) -> ExitReason {
        match self {
            RunOnChangeError::WatcherError(_) | RunOnChangeError::RegisterError { .. } => {
                ExitReason::Watcher
            }
            RunOnChangeError::EventStreamError(_) => ExitReason::Event,
            _ => ExitReason::Usage,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunOnChangeError>;
