// src/exec/backend.rs

//! Pluggable process backend.
//!
//! The runner talks to an `ExecBackend` instead of `tokio::process` directly,
//! so tests can swap in a fake that never starts a real process.
//!
//! - `ShellBackend` runs `$SHELL -c COMMAND` in a fresh process group.
//! - `kill_group` delivers SIGKILL to a whole process group.

use std::future::Future;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use thiserror::Error;
use tokio::process::Command;

/// How a single COMMAND run ended badly.
///
/// Reported to the operator, never turned into the supervisor's exit code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChildError {
    #[error("could not start: {0}")]
    Spawn(String),

    #[error("exit status {0}")]
    Exited(i32),

    #[error("killed by signal {0}")]
    Signaled(i32),

    #[error("waiting for exit: {0}")]
    Wait(String),
}

impl ChildError {
    /// `Ok(())` for a zero exit status.
    pub fn check(status: ExitStatus) -> Result<(), ChildError> {
        if status.success() {
            return Ok(());
        }
        match (status.code(), status.signal()) {
            (Some(code), _) => Err(ChildError::Exited(code)),
            (None, Some(signal)) => Err(ChildError::Signaled(signal)),
            (None, None) => Err(ChildError::Wait(format!("unrecognised status {status}"))),
        }
    }
}

/// Resolves once the launched process has exited and been reaped.
pub type ExitFuture = Pin<Box<dyn Future<Output = Result<(), ChildError>> + Send>>;

/// A process that has been started.
pub struct Launched {
    /// Also the process group id, since the child leads its own group.
    pub pid: u32,
    pub exit: ExitFuture,
}

impl std::fmt::Debug for Launched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launched")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

/// Trait abstracting how COMMAND is started and killed.
pub trait ExecBackend: Send + Sync + 'static {
    /// Start `shell -c command` as the leader of a new process group.
    fn launch(&self, shell: &Path, command: &str) -> io::Result<Launched>;

    /// Send SIGKILL to every process in group `pgid`.
    fn kill_group(&self, pgid: i32) -> nix::Result<()>;
}

/// Real backend used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellBackend;

impl ExecBackend for ShellBackend {
    fn launch(&self, shell: &Path, command: &str) -> io::Result<Launched> {
        let mut child = Command::new(shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()?;

        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("child was reaped before reporting a pid"))?;

        let exit: ExitFuture = Box::pin(async move {
            match child.wait().await {
                Ok(status) => ChildError::check(status),
                Err(err) => Err(ChildError::Wait(err.to_string())),
            }
        });

        Ok(Launched { pid, exit })
    }

    fn kill_group(&self, pgid: i32) -> nix::Result<()> {
        killpg(Pid::from_raw(pgid), Signal::SIGKILL)
    }
}
