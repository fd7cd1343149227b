// src/engine/shutdown.rs

use tracing::{debug, info, warn};

use crate::exec::{ExecBackend, Runner};
use crate::report::Reporter;
use crate::watch::Registrar;

/// Result of the cleanup performed on interrupt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownOutcome {
    Clean,
    /// The living process group could not be killed.
    Unclean(String),
}

impl ShutdownOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownOutcome::Clean => 0,
            ShutdownOutcome::Unclean(_) => 1,
        }
    }
}

/// Kill any living COMMAND without waiting for it, then close the watcher.
///
/// With no living COMMAND, the last run's process group is still killed so
/// nothing it put in the background outlives the supervisor.
pub async fn graceful<B: ExecBackend>(
    runner: &mut Runner<B>,
    registrar: &Registrar,
    reporter: &Reporter,
) -> ShutdownOutcome {
    reporter.shutdown_started();

    let killed = match runner.kill_existing(false).await {
        Ok(true) => Ok(true),
        Ok(false) => runner.kill_leftovers(),
        Err(err) => Err(err),
    };

    let outcome = match killed {
        Ok(true) => {
            info!("killed command process group");
            ShutdownOutcome::Clean
        }
        Ok(false) => {
            debug!("no process group left to kill");
            ShutdownOutcome::Clean
        }
        Err(err) => {
            warn!(error = %err, "cleanup failed");
            ShutdownOutcome::Unclean(err.to_string())
        }
    };

    if !registrar.close() {
        debug!("watcher was already closed");
    }

    match &outcome {
        ShutdownOutcome::Clean => reporter.shutdown_finished(None),
        ShutdownOutcome::Unclean(reason) => reporter.shutdown_finished(Some(reason.as_str())),
    }
    outcome
}
