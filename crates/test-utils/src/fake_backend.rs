use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use nix::errno::Errno;
use tokio::sync::oneshot;

use runonchange::exec::{ChildError, ExecBackend, ExitFuture, Launched};

/// A fake process backend that:
/// - records every launch and every group kill
/// - keeps each "child" alive until the test finishes or kills it
///   (or lets it exit immediately, see [`FakeBackend::instant`]).
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    launches: Vec<String>,
    kills: Vec<i32>,
    running: HashMap<i32, oneshot::Sender<Result<(), ChildError>>>,
    instant_exit: bool,
    fail_launch: bool,
    fail_kill: Option<Errno>,
}

const FIRST_PID: i32 = 1000;

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Children exit successfully as soon as they are launched.
    pub fn instant() -> Self {
        let backend = Self::default();
        backend.lock().instant_exit = true;
        backend
    }

    pub fn fail_launches(&self, fail: bool) {
        self.lock().fail_launch = fail;
    }

    /// Make `kill_group` return `errno` for every call.
    pub fn fail_kills(&self, errno: Option<Errno>) {
        self.lock().fail_kill = errno;
    }

    /// Commands launched so far, in order.
    pub fn launches(&self) -> Vec<String> {
        self.lock().launches.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.lock().launches.len()
    }

    /// Process groups passed to `kill_group`, in order.
    pub fn kills(&self) -> Vec<i32> {
        self.lock().kills.clone()
    }

    /// Process groups that have been launched and not yet exited.
    pub fn running(&self) -> Vec<i32> {
        let mut pids: Vec<i32> = self.lock().running.keys().copied().collect();
        pids.sort();
        pids
    }

    /// Make child `pgid` exit with `result`. Returns `false` if it is not
    /// running.
    pub fn finish(&self, pgid: i32, result: Result<(), ChildError>) -> bool {
        match self.lock().running.remove(&pgid) {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }

    /// Make the most recently launched child exit with `result`.
    pub fn finish_latest(&self, result: Result<(), ChildError>) -> bool {
        let latest = self.running().last().copied();
        latest.is_some_and(|pgid| self.finish(pgid, result))
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl ExecBackend for FakeBackend {
    fn launch(&self, _shell: &Path, command: &str) -> io::Result<Launched> {
        let mut state = self.lock();
        if state.fail_launch {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "fake launch failure",
            ));
        }

        state.launches.push(command.to_string());
        let pid = FIRST_PID + state.launches.len() as i32 - 1;

        let exit: ExitFuture = if state.instant_exit {
            Box::pin(async { Ok::<(), ChildError>(()) })
        } else {
            let (tx, rx) = oneshot::channel();
            state.running.insert(pid, tx);
            Box::pin(async move {
                rx.await
                    .unwrap_or_else(|_| Err(ChildError::Wait("fake child abandoned".to_string())))
            })
        };

        Ok(Launched {
            pid: pid as u32,
            exit,
        })
    }

    fn kill_group(&self, pgid: i32) -> nix::Result<()> {
        let mut state = self.lock();
        state.kills.push(pgid);
        if let Some(errno) = state.fail_kill {
            return Err(errno);
        }
        match state.running.remove(&pgid) {
            Some(tx) => {
                let _ = tx.send(Err(ChildError::Signaled(9)));
                Ok(())
            }
            None => Err(Errno::ESRCH),
        }
    }
}
