// src/exec/runner.rs

//! COMMAND lifecycle: recency window, spawn, clobber and reaping.
//!
//! The runner is owned by the dispatcher task, which makes that task the only
//! writer of the living child. Each run gets its own supervising task that
//! launches the process, reports its birth and later its death over
//! one-shot channels, and records the finish time.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::{Directive, Feature};
use crate::errors::{Result, RunOnChangeError};
use crate::exec::backend::{ChildError, ExecBackend};
use crate::report::Reporter;
use crate::watch::FsEvent;

/// Start and finish times of the most recent run.
///
/// Only touched while holding the runner's mutex, and never across a
/// child's execution.
#[derive(Debug, Clone, Default)]
pub struct RunTimes {
    last_start: Option<Instant>,
    /// `None` while a run is in flight, or before the first run.
    last_finish: Option<Instant>,
    generation: u64,
}

impl RunTimes {
    /// True if a run started or finished within `window` of `now`.
    ///
    /// A zero window never counts as recent.
    pub fn is_recent(&self, window: Duration, now: Instant) -> bool {
        if window.is_zero() {
            return false;
        }
        let within = |at: Option<Instant>| {
            at.is_some_and(|at| now.saturating_duration_since(at) <= window)
        };
        within(self.last_start) || within(self.last_finish)
    }

    /// Record a new run starting at `now` and return its generation.
    pub fn begin(&mut self, now: Instant) -> u64 {
        self.generation += 1;
        self.last_start = Some(now);
        self.last_finish = None;
        self.generation
    }

    /// Record the end of run `generation`.
    ///
    /// Ignored if a newer run has begun since, so a clobbered child exiting
    /// late cannot move the window.
    pub fn finish(&mut self, generation: u64, now: Instant) -> bool {
        if generation != self.generation {
            return false;
        }
        self.last_finish = Some(now);
        true
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_start(&self) -> Option<Instant> {
        self.last_start
    }

    pub fn last_finish(&self) -> Option<Instant> {
        self.last_finish
    }
}

/// The in-flight child, identified by its process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivingChild {
    pub pgid: i32,
    pub generation: u64,
}

/// Delivered once per run when its process has exited (or failed to start).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Death {
    pub generation: u64,
    pub elapsed: Duration,
    pub result: std::result::Result<(), ChildError>,
}

pub struct Runner<B: ExecBackend> {
    directive: Arc<Directive>,
    backend: Arc<B>,
    times: Arc<Mutex<RunTimes>>,
    living: Option<LivingChild>,
    /// Group of the most recent run. Survives reaping, since commands that
    /// background work leave members behind after the shell exits.
    last_pgid: Option<i32>,
    death: Option<oneshot::Receiver<Death>>,
    reporter: Reporter,
}

impl<B: ExecBackend> fmt::Debug for Runner<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("living", &self.living)
            .field("last_pgid", &self.last_pgid)
            .field("awaiting_death", &self.death.is_some())
            .finish_non_exhaustive()
    }
}

impl<B: ExecBackend> Runner<B> {
    pub fn new(directive: Arc<Directive>, backend: Arc<B>, reporter: Reporter) -> Self {
        Self {
            directive,
            backend,
            times: Arc::new(Mutex::new(RunTimes::default())),
            living: None,
            last_pgid: None,
            death: None,
            reporter,
        }
    }

    pub fn living(&self) -> Option<LivingChild> {
        self.living
    }

    pub fn is_living(&self) -> bool {
        self.living.is_some()
    }

    /// Snapshot of the recency bookkeeping.
    pub fn times(&self) -> RunTimes {
        lock_times(&self.times).clone()
    }

    /// Start COMMAND unless the recency window forbids it.
    ///
    /// Returns `Ok(false)` when debounced. In clobber mode a still-living
    /// child is killed, and its death awaited, before the new one starts; a
    /// failed kill aborts the new run. Returns `Ok(true)` once the new
    /// process has been born.
    pub async fn try_run(&mut self, trigger: Option<&FsEvent>) -> Result<bool> {
        let generation = {
            let mut times = lock_times(&self.times);
            let now = Instant::now();
            if times.is_recent(self.directive.effective_window(), now) {
                debug!("debounced: last run too recent");
                return Ok(false);
            }
            times.begin(now)
        };

        self.reporter.handling(trigger);

        if self.directive.has(Feature::Clobber) {
            self.kill_existing(true).await?;
        }

        self.spawn(generation).await?;
        Ok(true)
    }

    /// SIGKILL the living child's process group, if there is one.
    ///
    /// Returns whether a child existed. A group that is already gone counts
    /// as killed. With `wait`, also blocks until the child has been reaped.
    pub async fn kill_existing(&mut self, wait: bool) -> Result<bool> {
        let Some(child) = self.living else {
            return Ok(false);
        };

        debug!(pgid = child.pgid, "killing process group");
        match self.backend.kill_group(child.pgid) {
            Ok(()) => {}
            Err(Errno::ESRCH) => debug!(pgid = child.pgid, "process group already gone"),
            Err(source) => {
                warn!(pgid = child.pgid, error = %source, "failed to kill process group");
                return Err(RunOnChangeError::KillError {
                    pgid: child.pgid,
                    source,
                });
            }
        }

        if wait {
            if self.death.is_some() {
                let death = self.next_death().await;
                self.reap(&death);
            } else {
                self.living = None;
            }
        }

        Ok(true)
    }

    /// SIGKILL the most recent run's process group once its shell has been
    /// reaped, taking down anything it left running in the background.
    ///
    /// Returns whether any member was still there to kill. Does nothing while
    /// a child is living; that is [`Runner::kill_existing`]'s job.
    pub fn kill_leftovers(&mut self) -> Result<bool> {
        if self.living.is_some() {
            return Ok(false);
        }
        let Some(pgid) = self.last_pgid else {
            return Ok(false);
        };

        match self.backend.kill_group(pgid) {
            Ok(()) => {
                info!(pgid, "killed leftover process group members");
                self.last_pgid = None;
                Ok(true)
            }
            Err(Errno::ESRCH) => {
                debug!(pgid, "no leftover process group members");
                self.last_pgid = None;
                Ok(false)
            }
            Err(source) => {
                warn!(pgid, error = %source, "failed to kill leftover process group");
                Err(RunOnChangeError::KillError { pgid, source })
            }
        }
    }

    /// Resolves with the current run's death notice.
    ///
    /// Pending forever when no run is awaiting one, so it can sit in a
    /// `select!` unconditionally. Cancel safe.
    pub async fn next_death(&mut self) -> Death {
        let Some(rx) = self.death.as_mut() else {
            return std::future::pending().await;
        };

        let death = match rx.await {
            Ok(death) => death,
            Err(_) => Death {
                generation: self.living.map(|c| c.generation).unwrap_or_default(),
                elapsed: Duration::ZERO,
                result: Err(ChildError::Wait("supervising task vanished".to_string())),
            },
        };
        self.death = None;
        death
    }

    /// Forget the living child that `death` belongs to.
    ///
    /// Returns `true` if a living child was cleared.
    pub fn reap(&mut self, death: &Death) -> bool {
        match self.living {
            Some(child) if child.generation == death.generation => {
                debug!(pgid = child.pgid, "reaped");
                self.living = None;
                true
            }
            _ => false,
        }
    }

    async fn spawn(&mut self, generation: u64) -> Result<()> {
        let (birth_tx, birth_rx) = oneshot::channel::<std::io::Result<u32>>();
        let (death_tx, death_rx) = oneshot::channel::<Death>();
        self.death = Some(death_rx);

        self.reporter.running(self.directive.command());

        let backend = Arc::clone(&self.backend);
        let directive = Arc::clone(&self.directive);
        let times = Arc::clone(&self.times);
        let reporter = self.reporter;

        tokio::spawn(async move {
            let started = Instant::now();
            let launched = match backend.launch(directive.shell(), directive.command()) {
                Ok(launched) => launched,
                Err(err) => {
                    let result = Err(ChildError::Spawn(err.to_string()));
                    let _ = birth_tx.send(Err(err));
                    lock_times(&times).finish(generation, Instant::now());
                    let _ = death_tx.send(Death {
                        generation,
                        elapsed: started.elapsed(),
                        result,
                    });
                    return;
                }
            };

            let _ = birth_tx.send(Ok(launched.pid));
            let result = launched.exit.await;

            let finished = Instant::now();
            lock_times(&times).finish(generation, finished);
            let elapsed = finished.saturating_duration_since(started);
            reporter.done(elapsed, &result);
            debug!(generation, ?result, "child exited");

            let _ = death_tx.send(Death {
                generation,
                elapsed,
                result,
            });
        });

        let pid = match birth_rx.await {
            Ok(Ok(pid)) => pid,
            Ok(Err(source)) => {
                return Err(RunOnChangeError::SpawnError {
                    command: self.directive.command().to_string(),
                    source,
                });
            }
            Err(_) => {
                return Err(RunOnChangeError::SpawnError {
                    command: self.directive.command().to_string(),
                    source: std::io::Error::other("supervising task vanished before birth"),
                });
            }
        };

        let pgid = i32::try_from(pid).map_err(|_| RunOnChangeError::SpawnError {
            command: self.directive.command().to_string(),
            source: std::io::Error::other(format!("pid {pid} out of range")),
        })?;

        info!(pgid, generation, "child born");
        self.living = Some(LivingChild { pgid, generation });
        self.last_pgid = Some(pgid);
        Ok(())
    }
}

fn lock_times(times: &Mutex<RunTimes>) -> MutexGuard<'_, RunTimes> {
    times.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
