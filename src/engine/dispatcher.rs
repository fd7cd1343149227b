// src/engine/dispatcher.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::shutdown::{self, ShutdownOutcome};
use crate::errors::{Result, RunOnChangeError};
use crate::exec::{Death, ExecBackend, Runner};
use crate::report::{Reporter, Tick};
use crate::watch::{FsEvent, Registrar, WatchMessage};

/// The central loop: interrupts, child deaths and accepted events, in that
/// order of priority.
pub struct Dispatcher<B: ExecBackend> {
    runner: Runner<B>,
    events: mpsc::Receiver<WatchMessage>,
    kills: mpsc::Receiver<()>,
    registrar: Arc<Registrar>,
    reporter: Reporter,
    clobber: bool,
}

impl<B: ExecBackend> fmt::Debug for Dispatcher<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("runner", &self.runner)
            .field("clobber", &self.clobber)
            .finish_non_exhaustive()
    }
}

impl<B: ExecBackend> Dispatcher<B> {
    pub fn new(
        runner: Runner<B>,
        events: mpsc::Receiver<WatchMessage>,
        kills: mpsc::Receiver<()>,
        registrar: Arc<Registrar>,
        reporter: Reporter,
        clobber: bool,
    ) -> Self {
        Self {
            runner,
            events,
            kills,
            registrar,
            reporter,
            clobber,
        }
    }

    /// Run COMMAND once for startup, then react until interrupted.
    ///
    /// Returns the shutdown outcome after an interrupt, or
    /// `EventStreamError` if the event stream fails or ends.
    pub async fn run(mut self) -> Result<ShutdownOutcome> {
        info!(clobber = self.clobber, "dispatcher started");
        self.trigger(None).await;

        loop {
            tokio::select! {
                biased;

                Some(()) = self.kills.recv() => {
                    info!("interrupt received");
                    return Ok(shutdown::graceful(&mut self.runner, &self.registrar, &self.reporter).await);
                }

                death = self.runner.next_death() => self.on_death(death),

                msg = self.events.recv() => match msg {
                    Some(WatchMessage::Accepted(event)) => self.on_event(event).await,
                    Some(WatchMessage::Failed(err)) => return Err(self.fatal(err.to_string()).await),
                    None => return Err(self.fatal("event stream closed".to_string()).await),
                },
            }
        }
    }

    async fn on_event(&mut self, event: FsEvent) {
        debug!(event = %event, "accepted event");
        if self.runner.is_living() && !self.clobber {
            self.reporter.tick(Tick::DropStillRunning);
            return;
        }
        self.trigger(Some(&event)).await;
    }

    async fn trigger(&mut self, event: Option<&FsEvent>) {
        match self.runner.try_run(event).await {
            Ok(true) => {}
            Ok(false) => self.reporter.tick(Tick::ClobberUnnecessary),
            Err(err) => {
                warn!(error = %err, "run not started");
                self.reporter.tick(Tick::Failed);
            }
        }
    }

    fn on_death(&mut self, death: Death) {
        let was_living = self.runner.reap(&death);
        debug!(generation = death.generation, was_living, "death received");
        if was_living && self.clobber {
            self.reporter.natural_death(&death.result);
        }
    }

    /// Best-effort cleanup before exiting on a broken event stream.
    async fn fatal(&mut self, reason: String) -> RunOnChangeError {
        error!(reason = %reason, "fatal event stream error");
        match self.runner.kill_existing(false).await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(err) = self.runner.kill_leftovers() {
                    warn!(error = %err, "could not kill leftover processes");
                }
            }
            Err(err) => warn!(error = %err, "could not kill living command"),
        }
        self.registrar.close();
        RunOnChangeError::EventStreamError(reason)
    }
}
