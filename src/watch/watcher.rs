// src/watch/watcher.rs

use std::sync::Arc;

use notify::{Config, Event, RecommendedWatcher, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{Directive, Feature};
use crate::errors::{Result, RunOnChangeError};
use crate::fs::RealFileSystem;
use crate::report::Reporter;
use crate::watch::event::{EventOp, FsEvent};
use crate::watch::filter::{Filter, Verdict};
use crate::watch::registrar::Registrar;

/// Capacity of the filtered-event channel into the dispatcher.
const EVENT_BUFFER: usize = 64;

/// What the feeder task hands the dispatcher.
#[derive(Debug)]
pub enum WatchMessage {
    Accepted(FsEvent),
    /// The notification source reported an error. Always the last message.
    Failed(notify::Error),
}

/// A running watch: the registrar that owns the backend, and the stream of
/// accepted events.
#[derive(Debug)]
pub struct WatchSession {
    pub registrar: Arc<Registrar>,
    pub events: mpsc::Receiver<WatchMessage>,
}

/// Create the notify watcher, subscribe every watch target and spawn the
/// task that filters raw events into [`WatchSession::events`].
///
/// Must be called from within a Tokio runtime.
pub fn start(directive: &Directive, reporter: Reporter) -> Result<WatchSession> {
    // Channel from the blocking notify callback into the async world.
    let (raw_tx, raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

    let watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            // The receiver is gone only once the feeder has stopped.
            let _ = raw_tx.send(res);
        },
        Config::default(),
    )
    .map_err(RunOnChangeError::WatcherError)?;

    let registrar = Arc::new(Registrar::new(
        Box::new(watcher),
        Arc::new(RealFileSystem),
        directive.has(Feature::Recursive),
    ));

    let subscribed = registrar.register(directive.watch_targets())?;
    reporter.watching(directive.watch_targets(), subscribed);

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    tokio::spawn(forward_events(
        raw_rx,
        Filter::new(directive),
        Arc::clone(&registrar),
        reporter,
        tx,
    ));

    Ok(WatchSession {
        registrar,
        events: rx,
    })
}

/// Feed raw notify results through the filter into `out`, in arrival order.
///
/// Stops after forwarding the first error, when `raw` closes, or when the
/// dispatcher stops listening.
pub async fn forward_events(
    mut raw: mpsc::UnboundedReceiver<notify::Result<Event>>,
    filter: Filter,
    registrar: Arc<Registrar>,
    reporter: Reporter,
    out: mpsc::Sender<WatchMessage>,
) {
    while let Some(res) = raw.recv().await {
        let event = match res {
            Ok(event) => event,
            Err(err) => {
                error!(error = %err, "filesystem event stream failed");
                let _ = out.send(WatchMessage::Failed(err)).await;
                return;
            }
        };

        for fs_event in FsEvent::from_notify(&event) {
            debug!(event = %fs_event, "raw event");

            if fs_event.op == EventOp::Create {
                subscribe_created(&registrar, &fs_event).await;
            }

            match filter.check(&fs_event.path) {
                Verdict::Accept => {
                    if out.send(WatchMessage::Accepted(fs_event)).await.is_err() {
                        debug!("dispatcher gone; stopping event feeder");
                        return;
                    }
                }
                rejected => {
                    if let Some(tick) = rejected.tick() {
                        reporter.tick(tick);
                    }
                }
            }
        }
    }

    debug!("raw event stream closed");
}

/// Walk a newly created directory on the blocking pool. Awaited before the
/// event is forwarded, so its subscriptions precede later events.
async fn subscribe_created(registrar: &Arc<Registrar>, fs_event: &FsEvent) {
    let registrar = Arc::clone(registrar);
    let path = fs_event.path.clone();
    let walked = tokio::task::spawn_blocking(move || registrar.subscribe_created(&path)).await;

    match walked {
        Ok(Ok(0)) => {}
        Ok(Ok(count)) => {
            info!(path = %fs_event.path.display(), count, "watching new directory")
        }
        Ok(Err(err)) => warn!(error = %err, "could not watch new directory"),
        Err(err) => warn!(error = %err, "directory walk task failed"),
    }
}
