// tests/dispatcher_flow.rs

use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use runonchange::engine::{Dispatcher, ShutdownOutcome};
use runonchange::errors::{ExitReason, Result, RunOnChangeError};
use runonchange::exec::{ChildError, Runner};
use runonchange::fs::mock::MockFileSystem;
use runonchange::report::Reporter;
use runonchange::watch::{EventOp, FsEvent, Registrar, WatchMessage};
use runonchange_test_utils::{
    DirectiveBuilder, FakeBackend, RecordingWatch, eventually, init_tracing, with_timeout,
};

struct Harness {
    backend: Arc<FakeBackend>,
    registrar: Arc<Registrar>,
    events: mpsc::Sender<WatchMessage>,
    kills: mpsc::Sender<()>,
    handle: JoinHandle<Result<ShutdownOutcome>>,
}

fn start(builder: DirectiveBuilder) -> Harness {
    init_tracing();
    let directive = builder.quiet().build_arc();
    let reporter = Reporter::new(&directive);
    let backend = Arc::new(FakeBackend::new());
    let registrar = Arc::new(Registrar::new(
        Box::new(RecordingWatch::new()),
        Arc::new(MockFileSystem::new()),
        false,
    ));

    let (events_tx, events_rx) = mpsc::channel(16);
    let (kills_tx, kills_rx) = mpsc::channel(1);
    let clobber = directive.has(runonchange::config::Feature::Clobber);

    let runner = Runner::new(directive, Arc::clone(&backend), reporter);
    let dispatcher = Dispatcher::new(
        runner,
        events_rx,
        kills_rx,
        Arc::clone(&registrar),
        reporter,
        clobber,
    );

    Harness {
        backend,
        registrar,
        events: events_tx,
        kills: kills_tx,
        handle: tokio::spawn(dispatcher.run()),
    }
}

fn accepted(name: &str) -> WatchMessage {
    WatchMessage::Accepted(FsEvent::new(EventOp::Write, format!("/w/{name}")))
}

/// Let the dispatcher drain what has been sent so far.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn startup_runs_once_without_an_event() {
    let h = start(DirectiveBuilder::new("make"));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;
    assert_eq!(h.backend.launches(), vec!["make".to_string()]);
}

#[tokio::test]
async fn events_are_dropped_while_running_without_clobber() {
    let h = start(DirectiveBuilder::new("make").wait(Duration::ZERO));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;

    h.events.send(accepted("a")).await.unwrap();
    h.events.send(accepted("b")).await.unwrap();
    settle().await;
    assert_eq!(h.backend.launch_count(), 1);
    assert!(h.backend.kills().is_empty());

    assert!(h.backend.finish_latest(Ok(())));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.running().is_empty()).await;
    settle().await;

    h.events.send(accepted("c")).await.unwrap();
    eventually(|| backend.launch_count() == 2).await;
}

#[tokio::test]
async fn clobber_replaces_the_living_child() {
    let h = start(DirectiveBuilder::new("serve").clobber().wait(Duration::ZERO));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;

    h.events.send(accepted("a")).await.unwrap();
    eventually(|| backend.launch_count() == 2).await;

    assert_eq!(h.backend.kills(), vec![1000]);
    assert_eq!(h.backend.running(), vec![1001]);
}

#[tokio::test]
async fn debounced_events_do_not_launch() {
    let h = start(DirectiveBuilder::new("make").wait(Duration::from_secs(30)));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;
    h.backend.finish_latest(Ok(()));
    eventually(|| backend.running().is_empty()).await;

    h.events.send(accepted("a")).await.unwrap();
    settle().await;
    assert_eq!(h.backend.launch_count(), 1);
}

#[tokio::test]
async fn natural_death_in_clobber_mode_clears_the_child() {
    let h = start(DirectiveBuilder::new("serve").clobber().wait(Duration::ZERO));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;

    h.backend.finish(1000, Err(ChildError::Exited(1)));
    settle().await;

    // Nothing left to clobber, so the next event just runs.
    h.events.send(accepted("a")).await.unwrap();
    eventually(|| backend.launch_count() == 2).await;
    assert!(h.backend.kills().is_empty());
}

#[tokio::test]
async fn interrupt_kills_the_group_and_closes_the_watcher() {
    let h = start(DirectiveBuilder::new("sleep 1000"));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;

    h.kills.send(()).await.unwrap();
    let outcome = with_timeout(h.handle).await.unwrap().unwrap();

    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(h.backend.kills(), vec![1000]);
    assert!(h.backend.running().is_empty());
    assert!(!h.registrar.is_open());
}

#[tokio::test]
async fn interrupt_after_natural_exit_sweeps_the_last_group() {
    let h = start(DirectiveBuilder::new("daemonize"));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;
    assert!(h.backend.finish_latest(Ok(())));
    settle().await;

    h.kills.send(()).await.unwrap();
    let outcome = with_timeout(h.handle).await.unwrap().unwrap();

    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert_eq!(h.backend.kills(), vec![1000]);
    assert!(!h.registrar.is_open());
}

#[tokio::test]
async fn repeated_interrupts_shut_down_once() {
    let h = start(DirectiveBuilder::new("sleep 1000"));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;

    h.kills.try_send(()).unwrap();
    assert!(h.kills.try_send(()).is_err());

    let outcome = with_timeout(h.handle).await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Clean);
    assert_eq!(h.backend.kills().len(), 1);
}

#[tokio::test]
async fn failed_kill_on_interrupt_is_unclean() {
    let h = start(DirectiveBuilder::new("sleep 1000"));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;
    h.backend.fail_kills(Some(Errno::EPERM));

    h.kills.send(()).await.unwrap();
    let outcome = with_timeout(h.handle).await.unwrap().unwrap();

    assert!(matches!(outcome, ShutdownOutcome::Unclean(_)));
    assert_eq!(outcome.exit_code(), 1);
    assert!(!h.registrar.is_open());
}

#[tokio::test]
async fn event_stream_error_is_fatal_after_cleanup() {
    let h = start(DirectiveBuilder::new("sleep 1000"));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;

    h.events
        .send(WatchMessage::Failed(notify::Error::generic("inotify queue overflow")))
        .await
        .unwrap();
    let err = with_timeout(h.handle).await.unwrap().unwrap_err();

    assert!(matches!(err, RunOnChangeError::EventStreamError(_)));
    assert_eq!(err.exit_reason(), ExitReason::Event);
    assert_eq!(h.backend.kills(), vec![1000]);
    assert!(!h.registrar.is_open());
}

#[tokio::test]
async fn closed_event_stream_is_fatal() {
    let h = start(DirectiveBuilder::new("true"));
    let backend = Arc::clone(&h.backend);
    eventually(|| backend.launch_count() == 1).await;

    drop(h.events);
    let err = with_timeout(h.handle).await.unwrap().unwrap_err();
    assert_eq!(err.exit_reason().code(), 3);
}
