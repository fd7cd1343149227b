// tests/runner_fake_backend.rs

use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use runonchange::errors::RunOnChangeError;
use runonchange::exec::{ChildError, Runner};
use runonchange::report::Reporter;
use runonchange::watch::{EventOp, FsEvent};
use runonchange_test_utils::{DirectiveBuilder, FakeBackend, init_tracing, with_timeout};

fn runner(builder: DirectiveBuilder, backend: &Arc<FakeBackend>) -> Runner<FakeBackend> {
    let directive = builder.quiet().build_arc();
    let reporter = Reporter::new(&directive);
    Runner::new(directive, Arc::clone(backend), reporter)
}

fn event(name: &str) -> FsEvent {
    FsEvent::new(EventOp::Create, format!("/w/{name}"))
}

#[tokio::test]
async fn second_run_inside_window_is_debounced() {
    init_tracing();
    let backend = Arc::new(FakeBackend::instant());
    let mut runner = runner(DirectiveBuilder::new("make"), &backend);

    assert!(runner.try_run(Some(&event("a"))).await.unwrap());
    let death = with_timeout(runner.next_death()).await;
    assert!(runner.reap(&death));
    assert_eq!(death.result, Ok(()));

    assert!(!runner.try_run(Some(&event("b"))).await.unwrap());
    assert_eq!(backend.launches(), vec!["make".to_string()]);
}

#[tokio::test]
async fn zero_window_runs_every_time_it_is_idle() {
    init_tracing();
    let backend = Arc::new(FakeBackend::instant());
    let mut runner = runner(DirectiveBuilder::new("make").wait(Duration::ZERO), &backend);

    for name in ["a", "b", "c"] {
        assert!(runner.try_run(Some(&event(name))).await.unwrap());
        let death = with_timeout(runner.next_death()).await;
        runner.reap(&death);
    }
    assert_eq!(backend.launch_count(), 3);
}

#[tokio::test]
async fn birth_records_the_living_process_group() {
    init_tracing();
    let backend = Arc::new(FakeBackend::new());
    let mut runner = runner(DirectiveBuilder::new("serve"), &backend);

    assert!(runner.try_run(None).await.unwrap());
    let child = runner.living().expect("child should be living");
    assert_eq!(backend.running(), vec![child.pgid]);

    assert!(backend.finish(child.pgid, Err(ChildError::Exited(2))));
    let death = with_timeout(runner.next_death()).await;
    assert_eq!(death.result, Err(ChildError::Exited(2)));
    assert!(runner.reap(&death));
    assert!(!runner.is_living());
}

#[tokio::test]
async fn clobber_kills_and_reaps_before_spawning() {
    init_tracing();
    let backend = Arc::new(FakeBackend::new());
    let mut runner = runner(
        DirectiveBuilder::new("sleep 30").clobber().wait(Duration::ZERO),
        &backend,
    );

    assert!(runner.try_run(None).await.unwrap());
    let first = runner.living().unwrap();

    assert!(runner.try_run(Some(&event("b"))).await.unwrap());
    let second = runner.living().unwrap();

    assert_ne!(first.pgid, second.pgid);
    assert_eq!(backend.kills(), vec![first.pgid]);
    assert_eq!(backend.running(), vec![second.pgid]);
}

#[tokio::test]
async fn failed_clobber_kill_skips_the_new_run() {
    init_tracing();
    let backend = Arc::new(FakeBackend::new());
    let mut runner = runner(
        DirectiveBuilder::new("sleep 30").clobber().wait(Duration::ZERO),
        &backend,
    );

    assert!(runner.try_run(None).await.unwrap());
    let first = runner.living().unwrap();
    backend.fail_kills(Some(Errno::EPERM));

    let err = runner.try_run(Some(&event("b"))).await.unwrap_err();
    match err {
        RunOnChangeError::KillError { pgid, source } => {
            assert_eq!(pgid, first.pgid);
            assert_eq!(source, Errno::EPERM);
        }
        other => panic!("expected KillError, got {other:?}"),
    }
    assert_eq!(backend.launch_count(), 1);
    assert_eq!(runner.living(), Some(first));
}

#[tokio::test]
async fn vanished_process_group_counts_as_killed() {
    init_tracing();
    let backend = Arc::new(FakeBackend::new());
    let mut runner = runner(DirectiveBuilder::new("true"), &backend);

    assert!(runner.try_run(None).await.unwrap());
    let child = runner.living().unwrap();
    // The child exits before the runner has seen its death.
    backend.finish(child.pgid, Ok(()));

    assert!(runner.kill_existing(false).await.unwrap());
    assert_eq!(backend.kills(), vec![child.pgid]);
}

#[tokio::test]
async fn kill_without_a_living_child_is_a_no_op() {
    let backend = Arc::new(FakeBackend::new());
    let mut runner = runner(DirectiveBuilder::new("true"), &backend);

    assert!(!runner.kill_existing(true).await.unwrap());
    assert!(backend.kills().is_empty());
}

#[tokio::test]
async fn spawn_failure_leaves_runner_idle() {
    init_tracing();
    let backend = Arc::new(FakeBackend::new());
    backend.fail_launches(true);
    let mut runner = runner(DirectiveBuilder::new("nope").wait(Duration::ZERO), &backend);

    let err = runner.try_run(None).await.unwrap_err();
    assert!(matches!(err, RunOnChangeError::SpawnError { .. }));
    assert!(!runner.is_living());

    let death = with_timeout(runner.next_death()).await;
    assert!(matches!(death.result, Err(ChildError::Spawn(_))));
    assert!(!runner.reap(&death));
    assert!(runner.times().last_finish().is_some());
}

#[tokio::test]
async fn clobbered_child_cannot_record_a_finish() {
    init_tracing();
    let backend = Arc::new(FakeBackend::new());
    let mut runner = runner(
        DirectiveBuilder::new("sleep 30").clobber().wait(Duration::ZERO),
        &backend,
    );

    runner.try_run(None).await.unwrap();
    runner.try_run(Some(&event("b"))).await.unwrap();

    let times = runner.times();
    assert_eq!(times.generation(), 2);
    assert_eq!(times.last_finish(), None);
}

#[tokio::test]
async fn reaped_run_still_has_its_group_swept() {
    init_tracing();
    let backend = Arc::new(FakeBackend::new());
    let mut runner = runner(DirectiveBuilder::new("daemonize"), &backend);

    assert!(runner.try_run(None).await.unwrap());
    let child = runner.living().unwrap();
    assert!(!runner.kill_leftovers().unwrap());
    assert!(backend.kills().is_empty());

    backend.finish(child.pgid, Ok(()));
    let death = with_timeout(runner.next_death()).await;
    assert!(runner.reap(&death));

    // The fake group is empty, so the kill reports ESRCH.
    assert!(!runner.kill_leftovers().unwrap());
    assert_eq!(backend.kills(), vec![child.pgid]);

    assert!(!runner.kill_leftovers().unwrap());
    assert_eq!(backend.kills().len(), 1);
}

#[tokio::test]
async fn failed_leftover_kill_is_an_error() {
    init_tracing();
    let backend = Arc::new(FakeBackend::instant());
    let mut runner = runner(DirectiveBuilder::new("daemonize"), &backend);

    assert!(runner.try_run(None).await.unwrap());
    let death = with_timeout(runner.next_death()).await;
    assert!(runner.reap(&death));
    backend.fail_kills(Some(Errno::EPERM));

    let err = runner.kill_leftovers().unwrap_err();
    assert!(matches!(
        err,
        RunOnChangeError::KillError {
            pgid: 1000,
            source: Errno::EPERM
        }
    ));
}
