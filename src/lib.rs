// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod report;
pub mod watch;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{Directive, Feature, load_directive};
use crate::engine::{Dispatcher, ShutdownOutcome, spawn_interrupt_listener};
use crate::errors::Result;
use crate::exec::{ExecBackend, Runner, ShellBackend};
use crate::report::Reporter;

/// High-level entry point used by `main.rs`.
///
/// Builds the directive, sets up logging, then supervises COMMAND until
/// interrupted. Returns the process exit code for a shutdown.
pub async fn run(args: CliArgs) -> Result<i32> {
    let directive = load_directive(&args)?;
    logging::init_logging(directive.has(Feature::Debug), args.log_level)?;
    log_directive(&directive);

    // Listen before watching so an early interrupt still shuts down cleanly.
    let kills = spawn_interrupt_listener();

    let outcome = supervise(Arc::new(directive), Arc::new(ShellBackend), kills).await?;
    Ok(outcome.exit_code())
}

/// Watch the directive's targets and dispatch events to `backend` until a
/// message arrives on `kills`.
///
/// This wires together:
/// - the registrar and the filtered event feeder
/// - the runner
/// - the dispatcher loop
pub async fn supervise<B: ExecBackend>(
    directive: Arc<Directive>,
    backend: Arc<B>,
    kills: mpsc::Receiver<()>,
) -> Result<ShutdownOutcome> {
    let reporter = Reporter::new(&directive);
    let session = watch::start(&directive, reporter)?;

    let runner = Runner::new(Arc::clone(&directive), backend, reporter);
    let dispatcher = Dispatcher::new(
        runner,
        session.events,
        kills,
        session.registrar,
        reporter,
        directive.has(Feature::Clobber),
    );
    dispatcher.run().await
}

fn log_directive(directive: &Directive) {
    let patterns: Vec<String> = directive.patterns().iter().map(|m| m.to_string()).collect();
    debug!(
        command = directive.command(),
        shell = %directive.shell().display(),
        targets = ?directive.watch_targets(),
        patterns = ?patterns,
        features = ?directive.features(),
        wait = ?directive.wait_for(),
        "resolved directive"
    );
}
