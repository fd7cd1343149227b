// src/report.rs

//! Operator-facing output: framing lines on stdout and tick marks on stderr.
//! None of this goes through `tracing`.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{Directive, Feature};
use crate::exec::ChildError;
use crate::watch::FsEvent;

/// Single-character disposition of one filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Previous COMMAND still running and clobber mode is off.
    DropStillRunning,
    /// Nothing was running to clobber, or the last run is too recent.
    ClobberUnnecessary,
    /// The previous COMMAND could not be killed, or the new one not started.
    Failed,
    /// The event's path matched an `-i` pattern.
    DropPatternIgnore,
    /// The event's path missed an `-r` pattern.
    DropPatternRestrict,
}

impl Tick {
    pub fn glyph(self) -> char {
        match self {
            Tick::DropStillRunning => '_',
            Tick::ClobberUnnecessary => '-',
            Tick::Failed => 'e',
            Tick::DropPatternIgnore => 'i',
            Tick::DropPatternRestrict => 'r',
        }
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.glyph())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    quiet: bool,
    clobber: bool,
}

impl Reporter {
    pub fn new(directive: &Directive) -> Self {
        Self {
            quiet: directive.has(Feature::Quiet),
            clobber: directive.has(Feature::Clobber),
        }
    }

    pub fn tick(&self, tick: Tick) {
        if self.quiet {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "{tick}");
        let _ = stderr.flush();
    }

    pub fn watching(&self, targets: &[PathBuf], subscribed: usize) {
        let mode = if self.clobber { " (clobber mode)" } else { "" };
        let names: Vec<String> = targets.iter().map(|t| t.display().to_string()).collect();
        println!(
            "watching {subscribed} {}{mode} `{}`",
            if subscribed == 1 { "directory" } else { "directories" },
            names.join(", ")
        );
    }

    pub fn handling(&self, trigger: Option<&FsEvent>) {
        match trigger {
            Some(event) => println!("\nhandling {event} ..."),
            None => println!("\nhandling startup ..."),
        }
    }

    pub fn running(&self, command: &str) {
        println!("running: `{command}`");
    }

    pub fn done(&self, elapsed: Duration, result: &Result<(), ChildError>) {
        let lead = if self.clobber { "\n" } else { "" };
        match result {
            Ok(()) => println!("{lead}done in {elapsed:.2?}"),
            Err(err) => println!("{lead}done in {elapsed:.2?}: {err}"),
        }
    }

    pub fn shutdown_started(&self) {
        eprint!("\ncaught interrupt; starting graceful shutdown... ");
    }

    pub fn shutdown_finished(&self, failure: Option<&str>) {
        match failure {
            None => eprintln!("done"),
            Some(err) => eprintln!("failed: {err}"),
        }
    }

    /// Clobber mode expects every run to end by being killed.
    pub fn natural_death(&self, result: &Result<(), ChildError>) {
        match result {
            Ok(()) => eprintln!("\twarning: COMMAND exited on its own"),
            Err(err) => eprintln!("\twarning: COMMAND exited on its own: {err}"),
        }
    }
}
