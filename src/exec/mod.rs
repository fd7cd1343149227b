// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the `ExecBackend` trait and the production
//!   `ShellBackend`; tests replace it with a fake.
//! - [`runner`] owns the COMMAND lifecycle on top of a backend.

pub mod backend;
pub mod runner;

pub use backend::{ChildError, ExecBackend, ExitFuture, Launched, ShellBackend};
pub use runner::{Death, LivingChild, RunTimes, Runner};
