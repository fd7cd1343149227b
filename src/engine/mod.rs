// src/engine/mod.rs

//! Orchestration engine for runonchange.
//!
//! - [`dispatcher`] is the select loop over interrupts, child deaths and
//!   accepted events.
//! - [`shutdown`] performs the cleanup on interrupt.
//! - [`signals`] turns SIGINT into dispatcher input.

pub mod dispatcher;
pub mod shutdown;
pub mod signals;

pub use dispatcher::Dispatcher;
pub use shutdown::{ShutdownOutcome, graceful};
pub use signals::spawn_interrupt_listener;
