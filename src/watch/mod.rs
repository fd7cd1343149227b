// src/watch/mod.rs

//! Filesystem watching and event filtering.
//!
//! - [`registrar`] subscribes the watch targets and owns the notify watcher.
//! - [`event`] turns notify events into one [`FsEvent`] per path.
//! - [`filter`] applies the editor-temp check and the `-i`/`-r` chain.
//! - [`watcher`] wires these together into a stream of accepted events.

pub mod event;
pub mod filter;
pub mod registrar;
pub mod watcher;

pub use event::{EventOp, FsEvent};
pub use filter::{Filter, Verdict};
pub use registrar::{Registrar, WatchBackend};
pub use watcher::{WatchMessage, WatchSession, forward_events, start};
