// src/watch/event.rs

//! Raw filesystem events as the rest of the supervisor sees them.

use std::fmt;
use std::path::PathBuf;

use notify::event::{Event, EventKind, ModifyKind};

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventOp {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
    Other,
}

impl EventOp {
    /// Map a notify event kind onto an op.
    ///
    /// Returns `None` for access events, which reading a file (including by
    /// COMMAND itself) produces.
    pub fn from_kind(kind: &EventKind) -> Option<Self> {
        match kind {
            EventKind::Access(_) => None,
            EventKind::Create(_) => Some(EventOp::Create),
            EventKind::Modify(ModifyKind::Name(_)) => Some(EventOp::Rename),
            EventKind::Modify(ModifyKind::Metadata(_)) => Some(EventOp::Chmod),
            EventKind::Modify(_) => Some(EventOp::Write),
            EventKind::Remove(_) => Some(EventOp::Remove),
            EventKind::Any | EventKind::Other => Some(EventOp::Other),
        }
    }
}

impl fmt::Display for EventOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventOp::Create => "CREATE",
            EventOp::Write => "WRITE",
            EventOp::Remove => "REMOVE",
            EventOp::Rename => "RENAME",
            EventOp::Chmod => "CHMOD",
            EventOp::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// One operation on one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub op: EventOp,
    pub path: PathBuf,
}

impl FsEvent {
    pub fn new(op: EventOp, path: impl Into<PathBuf>) -> Self {
        Self {
            op,
            path: path.into(),
        }
    }

    /// Split a notify event into one `FsEvent` per path.
    pub fn from_notify(event: &Event) -> Vec<FsEvent> {
        match EventOp::from_kind(&event.kind) {
            Some(op) => event
                .paths
                .iter()
                .map(|path| FsEvent::new(op, path.clone()))
                .collect(),
            None => Vec::new(),
        }
    }
}

impl fmt::Display for FsEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.op, self.path.display())
    }
}
