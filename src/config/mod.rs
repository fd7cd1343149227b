// src/config/mod.rs

//! Building the immutable [`Directive`] for one invocation.
//!
//! - `model.rs` holds the directive, its pattern chain and the optional
//!   TOML defaults file.
//! - `loader.rs` merges command line, defaults file and `$SHELL`.
//! - `validate.rs` turns the merged result into a [`Directive`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_directive, load_from_path, raw_directive};
pub use model::{
    DEFAULT_WAIT, Directive, Feature, FileConfig, MatchMode, Matcher, RawDirective, RawPattern,
};
