// src/config/model.rs

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::errors::{Result, RunOnChangeError};

/// Debounce window used when neither `-w` nor the config file set one.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(2);

/// Optional behaviours switched on for one invocation.
///
/// In a config file these are spelled in kebab-case, e.g.
/// `features = ["clobber", "recursive"]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    /// Drop events for editor swap files and atomic-write temp files.
    AutoIgnoreEditorTemps,
    Debug,
    /// Kill a still-running COMMAND when a newer event should run it again.
    Clobber,
    Recursive,
    /// No tick marks on stderr.
    Quiet,
}

/// How a [`Matcher`] treats the paths it is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Reject events whose path matches.
    Ignore,
    /// Reject events whose path does not match.
    Restrict,
}

/// An uncompiled `-i`/`-r` pattern, or one `patterns` entry of a config file:
///
/// ```toml
/// patterns = [{ mode = "ignore", regex = '\.log$' }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPattern {
    pub mode: MatchMode,
    pub regex: String,
}

impl RawPattern {
    pub fn ignore(regex: impl Into<String>) -> Self {
        Self {
            mode: MatchMode::Ignore,
            regex: regex.into(),
        }
    }

    pub fn restrict(regex: impl Into<String>) -> Self {
        Self {
            mode: MatchMode::Restrict,
            regex: regex.into(),
        }
    }
}

/// A compiled entry of the pattern chain.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
    mode: MatchMode,
}

impl Matcher {
    pub fn new(raw: &RawPattern) -> Result<Self> {
        let regex = Regex::new(&raw.regex).map_err(|source| RunOnChangeError::PatternError {
            pattern: raw.regex.clone(),
            source,
        })?;
        Ok(Self {
            regex,
            mode: raw.mode,
        })
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

// Regex has no PartialEq; two matchers are the same if built from the same source.
impl PartialEq for Matcher {
    fn eq(&self, other: &Self) -> bool {
        self.mode == other.mode && self.as_str() == other.as_str()
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.mode {
            MatchMode::Ignore => "IGNOR",
            MatchMode::Restrict => "RESTR",
        };
        write!(f, "[{status}]: {}", self.regex.as_str())
    }
}

/// Optional defaults file passed with `--config`.
///
/// ```toml
/// wait = 3
/// features = ["clobber"]
/// default_ignore = true
/// watch = ["src"]
/// patterns = [{ mode = "restrict", regex = '\.rs$' }]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Debounce window in whole seconds.
    #[serde(default)]
    pub wait: Option<u64>,

    #[serde(default)]
    pub features: Vec<Feature>,

    /// Whether editor temp files are dropped before the pattern chain runs.
    /// Defaults to `true`.
    #[serde(default)]
    pub default_ignore: Option<bool>,

    /// Watch targets used when none are given on the command line.
    #[serde(default)]
    pub watch: Vec<PathBuf>,

    /// Evaluated before any `-i`/`-r` given on the command line.
    #[serde(default)]
    pub patterns: Vec<RawPattern>,
}

/// Everything needed to build a [`Directive`], before validation.
///
/// Produced by merging the command line, the optional config file and the
/// environment; see [`crate::config::loader::raw_directive`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDirective {
    /// Value of `$SHELL`, if set.
    pub shell: Option<PathBuf>,
    pub command: String,
    pub watch_targets: Vec<PathBuf>,
    pub patterns: Vec<RawPattern>,
    pub features: BTreeSet<Feature>,
    /// `None` means [`DEFAULT_WAIT`].
    pub wait_for: Option<Duration>,
}

/// Validated configuration for one invocation. Never mutated after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    shell: PathBuf,
    command: String,
    watch_targets: Vec<PathBuf>,
    patterns: Vec<Matcher>,
    features: BTreeSet<Feature>,
    wait_for: Duration,
}

impl Directive {
    /// Build a directive without checking the shell or the watch targets.
    ///
    /// Use `Directive::try_from(RawDirective)` outside of tests.
    pub fn new_unchecked(
        shell: PathBuf,
        command: String,
        watch_targets: Vec<PathBuf>,
        patterns: Vec<Matcher>,
        features: BTreeSet<Feature>,
        wait_for: Duration,
    ) -> Self {
        Self {
            shell,
            command,
            watch_targets,
            patterns,
            features,
            wait_for,
        }
    }

    pub fn shell(&self) -> &Path {
        &self.shell
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn watch_targets(&self) -> &[PathBuf] {
        &self.watch_targets
    }

    pub fn patterns(&self) -> &[Matcher] {
        &self.patterns
    }

    pub fn features(&self) -> &BTreeSet<Feature> {
        &self.features
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    pub fn wait_for(&self) -> Duration {
        self.wait_for
    }

    /// Minimum quiet time after a run's start and finish before the next run.
    ///
    /// Doubled in clobber mode, where every run may kill the previous one.
    pub fn effective_window(&self) -> Duration {
        if self.has(Feature::Clobber) {
            self.wait_for.saturating_mul(2)
        } else {
            self.wait_for
        }
    }
}
