// src/watch/filter.rs

//! Accept/reject decision for a single event path.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::{Directive, Feature, MatchMode, Matcher};
use crate::report::Tick;

/// Swap files and atomic-write temp files left behind by common editors.
static EDITOR_TEMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\.\w.*sw[a-z]|4913)$").expect("editor temp regex is valid")
});

/// Outcome of [`Filter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    EditorTemp,
    /// Rejected by the IGNORE rule at this index of the chain.
    Ignored { rule: usize },
    /// Rejected by the RESTRICT rule at this index of the chain.
    Unrestricted { rule: usize },
}

impl Verdict {
    pub fn is_accept(self) -> bool {
        self == Verdict::Accept
    }

    /// Tick printed for a rejection. Editor temps are dropped silently.
    pub fn tick(self) -> Option<Tick> {
        match self {
            Verdict::Ignored { .. } => Some(Tick::DropPatternIgnore),
            Verdict::Unrestricted { .. } => Some(Tick::DropPatternRestrict),
            Verdict::Accept | Verdict::EditorTemp => None,
        }
    }
}

/// True if the basename of `path` looks like an editor temp file.
pub fn is_editor_temp(path: &Path) -> bool {
    path.file_name()
        .map(|name| EDITOR_TEMP.is_match(&name.to_string_lossy()))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct Filter {
    editor_temps: bool,
    patterns: Vec<Matcher>,
}

impl Filter {
    pub fn new(directive: &Directive) -> Self {
        Self::from_parts(
            directive.has(Feature::AutoIgnoreEditorTemps),
            directive.patterns().to_vec(),
        )
    }

    pub fn from_parts(editor_temps: bool, patterns: Vec<Matcher>) -> Self {
        Self {
            editor_temps,
            patterns,
        }
    }

    /// Run `path` through the editor-temp check and then the pattern chain.
    ///
    /// Patterns see the full path; the first rejection wins.
    pub fn check(&self, path: &Path) -> Verdict {
        if self.editor_temps && is_editor_temp(path) {
            debug!(path = %path.display(), "dropping editor temp file");
            return Verdict::EditorTemp;
        }

        let full = path.to_string_lossy();
        for (rule, matcher) in self.patterns.iter().enumerate() {
            let matched = matcher.is_match(&full);
            let verdict = match (matcher.mode(), matched) {
                (MatchMode::Ignore, true) => Verdict::Ignored { rule },
                (MatchMode::Restrict, false) => Verdict::Unrestricted { rule },
                _ => continue,
            };
            debug!(rule, %matcher, path = %full, "pattern rejected event");
            return verdict;
        }

        Verdict::Accept
    }
}
