use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use runonchange::config::{DEFAULT_WAIT, Directive, Feature, Matcher, RawPattern};

/// Builder for `Directive` that skips filesystem validation.
///
/// Defaults: `/bin/sh`, watching `.`, a 2s window and the editor-temp
/// auto-ignore, which is what a bare command line produces.
pub struct DirectiveBuilder {
    command: String,
    shell: PathBuf,
    targets: Vec<PathBuf>,
    patterns: Vec<RawPattern>,
    features: BTreeSet<Feature>,
    wait_for: Duration,
}

impl DirectiveBuilder {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            shell: PathBuf::from("/bin/sh"),
            targets: Vec::new(),
            patterns: Vec::new(),
            features: BTreeSet::from([Feature::AutoIgnoreEditorTemps]),
            wait_for: DEFAULT_WAIT,
        }
    }

    pub fn shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn target(mut self, dir: impl Into<PathBuf>) -> Self {
        self.targets.push(dir.into());
        self
    }

    pub fn ignore(mut self, regex: &str) -> Self {
        self.patterns.push(RawPattern::ignore(regex));
        self
    }

    pub fn restrict(mut self, regex: &str) -> Self {
        self.patterns.push(RawPattern::restrict(regex));
        self
    }

    pub fn feature(mut self, feature: Feature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn without(mut self, feature: Feature) -> Self {
        self.features.remove(&feature);
        self
    }

    pub fn clobber(self) -> Self {
        self.feature(Feature::Clobber)
    }

    pub fn quiet(self) -> Self {
        self.feature(Feature::Quiet)
    }

    pub fn wait(mut self, wait_for: Duration) -> Self {
        self.wait_for = wait_for;
        self
    }

    pub fn build(self) -> Directive {
        let targets = if self.targets.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.targets
        };
        let patterns = self
            .patterns
            .iter()
            .map(|p| Matcher::new(p).expect("builder pattern must compile"))
            .collect();

        Directive::new_unchecked(
            self.shell,
            self.command,
            targets,
            patterns,
            self.features,
            self.wait_for,
        )
    }

    pub fn build_arc(self) -> Arc<Directive> {
        Arc::new(self.build())
    }
}
