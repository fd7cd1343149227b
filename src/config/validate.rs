// src/config/validate.rs

use std::fs;
use std::path::Path;

use crate::config::model::{DEFAULT_WAIT, Directive, Matcher, RawDirective};
use crate::errors::{Result, RunOnChangeError};

impl TryFrom<RawDirective> for Directive {
    type Error = RunOnChangeError;

    fn try_from(raw: RawDirective) -> std::result::Result<Self, Self::Error> {
        validate_command(&raw.command)?;
        let shell = validate_shell(raw.shell.as_deref())?;
        validate_watch_targets(&raw.watch_targets)?;
        let patterns = compile_patterns(&raw)?;

        Ok(Directive::new_unchecked(
            shell.to_path_buf(),
            raw.command,
            raw.watch_targets,
            patterns,
            raw.features,
            raw.wait_for.unwrap_or(DEFAULT_WAIT),
        ))
    }
}

fn validate_command(command: &str) -> Result<()> {
    if command.trim().is_empty() {
        return Err(RunOnChangeError::UsageError(
            "COMMAND must be a non-empty shell string".to_string(),
        ));
    }
    Ok(())
}

/// `$SHELL` only has to stat successfully; relative paths are accepted.
fn validate_shell(shell: Option<&Path>) -> Result<&Path> {
    let shell = shell
        .filter(|s| !s.as_os_str().is_empty())
        .ok_or_else(|| RunOnChangeError::ShellError("not set in the environment".to_string()))?;

    fs::metadata(shell)
        .map_err(|e| RunOnChangeError::ShellError(format!("{}: {e}", shell.display())))?;

    Ok(shell)
}

fn validate_watch_targets(targets: &[impl AsRef<Path>]) -> Result<()> {
    if targets.is_empty() {
        return Err(RunOnChangeError::UsageError(
            "at least one DIR_TO_WATCH is required".to_string(),
        ));
    }

    for target in targets {
        let path = target.as_ref();
        let meta = fs::metadata(path).map_err(|e| RunOnChangeError::TargetError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if !meta.is_dir() {
            return Err(RunOnChangeError::TargetError {
                path: path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }
    }
    Ok(())
}

fn compile_patterns(raw: &RawDirective) -> Result<Vec<Matcher>> {
    raw.patterns.iter().map(Matcher::new).collect()
}
