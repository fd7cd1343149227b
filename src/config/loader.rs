// src/config/loader.rs

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use crate::cli::CliArgs;
use crate::config::model::{Directive, Feature, FileConfig, RawDirective};
use crate::errors::Result;

/// Load a `--config` defaults file.
///
/// This only performs TOML deserialization; the merged result is validated
/// by [`load_directive`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<FileConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;

    let config: FileConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Merge the command line, an optional defaults file and `$SHELL` into one
/// unvalidated directive.
///
/// - Features are the union of both sources; editor temps are ignored unless
///   `--no-default-ignore` or `default_ignore = false` says otherwise.
/// - Directories on the command line replace the file's `watch` list; with
///   neither, `cwd` is watched.
/// - File patterns run first, then `-i`/`-r` in command-line order.
/// - `-w` wins over the file's `wait`.
pub fn raw_directive(
    args: &CliArgs,
    file: FileConfig,
    shell: Option<OsString>,
    cwd: &Path,
) -> RawDirective {
    let mut features: BTreeSet<Feature> = file.features.iter().copied().collect();
    let switches = [
        (args.clobber, Feature::Clobber),
        (args.debug, Feature::Debug),
        (args.recursive, Feature::Recursive),
        (args.quiet, Feature::Quiet),
    ];
    for (on, feature) in switches {
        if on {
            features.insert(feature);
        }
    }

    if !args.no_default_ignore && file.default_ignore.unwrap_or(true) {
        features.insert(Feature::AutoIgnoreEditorTemps);
    } else {
        features.remove(&Feature::AutoIgnoreEditorTemps);
    }

    let watch_targets = if !args.dirs.is_empty() {
        args.dirs.clone()
    } else if !file.watch.is_empty() {
        file.watch
    } else {
        vec![cwd.to_path_buf()]
    };

    let mut patterns = file.patterns;
    patterns.extend(args.patterns.iter().cloned());

    RawDirective {
        shell: shell.map(PathBuf::from),
        command: args.command.clone(),
        watch_targets,
        patterns,
        features,
        wait_for: args.wait.or(file.wait).map(Duration::from_secs),
    }
}

/// Build the validated [`Directive`] for this process.
///
/// Called by [`crate::run`] before logging is set up: it reads the optional
/// config file, `$SHELL` and the working directory, then validates.
pub fn load_directive(args: &CliArgs) -> Result<Directive> {
    let file = match &args.config {
        Some(path) => load_from_path(path)?,
        None => FileConfig::default(),
    };
    let cwd = std::env::current_dir().context("resolving the working directory")?;
    let raw = raw_directive(args, file, std::env::var_os("SHELL"), &cwd);
    Directive::try_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::try_parse_from;
    use crate::config::model::RawPattern;

    fn args(argv: &[&str]) -> CliArgs {
        let mut full = vec!["runonchange"];
        full.extend_from_slice(argv);
        try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults_to_cwd_and_editor_temp_ignore() {
        let raw = raw_directive(
            &args(&["make"]),
            FileConfig::default(),
            Some("/bin/sh".into()),
            Path::new("/work"),
        );
        assert_eq!(raw.watch_targets, vec![PathBuf::from("/work")]);
        assert!(raw.features.contains(&Feature::AutoIgnoreEditorTemps));
        assert_eq!(raw.wait_for, None);
        assert_eq!(raw.shell, Some(PathBuf::from("/bin/sh")));
    }

    #[test]
    fn file_patterns_precede_cli_patterns() {
        let file = FileConfig {
            patterns: vec![RawPattern::restrict(r"\.rs$")],
            wait: Some(7),
            features: vec![Feature::Recursive],
            ..FileConfig::default()
        };
        let raw = raw_directive(
            &args(&["make", "-i", "target/", "-w", "1"]),
            file,
            None,
            Path::new("/"),
        );

        assert_eq!(
            raw.patterns,
            vec![RawPattern::restrict(r"\.rs$"), RawPattern::ignore("target/")]
        );
        assert_eq!(raw.wait_for, Some(Duration::from_secs(1)));
        assert!(raw.features.contains(&Feature::Recursive));
    }

    #[test]
    fn no_default_ignore_wins_over_file() {
        let file = FileConfig {
            default_ignore: Some(true),
            ..FileConfig::default()
        };
        let raw = raw_directive(
            &args(&["make", "--no-default-ignore"]),
            file,
            None,
            Path::new("/"),
        );
        assert!(!raw.features.contains(&Feature::AutoIgnoreEditorTemps));
    }

    #[test]
    fn cli_dirs_replace_file_watch_list() {
        let file = FileConfig {
            watch: vec![PathBuf::from("from-file")],
            ..FileConfig::default()
        };
        let raw = raw_directive(&args(&["make", "a", "b"]), file, None, Path::new("/"));
        assert_eq!(raw.watch_targets, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn load_from_path_reports_toml_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runonchange.toml");
        fs::write(&path, "wait = \"soon\"").unwrap();

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, crate::errors::RunOnChangeError::TomlError(_)));
    }

    #[test]
    fn missing_config_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = load_from_path(&path).unwrap_err();
        assert!(matches!(err, crate::errors::RunOnChangeError::Other(_)));
        assert_eq!(err.exit_reason().code(), 1);
        assert!(err.to_string().contains("absent.toml"));
    }
}
