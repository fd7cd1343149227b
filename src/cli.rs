// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! `-i` and `-r` build a single ordered chain, so their relative order on the
//! command line is recovered from clap's argument indices rather than from
//! the two value lists.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};

use crate::config::model::{MatchMode, RawPattern};
use crate::errors::ExitReason;

const TICK_LEGEND: &str = "\
Ticks (stderr, one per event, suppressed by -q):
  i  event ignored by an -i FILE_PATTERN
  r  event did not match an -r FILE_PATTERN
  _  COMMAND still running; event dropped (use -c to clobber)
  -  nothing to clobber, or the last run is too recent
  e  could not kill the previous COMMAND, or could not start a new one

Environment:
  SHELL           shell used to run COMMAND as `$SHELL -c COMMAND` (required)
  RUNONCHANGE_LOG log level when neither -d nor --log-level is given";

/// Command-line arguments for `runonchange`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "runonchange",
    version,
    about = "Runs COMMAND every time filesystem events happen under a DIR_TO_WATCH.",
    long_about = "Runs COMMAND every time filesystem events happen under a DIR_TO_WATCH.\n\n\
        Each event's file path is checked against the FILE_PATTERN chain built \
        from -i and -r, in the order given. COMMAND runs in $SHELL, in its own \
        process group, and is not re-run until WAIT_DURATION has passed since \
        both its last start and its last finish.",
    after_long_help = TICK_LEGEND
)]
pub struct CliArgs {
    /// Shell string to evaluate on every accepted event.
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Directories whose events trigger COMMAND. Defaults to the current
    /// working directory.
    #[arg(value_name = "DIR_TO_WATCH")]
    pub dirs: Vec<PathBuf>,

    /// Kill a still-running COMMAND (and its process group) when a newer
    /// event arrives.
    #[arg(short = 'c', long)]
    pub clobber: bool,

    /// Print debugging output to stderr.
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Watch every directory beneath each DIR_TO_WATCH.
    #[arg(short = 'R', long)]
    pub recursive: bool,

    /// Do not print tick marks.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Minimum seconds between runs (0 disables debouncing). Default: 2.
    #[arg(short = 'w', long = "wait", value_name = "WAIT_DURATION")]
    pub wait: Option<u64>,

    /// Ignore events whose path matches FILE_PATTERN.
    #[arg(short = 'i', long = "ignore", value_name = "FILE_PATTERN", allow_hyphen_values = true)]
    pub ignore: Vec<String>,

    /// Only run for events whose path matches FILE_PATTERN.
    #[arg(short = 'r', long = "restrict", value_name = "FILE_PATTERN", allow_hyphen_values = true)]
    pub restrict: Vec<String>,

    /// Do not drop editor swap/atomic-write files (`.foo.swp`, `4913`).
    #[arg(long)]
    pub no_default_ignore: bool,

    /// TOML file with default features, patterns and watch directories.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace). `-d` implies debug.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// `-i`/`-r` patterns in command-line order.
    #[arg(skip)]
    pub patterns: Vec<RawPattern>,
}

impl CliArgs {
    /// `runonchange help` behaves like `--help`.
    pub fn is_help_request(&self) -> bool {
        self.command == "help" && self.dirs.is_empty()
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Parse `argv` without exiting the process.
pub fn try_parse_from<I, T>(argv: I) -> Result<CliArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = CliArgs::command().try_get_matches_from(argv)?;
    let mut args = CliArgs::from_arg_matches(&matches)?;
    args.patterns = ordered_patterns(&matches);
    Ok(args)
}

/// Parse the process arguments.
///
/// Help and version requests exit 0; every other parse failure exits with
/// the usage code (1) rather than clap's default.
pub fn parse() -> CliArgs {
    let args = match try_parse_from(std::env::args_os()) {
        Ok(args) => args,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                let _ = err.print();
                std::process::exit(ExitReason::Usage.code());
            }
        },
    };

    if args.is_help_request() {
        let _ = CliArgs::command().print_long_help();
        std::process::exit(0);
    }

    args
}

fn ordered_patterns(matches: &ArgMatches) -> Vec<RawPattern> {
    let mut indexed: Vec<(usize, RawPattern)> = Vec::new();

    for (id, mode) in [("ignore", MatchMode::Ignore), ("restrict", MatchMode::Restrict)] {
        if let (Some(values), Some(indices)) =
            (matches.get_many::<String>(id), matches.indices_of(id))
        {
            for (index, regex) in indices.zip(values) {
                indexed.push((
                    index,
                    RawPattern {
                        mode,
                        regex: regex.clone(),
                    },
                ));
            }
        }
    }

    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, pattern)| pattern).collect()
}
