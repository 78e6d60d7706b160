use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::{output::OutputMode, staleness::CheckMode};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to use
    #[arg(short = 'f', long = "file", default_value = "doer.toml")]
    pub file: PathBuf,

    /// List tasks and exit
    #[arg(short = 'l', long = "list")]
    pub list: bool,

    /// Show what would be executed without running tasks
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Run planned tasks even if they are up to date
    #[arg(short = 'a', long = "always")]
    pub always: bool,

    /// Continue executing independent tasks even if some fail
    #[arg(long = "continue-on-failure")]
    pub continue_on_failure: bool,

    /// How to decide whether a task is up to date
    #[arg(long = "check", value_enum)]
    pub check: Option<CheckMode>,

    /// Override default timeout (e.g., "5m", "30s", "1h30m")
    #[arg(short = 't', long = "timeout")]
    pub timeout: Option<String>,

    /// How to display command output in the terminal
    #[arg(long = "output", value_enum)]
    pub output: Option<OutputMode>,

    /// Enable debug logging (same as --log-level debug)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Log level; falls back to DOER_LOG, then warn
    #[arg(long = "log-level", value_enum)]
    pub log_level: Option<LogLevel>,

    /// Tasks to run; runs the configured defaults, or every task, if none are given
    pub tasks: Vec<String>,
}

impl Cli {
    pub fn effective_log_level(&self) -> Option<LogLevel> {
        self.log_level
            .or(self.verbose.then_some(LogLevel::Debug))
    }
}
