use std::path::PathBuf;

use thiserror::Error;

use crate::util::FileError;

/// Problems with the declared task set. Always fatal, raised before any
/// action runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("task '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("target '{}' is claimed by both '{first}' and '{second}'", .target.display())]
    TargetCollision {
        target: PathBuf,
        first: String,
        second: String,
    },

    #[error("task '{task}' depends on '{dependency}' which doesn't exist")]
    UnresolvedDependency { task: String, dependency: String },

    #[error("circular dependency: {}", format_cycle(.0))]
    Cycle(Vec<String>),

    #[error("task '{0}' not found")]
    UnknownTask(String),

    #[error("task '{task}' has an invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        task: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid timeout '{value}' (use a duration like '5m', '30s', '1h30m'): {source}")]
    InvalidTimeout {
        value: String,
        #[source]
        source: humantime::DurationError,
    },
}

fn format_cycle(members: &[String]) -> String {
    match members.first() {
        Some(first) => format!("{} -> {}", members.join(" -> "), first),
        None => String::new(),
    }
}

#[derive(Debug, Error)]
pub enum DoerError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, DoerError>;
