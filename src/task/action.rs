use std::{
    error::Error as StdError,
    fmt, fs, io,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::process::{CommandError, CommandRunner};

pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An embedder-supplied step. Blocks until done.
pub trait Runnable: Send + Sync + fmt::Debug {
    fn run(&self) -> Result<(), BoxError>;

    /// Short label used in listings and dry runs.
    fn describe(&self) -> String {
        "custom action".to_string()
    }
}

/// One step of a task. The scheduler only cares whether it completed.
#[derive(Debug, Clone)]
pub enum Action {
    Shell(String),
    Substitute(TextSubstitution),
    Custom(Arc<dyn Runnable>),
}

impl Action {
    pub fn shell(command: impl Into<String>) -> Self {
        Action::Shell(command.into())
    }

    pub fn custom(runnable: impl Runnable + 'static) -> Self {
        Action::Custom(Arc::new(runnable))
    }

    pub async fn run(
        &self,
        runner: &dyn CommandRunner,
        timeout: Option<Duration>,
    ) -> Result<(), ActionError> {
        match self {
            Action::Shell(command) => {
                let output = runner.run(command, timeout).await.map_err(|e| match e {
                    CommandError::Timeout => ActionError::Timeout {
                        command: command.clone(),
                        timeout: timeout.unwrap_or_default(),
                    },
                    CommandError::Io(source) => ActionError::Spawn {
                        command: command.clone(),
                        source,
                    },
                })?;

                if output.success {
                    Ok(())
                } else {
                    Err(ActionError::Command {
                        command: command.clone(),
                        code: output.code,
                        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    })
                }
            }
            Action::Substitute(substitution) => {
                let changed =
                    substitution
                        .apply()
                        .map_err(|source| ActionError::Substitution {
                            path: substitution.path.clone(),
                            source,
                        })?;
                debug!(path = %substitution.path.display(), changed, "applied text substitution");
                Ok(())
            }
            Action::Custom(runnable) => runnable.run().map_err(ActionError::Custom),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Shell(command) => write!(f, "{}", command),
            Action::Substitute(substitution) => write!(f, "{}", substitution),
            Action::Custom(runnable) => write!(f, "{}", runnable.describe()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    /// Drop every line the pattern matches.
    DeleteLines,
    /// Replace every match; `$1`-style group references are expanded.
    Replace(String),
}

/// In-place regex edit of a single file.
#[derive(Debug, Clone)]
pub struct TextSubstitution {
    pub path: PathBuf,
    pub pattern: Regex,
    pub edit: Edit,
}

impl TextSubstitution {
    pub fn delete_lines(path: impl Into<PathBuf>, pattern: Regex) -> Self {
        Self {
            path: path.into(),
            pattern,
            edit: Edit::DeleteLines,
        }
    }

    pub fn replace(
        path: impl Into<PathBuf>,
        pattern: Regex,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            pattern,
            edit: Edit::Replace(replacement.into()),
        }
    }

    /// Rewrites the file. Returns whether its contents changed; an unchanged
    /// file is not rewritten, so its modification time is preserved.
    pub fn apply(&self) -> io::Result<bool> {
        let original = fs::read_to_string(&self.path)?;
        let edited = self.edit_text(&original);

        if edited == original {
            return Ok(false);
        }

        fs::write(&self.path, edited)?;
        Ok(true)
    }

    pub fn edit_text(&self, text: &str) -> String {
        match &self.edit {
            Edit::DeleteLines => text
                .split_inclusive('\n')
                .filter(|line| !self.pattern.is_match(line.trim_end_matches(['\n', '\r'])))
                .collect(),
            Edit::Replace(replacement) => self
                .pattern
                .replace_all(text, replacement.as_str())
                .into_owned(),
        }
    }
}

impl fmt::Display for TextSubstitution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.edit {
            Edit::DeleteLines => write!(
                f,
                "edit {}: delete lines matching /{}/",
                self.path.display(),
                self.pattern
            ),
            Edit::Replace(replacement) => write!(
                f,
                "edit {}: replace /{}/ with '{}'",
                self.path.display(),
                self.pattern,
                replacement
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("command `{command}` {}{}", exit_description(*.code), stderr_tail(.stderr))]
    Command {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("command `{command}` timed out after {}", humantime::format_duration(*.timeout))]
    Timeout { command: String, timeout: Duration },

    #[error("command `{command}` failed to execute: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("could not edit '{}': {source}", .path.display())]
    Substitution {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Custom(BoxError),
}

const STDERR_TAIL_LINES: usize = 5;

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return String::new();
    }

    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    format!(": {}", lines[start..].join(" | "))
}
