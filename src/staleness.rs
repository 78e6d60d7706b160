//! Decides whether a task's actions must run.
//!
//! The default policy compares modification times only: a task is up to date
//! when every target exists and none is older than any dependency. That
//! misses a dependency rewritten with an older timestamp and reruns after a
//! bare touch. [`CheckMode::Fingerprint`] additionally requires a recorded
//! successful run for the current dependency contents.

use std::{
    fmt,
    path::{Path, PathBuf},
    time::SystemTime,
};

use clap::ValueEnum;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    cache::Cache,
    stat::StatProvider,
    task::{Graph, Task},
    util::hash_files,
};

#[derive(ValueEnum, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Compare modification times of dependencies and targets.
    #[default]
    Timestamp,
    /// Timestamps, plus a content fingerprint of the dependencies.
    Fingerprint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    Forced,
    TargetMissing(PathBuf),
    DependencyMissing(PathBuf),
    Unreadable { path: PathBuf, error: String },
    NewerDependency { dependency: PathBuf, target: PathBuf },
    NoTargets,
    FingerprintChanged,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Forced => write!(f, "forced"),
            StaleReason::TargetMissing(path) => write!(f, "target '{}' is missing", path.display()),
            StaleReason::DependencyMissing(path) => {
                write!(f, "dependency '{}' does not exist", path.display())
            }
            StaleReason::Unreadable { path, error } => {
                write!(f, "could not stat '{}': {}", path.display(), error)
            }
            StaleReason::NewerDependency { dependency, target } => write!(
                f,
                "'{}' is newer than '{}'",
                dependency.display(),
                target.display()
            ),
            StaleReason::NoTargets => write!(f, "no targets to compare against"),
            StaleReason::FingerprintChanged => write!(f, "dependency contents changed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Staleness {
    UpToDate,
    Stale(StaleReason),
}

impl Staleness {
    pub fn is_stale(&self) -> bool {
        matches!(self, Staleness::Stale(_))
    }
}

impl fmt::Display for Staleness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Staleness::UpToDate => write!(f, "up to date"),
            Staleness::Stale(reason) => write!(f, "stale: {}", reason),
        }
    }
}

/// Everything needed to judge a task, borrowed for one run.
pub struct StalenessCheck<'a> {
    graph: &'a Graph,
    stat: &'a dyn StatProvider,
    cache: &'a Cache,
    mode: CheckMode,
    force: bool,
}

impl<'a> StalenessCheck<'a> {
    pub fn new(
        graph: &'a Graph,
        stat: &'a dyn StatProvider,
        cache: &'a Cache,
        mode: CheckMode,
        force: bool,
    ) -> Self {
        Self {
            graph,
            stat,
            cache,
            mode,
            force,
        }
    }

    pub fn is_stale(&self, task: &Task) -> bool {
        self.check(task).is_stale()
    }

    pub fn check(&self, task: &Task) -> Staleness {
        let staleness = self.evaluate(task);
        debug!(task = %task.name, %staleness, "checked staleness");
        staleness
    }

    fn evaluate(&self, task: &Task) -> Staleness {
        if self.force {
            return Staleness::Stale(StaleReason::Forced);
        }

        let dependencies = self.graph.dependency_files(task);

        let mut oldest_target: Option<(SystemTime, &PathBuf)> = None;
        for target in &task.targets {
            match self.stat.modified(target) {
                Ok(Some(time)) => {
                    if oldest_target.is_none_or(|(oldest, _)| time < oldest) {
                        oldest_target = Some((time, target));
                    }
                }
                Ok(None) => return Staleness::Stale(StaleReason::TargetMissing(target.clone())),
                Err(e) => return Staleness::Stale(unreadable(target, &e)),
            }
        }

        let mut newest_dependency: Option<(SystemTime, &PathBuf)> = None;
        for dependency in &dependencies {
            match self.stat.modified(dependency) {
                Ok(Some(time)) => {
                    if newest_dependency.is_none_or(|(newest, _)| time > newest) {
                        newest_dependency = Some((time, dependency));
                    }
                }
                Ok(None) => {
                    warn!(
                        "Task '{}': dependency '{}' does not exist",
                        task.name,
                        dependency.display()
                    );
                    return Staleness::Stale(StaleReason::DependencyMissing(dependency.clone()));
                }
                Err(e) => return Staleness::Stale(unreadable(dependency, &e)),
            }
        }

        match (oldest_target, newest_dependency) {
            (Some((target_time, target)), Some((dependency_time, dependency)))
                if dependency_time > target_time =>
            {
                return Staleness::Stale(StaleReason::NewerDependency {
                    dependency: dependency.clone(),
                    target: target.clone(),
                });
            }
            // No targets to compare, and with no dependencies no fingerprint proves a run.
            (None, _) if self.mode == CheckMode::Timestamp || dependencies.is_empty() => {
                return Staleness::Stale(StaleReason::NoTargets);
            }
            _ => {}
        }

        if self.mode == CheckMode::Fingerprint {
            match self.fingerprint(task) {
                Ok(fingerprint) if self.cache.matches(&task.name, &fingerprint) => {}
                Ok(_) => return Staleness::Stale(StaleReason::FingerprintChanged),
                Err(e) => {
                    warn!("Could not fingerprint inputs of task '{}': {}", task.name, e);
                    return Staleness::Stale(StaleReason::FingerprintChanged);
                }
            }
        }

        Staleness::UpToDate
    }

    /// Hex blake3 fingerprint of the task's dependency contents.
    pub fn fingerprint(&self, task: &Task) -> std::io::Result<String> {
        let files = self.graph.dependency_files(task);
        hash_files(self.stat, &files).map(|hash| hash.to_hex().to_string())
    }
}

fn unreadable(path: &Path, error: &std::io::Error) -> StaleReason {
    StaleReason::Unreadable {
        path: path.to_path_buf(),
        error: error.to_string(),
    }
}
