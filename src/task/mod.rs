pub mod action;
pub mod analysis;
pub mod config;
pub mod dependency;

pub use action::{Action, ActionError, BoxError, Edit, Runnable, TextSubstitution};
pub use analysis::show_task_relationships;
pub use config::{Settings, TaskConfiguration, load_tasks, parse_tasks};
pub use dependency::{Graph, Plan};

use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// A source file, or the target of the task that produces it.
    File(PathBuf),
    /// Ordering dependency on another task by name.
    Task(String),
}

/// A named unit of work. Immutable once registered in a [`Graph`].
#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub doc: Option<String>,
    pub actions: Vec<Action>,
    pub dependencies: Vec<Dependency>,
    pub targets: Vec<PathBuf>,
    pub timeout: Option<Duration>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            actions: Vec::new(),
            dependencies: Vec::new(),
            targets: Vec::new(),
            timeout: None,
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn file_dep(mut self, path: impl Into<PathBuf>) -> Self {
        self.dependencies.push(Dependency::File(path.into()));
        self
    }

    pub fn task_dep(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(Dependency::Task(name.into()));
        self
    }

    pub fn target(mut self, path: impl Into<PathBuf>) -> Self {
        self.targets.push(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn file_deps(&self) -> impl Iterator<Item = &PathBuf> {
        self.dependencies.iter().filter_map(|dep| match dep {
            Dependency::File(path) => Some(path),
            Dependency::Task(_) => None,
        })
    }

    pub fn task_deps(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().filter_map(|dep| match dep {
            Dependency::Task(name) => Some(name.as_str()),
            Dependency::File(_) => None,
        })
    }
}
