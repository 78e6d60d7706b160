use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    sync::LazyLock,
    time::Duration,
};

use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde::Deserialize;

use super::{Action, Task, TextSubstitution};
use crate::{
    error::{ConfigError, Result},
    output::OutputMode,
    staleness::CheckMode,
    util::{expand_globs, parse_timeout},
};

static VARIABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)\b")
        .expect("variable pattern is valid")
});

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Config {
    #[serde(rename = "task", default)]
    tasks: IndexMap<String, TaskDecl>,
    #[serde(default)]
    config: ConfigSection,
    #[serde(default)]
    variables: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigSection {
    default: Option<OneOrMany>,
    check: Option<CheckMode>,
    state_dir: Option<PathBuf>,
    default_timeout: Option<String>,
    output: Option<OutputMode>,
    continue_on_failure: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TaskDecl {
    doc: Option<String>,
    #[serde(default)]
    actions: Vec<ActionDecl>,
    #[serde(default)]
    file_dep: Vec<PathBuf>,
    #[serde(default)]
    task_dep: Vec<String>,
    #[serde(default)]
    targets: Vec<PathBuf>,
    timeout: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged, deny_unknown_fields)]
enum ActionDecl {
    Command(String),
    Replace {
        edit: PathBuf,
        pattern: String,
        replace: String,
    },
    Delete {
        edit: PathBuf,
        delete: String,
    },
}

/// Run-wide settings from `[config]`. Passed explicitly to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Tasks to run when none are named on the command line. Empty means all.
    pub default_tasks: Vec<String>,
    pub check: CheckMode,
    pub state_dir: Option<PathBuf>,
    pub default_timeout: Option<Duration>,
    pub output: Option<OutputMode>,
    pub continue_on_failure: bool,
}

#[derive(Debug)]
pub struct TaskConfiguration {
    pub tasks: Vec<Task>,
    pub settings: Settings,
}

pub fn load_tasks(config_path: &Path) -> Result<TaskConfiguration> {
    let contents = fs::read_to_string(config_path)?;
    parse_tasks(&contents)
}

pub fn parse_tasks(contents: &str) -> Result<TaskConfiguration> {
    let config: Config = toml::from_str(contents)?;
    process_config(config)
}

fn process_config(config: Config) -> Result<TaskConfiguration> {
    let section = config.config;

    let default_tasks = match section.default {
        Some(OneOrMany::One(name)) => vec![name],
        Some(OneOrMany::Many(names)) => names,
        None => Vec::new(),
    };

    let default_timeout = match section.default_timeout.as_deref() {
        Some(value) => parse_timeout(value)?,
        None => None,
    };

    let mut variables = config.variables;
    add_builtin_variables(&mut variables);

    let tasks = config
        .tasks
        .into_iter()
        .map(|(name, decl)| build_task(name, decl, &variables))
        .collect::<Result<Vec<_>>>()?;

    Ok(TaskConfiguration {
        tasks,
        settings: Settings {
            default_tasks,
            check: section.check.unwrap_or_default(),
            state_dir: section.state_dir,
            default_timeout,
            output: section.output,
            continue_on_failure: section.continue_on_failure.unwrap_or(false),
        },
    })
}

fn add_builtin_variables(variables: &mut HashMap<String, String>) {
    for (key, value) in env::vars_os() {
        if let (Some(key), Some(value)) = (key.to_str(), value.to_str()) {
            variables.insert(format!("ENV_{}", key), value.to_string());
        }
    }

    if let Ok(pwd) = env::current_dir() {
        variables.insert("PWD".to_string(), pwd.to_string_lossy().to_string());
    }
}

fn build_task(name: String, decl: TaskDecl, variables: &HashMap<String, String>) -> Result<Task> {
    let actions = decl
        .actions
        .into_iter()
        .map(|action| build_action(&name, action, variables))
        .collect::<std::result::Result<Vec<_>, ConfigError>>()?;

    let file_deps: Vec<PathBuf> = decl
        .file_dep
        .iter()
        .map(|path| substitute_path(path, variables))
        .collect();

    let timeout = match decl.timeout.as_deref() {
        Some(value) => parse_timeout(value)?,
        None => None,
    };

    let mut task = Task::new(name);
    task.doc = decl.doc;
    task.actions = actions;
    task.timeout = timeout;
    task.targets = decl
        .targets
        .iter()
        .map(|path| substitute_path(path, variables))
        .collect();

    for path in expand_globs(&file_deps)? {
        task = task.file_dep(path);
    }
    for dep in decl.task_dep {
        task = task.task_dep(dep);
    }

    Ok(task)
}

fn build_action(
    task: &str,
    decl: ActionDecl,
    variables: &HashMap<String, String>,
) -> std::result::Result<Action, ConfigError> {
    let compile = |pattern: &str| {
        Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            task: task.to_string(),
            pattern: pattern.to_string(),
            source,
        })
    };

    Ok(match decl {
        ActionDecl::Command(command) => Action::Shell(substitute_variables(&command, variables)),
        ActionDecl::Replace {
            edit,
            pattern,
            replace,
        } => Action::Substitute(TextSubstitution::replace(
            substitute_path(&edit, variables),
            compile(&pattern)?,
            replace,
        )),
        ActionDecl::Delete { edit, delete } => Action::Substitute(TextSubstitution::delete_lines(
            substitute_path(&edit, variables),
            compile(&delete)?,
        )),
    })
}

fn substitute_path(path: &Path, variables: &HashMap<String, String>) -> PathBuf {
    PathBuf::from(substitute_variables(&path.to_string_lossy(), variables))
}

/// Expands `${NAME}` and `$NAME`. Unknown names are left as written so shell
/// variables pass through untouched.
fn substitute_variables(text: &str, variables: &HashMap<String, String>) -> String {
    VARIABLE
        .replace_all(text, |caps: &Captures| {
            let var_name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map_or("", |m| m.as_str());
            variables
                .get(var_name)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
