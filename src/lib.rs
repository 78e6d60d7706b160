//! doer: a dependency-gated task runner.
//!
//! Tasks are declared in a TOML file with actions, file dependencies and
//! targets. A run plans the requested tasks in dependency order, skips the
//! ones whose targets are newer than their dependencies, and runs the rest
//! one at a time.
//!
//! ```toml
//! [config]
//! default = ["pip"]
//!
//! [task.pip]
//! actions = [
//!   "pip-compile --output-file=requirements.txt requirements.in",
//!   "pip-sync",
//!   { edit = "requirements.txt", delete = "macfsevents" },
//! ]
//! file_dep = ["requirements.in"]
//! targets = ["requirements.txt"]
//! ```

pub mod cache;
pub mod cli;
pub mod error;
pub mod execution;
pub mod logging;
pub mod output;
pub mod process;
pub mod report;
pub mod stat;
pub mod staleness;
pub mod task;
pub mod util;

pub use error::{ConfigError, DoerError, Result};
pub use execution::{RunOptions, Scheduler};
pub use report::{Outcome, RunReport, SkipReason};
pub use staleness::{CheckMode, Staleness};
pub use task::{Action, Dependency, Graph, Plan, Task};

use tracing::{debug, info};

use crate::{
    cache::{load_cache, save_cache},
    cli::Cli,
    output::{OutputMode, print_dry_run, print_task_list},
    process::ShellRunner,
    stat::RealStat,
    task::{load_tasks, show_task_relationships},
    util::parse_timeout,
};

/// Entry point used by `main.rs`. Returns whether every planned task
/// succeeded or was up to date.
pub async fn run(args: Cli) -> Result<bool> {
    let config = load_tasks(&args.file)?;
    let settings = config.settings;
    let graph = Graph::register(config.tasks)?;

    show_task_relationships(&graph);

    if args.list {
        print_task_list(&graph, &settings);
        return Ok(true);
    }

    let requested = if args.tasks.is_empty() {
        settings.default_tasks.clone()
    } else {
        args.tasks.clone()
    };
    let plan = graph.plan(&requested)?;
    info!("Task execution order: {}", plan.order().join(" -> "));

    let default_timeout = match args.timeout.as_deref() {
        Some(value) => parse_timeout(value)?,
        None => settings.default_timeout,
    };
    let options = RunOptions {
        check: args.check.unwrap_or(settings.check),
        force: args.always,
        continue_on_failure: args.continue_on_failure || settings.continue_on_failure,
        default_timeout,
    };
    let output_mode = args
        .output
        .or(settings.output)
        .unwrap_or(OutputMode::Group);

    let mut cache = load_cache(settings.state_dir.as_deref(), &args.file);
    let stat = RealStat;
    let runner = ShellRunner::new(output_mode);
    let mut scheduler = Scheduler::new(&graph, &stat, &runner, &mut cache, options);

    if args.dry_run {
        let preview = scheduler.preview(&plan);
        print_dry_run(&graph, &plan, &preview);
        return Ok(true);
    }

    let report = scheduler.execute(&plan).await;

    if scheduler.cache_changed() {
        save_cache(&cache, settings.state_dir.as_deref(), &args.file);
    } else {
        debug!("No fingerprint changes, state not saved.");
    }

    println!("{}", report);
    Ok(report.is_success())
}
