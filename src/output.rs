use clap::ValueEnum;
use serde::Deserialize;

use crate::{
    staleness::Staleness,
    task::{Graph, Plan, Settings},
};

#[derive(ValueEnum, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Stream command output live.
    Stream,
    /// Print each command's output as a single block after it completes.
    Group,
}

/// `--list`: every task in declaration order, defaults marked with `*`.
pub fn print_task_list(graph: &Graph, settings: &Settings) {
    print!("{}", format_task_list(graph, settings));
}

pub fn format_task_list(graph: &Graph, settings: &Settings) -> String {
    let width = graph
        .tasks()
        .iter()
        .map(|t| t.name.len())
        .max()
        .unwrap_or(0);

    let mut listing = String::new();
    for task in graph.tasks() {
        let marker = if settings.default_tasks.contains(&task.name) {
            '*'
        } else {
            ' '
        };
        let line = match &task.doc {
            Some(doc) => format!("{} {:<width$}  {}\n", marker, task.name, doc),
            None => format!("{} {}\n", marker, task.name),
        };
        listing.push_str(&line);
    }
    listing
}

/// `--dry-run`: the plan with each task's staleness and the actions it would run.
pub fn print_dry_run(graph: &Graph, plan: &Plan, preview: &[(String, Staleness)]) {
    println!("Dry run - {} task(s) planned:", plan.len());

    for (name, staleness) in preview {
        println!("  {}: {}", name, staleness);
        if !staleness.is_stale() {
            continue;
        }
        if let Some(task) = graph.get(name) {
            for action in &task.actions {
                println!("      {}", action);
            }
        }
    }
}
