use tracing::debug;

use super::{Graph, Task};

/// Logs explicit task dependencies that carry no file relationship, i.e.
/// ones that only constrain ordering and never make the dependent stale.
pub fn show_task_relationships(graph: &Graph) {
    for task in graph.tasks() {
        for dep_id in task.task_deps() {
            if let Some(dep_task) = graph.get(dep_id) {
                if !has_file_relationship(task, dep_task) {
                    debug!(
                        "Task '{}' depends on '{}' for ordering only",
                        task.name, dep_id
                    );
                }
            }
        }
    }
}

/// True when `task` reads at least one of `dependency`'s targets directly.
pub fn has_file_relationship(task: &Task, dependency: &Task) -> bool {
    if dependency.targets.is_empty() {
        return false;
    }

    task.file_deps()
        .any(|input| dependency.targets.iter().any(|output| output == input))
}
