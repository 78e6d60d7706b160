use std::{
    collections::{BTreeSet, HashMap},
    path::PathBuf,
};

use tracing::debug;

use super::{Dependency, Task};
use crate::{error::ConfigError, util::normalize_path};

/// A validated task set with unique names and targets and resolved dependencies.
#[derive(Debug, Clone)]
pub struct Graph {
    tasks: Vec<Task>,
    index: HashMap<String, usize>,
    upstream: Vec<Vec<usize>>,
}

/// Tasks to consider, in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    order: Vec<String>,
}

impl Plan {
    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.order.iter().position(|n| n == name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

impl Graph {
    pub fn register(mut tasks: Vec<Task>) -> Result<Graph, ConfigError> {
        for task in &mut tasks {
            normalize_task_paths(task);
        }

        let mut index: HashMap<String, usize> = HashMap::with_capacity(tasks.len());
        for (i, task) in tasks.iter().enumerate() {
            if index.insert(task.name.clone(), i).is_some() {
                return Err(ConfigError::DuplicateName(task.name.clone()));
            }
        }

        let mut target_owner: HashMap<PathBuf, usize> = HashMap::new();
        for (i, task) in tasks.iter().enumerate() {
            for target in &task.targets {
                match target_owner.get(target) {
                    Some(&owner) if owner != i => {
                        return Err(ConfigError::TargetCollision {
                            target: target.clone(),
                            first: tasks[owner].name.clone(),
                            second: task.name.clone(),
                        });
                    }
                    Some(_) => {}
                    None => {
                        target_owner.insert(target.clone(), i);
                    }
                }
            }
        }

        let mut upstream = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let mut edges: Vec<usize> = Vec::new();
            for dep in &task.dependencies {
                let owner = match dep {
                    Dependency::Task(name) => match index.get(name) {
                        Some(&i) => Some(i),
                        None => {
                            return Err(ConfigError::UnresolvedDependency {
                                task: task.name.clone(),
                                dependency: name.clone(),
                            });
                        }
                    },
                    Dependency::File(path) => target_owner.get(path).copied(),
                };

                if let Some(owner) = owner {
                    if !edges.contains(&owner) {
                        edges.push(owner);
                    }
                }
            }
            upstream.push(edges);
        }

        Ok(Graph {
            tasks,
            index,
            upstream,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.index.get(name).map(|&i| &self.tasks[i])
    }

    /// Tasks `name` directly depends on, explicitly or through a file it reads.
    pub fn upstream(&self, name: &str) -> impl Iterator<Item = &Task> {
        self.index
            .get(name)
            .map(|&i| self.upstream[i].as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.tasks[i])
    }

    /// Files whose modification times gate `task`: its own file
    /// dependencies plus the targets of upstream tasks.
    pub fn dependency_files(&self, task: &Task) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = task.file_deps().cloned().collect();

        for upstream in self.upstream(&task.name) {
            for target in &upstream.targets {
                if !files.contains(target) {
                    files.push(target.clone());
                }
            }
        }

        files
    }

    /// Orders the transitive closure of `requested` so that every task comes
    /// after the tasks it depends on. Independent tasks keep declaration
    /// order. An empty request plans every task.
    pub fn plan(&self, requested: &[String]) -> Result<Plan, ConfigError> {
        let roots: Vec<usize> = if requested.is_empty() {
            (0..self.tasks.len()).collect()
        } else {
            requested
                .iter()
                .map(|name| {
                    self.index
                        .get(name)
                        .copied()
                        .ok_or_else(|| ConfigError::UnknownTask(name.clone()))
                })
                .collect::<Result<_, _>>()?
        };

        let selected = self.closure(&roots);
        self.detect_cycles(&selected)?;

        let order = self.sort_topologically(&selected);
        debug!(order = ?order, "planned tasks");

        Ok(Plan { order })
    }

    fn closure(&self, roots: &[usize]) -> Vec<bool> {
        let mut selected = vec![false; self.tasks.len()];
        let mut stack: Vec<usize> = roots.to_vec();

        while let Some(i) = stack.pop() {
            if selected[i] {
                continue;
            }
            selected[i] = true;
            stack.extend(self.upstream[i].iter().filter(|&&dep| !selected[dep]));
        }

        selected
    }

    fn detect_cycles(&self, selected: &[bool]) -> Result<(), ConfigError> {
        let mut marks = vec![Mark::Unvisited; self.tasks.len()];
        let mut path = Vec::new();

        for i in (0..self.tasks.len()).filter(|&i| selected[i]) {
            if let Some(cycle) = self.find_cycle(i, &mut marks, &mut path) {
                let members = cycle
                    .into_iter()
                    .map(|i| self.tasks[i].name.clone())
                    .collect();
                return Err(ConfigError::Cycle(members));
            }
        }

        Ok(())
    }

    fn find_cycle(
        &self,
        i: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        match marks[i] {
            Mark::Done => return None,
            Mark::OnStack => {
                let start = path.iter().position(|&p| p == i).unwrap_or(0);
                return Some(path[start..].to_vec());
            }
            Mark::Unvisited => {}
        }

        marks[i] = Mark::OnStack;
        path.push(i);

        for &dep in &self.upstream[i] {
            if let Some(cycle) = self.find_cycle(dep, marks, path) {
                return Some(cycle);
            }
        }

        path.pop();
        marks[i] = Mark::Done;
        None
    }

    fn sort_topologically(&self, selected: &[bool]) -> Vec<String> {
        let mut in_degrees = vec![0usize; self.tasks.len()];
        let mut downstream: Vec<Vec<usize>> = vec![Vec::new(); self.tasks.len()];

        for i in (0..self.tasks.len()).filter(|&i| selected[i]) {
            in_degrees[i] = self.upstream[i].len();
            for &dep in &self.upstream[i] {
                downstream[dep].push(i);
            }
        }

        // Lowest declaration index first keeps ties stable.
        let mut ready: BTreeSet<usize> = (0..self.tasks.len())
            .filter(|&i| selected[i] && in_degrees[i] == 0)
            .collect();
        let mut sorted_tasks = Vec::new();

        while let Some(i) = ready.pop_first() {
            sorted_tasks.push(self.tasks[i].name.clone());

            for &dependent in &downstream[i] {
                in_degrees[dependent] -= 1;
                if in_degrees[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        sorted_tasks
    }
}

fn normalize_task_paths(task: &mut Task) {
    for target in &mut task.targets {
        *target = normalize_path(target);
    }
    task.targets.dedup();

    for dep in &mut task.dependencies {
        if let Dependency::File(path) = dep {
            *path = normalize_path(path);
        }
    }
}
