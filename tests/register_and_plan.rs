mod common;

use std::collections::BTreeSet;

use common::{FakeRunner, Record, entries};
use doer::stat::mock::MockStat;
use doer::{Action, ConfigError, Graph, Task};
use proptest::prelude::*;

#[test]
fn duplicate_names_are_rejected() {
    let err = Graph::register(vec![Task::new("pip"), Task::new("pip")]).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateName(name) if name == "pip"));
}

#[test]
fn target_collision_in_either_order() {
    let a = || Task::new("compile").target("requirements.txt");
    let b = || Task::new("freeze").target("./requirements.txt");

    for tasks in [vec![a(), b()], vec![b(), a()]] {
        match Graph::register(tasks) {
            Err(ConfigError::TargetCollision {
                target,
                first,
                second,
            }) => {
                assert_eq!(target, std::path::PathBuf::from("requirements.txt"));
                let mut names = vec![first, second];
                names.sort();
                assert_eq!(names, vec!["compile", "freeze"]);
            }
            other => panic!("expected target collision, got {other:?}"),
        }
    }
}

#[test]
fn unknown_task_dependency_is_unresolved() {
    let err = Graph::register(vec![Task::new("sync").task_dep("compile")]).unwrap_err();
    match err {
        ConfigError::UnresolvedDependency { task, dependency } => {
            assert_eq!(task, "sync");
            assert_eq!(dependency, "compile");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn plain_file_dependencies_always_resolve() {
    let graph = Graph::register(vec![Task::new("compile").file_dep("requirements.in")]).unwrap();
    assert_eq!(graph.upstream("compile").count(), 0);
}

#[tokio::test]
async fn cycle_fails_planning_before_any_action_runs() {
    let stat = MockStat::new();
    let runner = FakeRunner::new(&stat);
    let log = runner.log.clone();

    let graph = Graph::register(vec![
        Task::new("a")
            .file_dep("c.out")
            .target("a.out")
            .action(Action::custom(Record::new("a", &log))),
        Task::new("b")
            .file_dep("a.out")
            .target("b.out")
            .action(Action::shell("b")),
        Task::new("c")
            .task_dep("b")
            .target("c.out")
            .action(Action::shell("c")),
    ])
    .unwrap();

    match graph.plan(&[]) {
        Err(ConfigError::Cycle(members)) => {
            assert_eq!(members, vec!["a", "c", "b"]);
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
    assert!(entries(&log).is_empty());
}

/// Random DAGs: task `i` may only depend on tasks `0..i`, then the
/// declaration order is shuffled so the plan has real work to do.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Task>> {
    (1..=max_tasks)
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n),
                Just((0..n).collect::<Vec<usize>>()).prop_shuffle(),
            )
        })
        .prop_map(|(raw_deps, declaration)| {
            let tasks: Vec<Task> = raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    let mut task = Task::new(format!("t{i}")).target(format!("t{i}.out"));
                    let deps: BTreeSet<usize> = potential
                        .into_iter()
                        .filter(|_| i > 0)
                        .map(|d| d % i)
                        .collect();
                    for (k, dep) in deps.into_iter().enumerate() {
                        // Mix explicit and file-implied edges.
                        task = if k % 2 == 0 {
                            task.task_dep(format!("t{dep}"))
                        } else {
                            task.file_dep(format!("t{dep}.out"))
                        };
                    }
                    task
                })
                .collect();

            declaration.into_iter().map(|i| tasks[i].clone()).collect()
        })
}

proptest! {
    #[test]
    fn every_task_follows_its_dependencies(tasks in dag_strategy(12)) {
        let graph = Graph::register(tasks).unwrap();
        let plan = graph.plan(&[]).unwrap();

        prop_assert_eq!(plan.len(), graph.tasks().len());
        for task in graph.tasks() {
            let position = plan.position(&task.name).unwrap();
            for upstream in graph.upstream(&task.name) {
                prop_assert!(plan.position(&upstream.name).unwrap() < position);
            }
        }
    }

    #[test]
    fn planning_a_subset_includes_its_closure(
        tasks in dag_strategy(12),
        pick in any::<prop::sample::Index>(),
    ) {
        let graph = Graph::register(tasks).unwrap();
        let chosen = graph.tasks()[pick.index(graph.tasks().len())].name.clone();
        let plan = graph.plan(std::slice::from_ref(&chosen)).unwrap();

        prop_assert_eq!(plan.order().last(), Some(&chosen));
        for name in plan.order() {
            for upstream in graph.upstream(name) {
                prop_assert!(plan.position(&upstream.name).is_some());
            }
        }
    }

    #[test]
    fn plans_are_deterministic(tasks in dag_strategy(8)) {
        let graph = Graph::register(tasks).unwrap();
        prop_assert_eq!(graph.plan(&[]).unwrap(), graph.plan(&[]).unwrap());
    }
}
