use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tracing::{debug, error, info, warn};

use crate::{
    cache::Cache,
    process::CommandRunner,
    report::{Outcome, RunReport, SkipReason},
    stat::StatProvider,
    staleness::{CheckMode, Staleness, StalenessCheck},
    task::{ActionError, Graph, Plan, Task},
};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub check: CheckMode,
    /// Run every planned task regardless of staleness.
    pub force: bool,
    /// Keep attempting tasks that do not depend on a failure.
    pub continue_on_failure: bool,
    /// Applies to tasks without their own timeout.
    pub default_timeout: Option<Duration>,
}

/// Runs planned tasks one at a time, in plan order.
pub struct Scheduler<'a> {
    graph: &'a Graph,
    stat: &'a dyn StatProvider,
    runner: &'a dyn CommandRunner,
    cache: &'a mut Cache,
    options: RunOptions,
    cache_changed: bool,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        graph: &'a Graph,
        stat: &'a dyn StatProvider,
        runner: &'a dyn CommandRunner,
        cache: &'a mut Cache,
        options: RunOptions,
    ) -> Self {
        Self {
            graph,
            stat,
            runner,
            cache,
            options,
            cache_changed: false,
        }
    }

    fn staleness(&self) -> StalenessCheck<'_> {
        StalenessCheck::new(
            self.graph,
            self.stat,
            self.cache,
            self.options.check,
            self.options.force,
        )
    }

    /// Whether any fingerprint was recorded since this scheduler was created.
    pub fn cache_changed(&self) -> bool {
        self.cache_changed
    }

    /// Staleness of every planned task, without running anything.
    pub fn preview(&self, plan: &Plan) -> Vec<(String, Staleness)> {
        let check = self.staleness();
        plan.order()
            .iter()
            .filter_map(|name| self.graph.get(name))
            .map(|task| (task.name.clone(), check.check(task)))
            .collect()
    }

    pub async fn execute(&mut self, plan: &Plan) -> RunReport {
        let mut report = RunReport::default();
        // Failed or blocked task -> the failure that blocked it.
        let mut blocked: HashMap<&str, String> = HashMap::new();
        let mut halted = false;
        let graph = self.graph;

        for name in plan.order() {
            let Some(task) = graph.get(name) else {
                warn!("Task '{}' is not part of the graph, ignoring", name);
                continue;
            };

            let failed_upstream = graph
                .upstream(name)
                .find_map(|upstream| blocked.get(upstream.name.as_str()))
                .cloned();

            if let Some(root) = failed_upstream {
                debug!(task = %name, failed = %root, "skipping task with failed upstream");
                report.record(
                    name,
                    Outcome::Skipped {
                        reason: SkipReason::UpstreamFailed(root.clone()),
                    },
                    Duration::ZERO,
                );
                blocked.insert(name, root);
                continue;
            }

            if halted {
                report.record(
                    name,
                    Outcome::Skipped {
                        reason: SkipReason::Halted,
                    },
                    Duration::ZERO,
                );
                continue;
            }

            let reason = match self.staleness().check(task) {
                Staleness::UpToDate => {
                    info!("Task '{}': up to date, skipping", name);
                    report.record(
                        name,
                        Outcome::Skipped {
                            reason: SkipReason::UpToDate,
                        },
                        Duration::ZERO,
                    );
                    continue;
                }
                Staleness::Stale(reason) => reason,
            };

            info!("Running task '{}' ({})", name, reason);
            let started = Instant::now();

            let result = self.run_actions(task).await;
            match result {
                Ok(()) => {
                    let elapsed = started.elapsed();
                    info!("Task '{}' succeeded in {:?}", name, elapsed);
                    self.remember(task);
                    report.record(name, Outcome::Success, elapsed);
                }
                Err(e) => {
                    error!("Task '{}' failed: {}", name, e);
                    report.record(
                        name,
                        Outcome::Failure {
                            reason: e.to_string(),
                        },
                        started.elapsed(),
                    );
                    blocked.insert(name, name.clone());

                    if !self.options.continue_on_failure {
                        halted = true;
                    }
                }
            }
        }

        report
    }

    async fn run_actions(&self, task: &Task) -> Result<(), ActionError> {
        let timeout = task.timeout.or(self.options.default_timeout);

        for (i, action) in task.actions.iter().enumerate() {
            debug!(task = %task.name, step = i + 1, %action, "running action");
            action.run(self.runner, timeout).await?;
        }

        Ok(())
    }

    fn remember(&mut self, task: &Task) {
        if self.options.check != CheckMode::Fingerprint {
            return;
        }

        let fingerprint = self.staleness().fingerprint(task);
        match fingerprint {
            Ok(fingerprint) => {
                if self.cache.record(&task.name, fingerprint) {
                    self.cache_changed = true;
                }
            }
            Err(e) => {
                warn!(
                    "Could not fingerprint inputs of task '{}' after it ran: {}",
                    task.name, e
                );
            }
        }
    }
}
