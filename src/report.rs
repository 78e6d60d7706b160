use std::{fmt, time::Duration};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Targets are newer than every dependency.
    UpToDate,
    /// A task this one depends on failed or was itself blocked.
    UpstreamFailed(String),
    /// Not attempted because the run stopped at an earlier failure.
    Halted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure { reason: String },
    Skipped { reason: SkipReason },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }

    /// True for failures and for tasks blocked by one.
    pub fn is_unsuccessful(&self) -> bool {
        match self {
            Outcome::Success => false,
            Outcome::Failure { .. } => true,
            Outcome::Skipped { reason } => !matches!(reason, SkipReason::UpToDate),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure { reason } => write!(f, "FAILED: {}", reason),
            Outcome::Skipped {
                reason: SkipReason::UpToDate,
            } => write!(f, "up to date"),
            Outcome::Skipped {
                reason: SkipReason::UpstreamFailed(upstream),
            } => write!(f, "skipped, depends on failed task '{}'", upstream),
            Outcome::Skipped {
                reason: SkipReason::Halted,
            } => write!(f, "skipped, run halted"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub name: String,
    pub outcome: Outcome,
    /// Time spent running actions; zero for skipped tasks.
    pub elapsed: Duration,
}

/// Per-task outcomes of one scheduler run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    tasks: Vec<TaskReport>,
}

impl RunReport {
    pub(crate) fn record(&mut self, name: &str, outcome: Outcome, elapsed: Duration) {
        self.tasks.push(TaskReport {
            name: name.to_string(),
            outcome,
            elapsed,
        });
    }

    pub fn tasks(&self) -> &[TaskReport] {
        &self.tasks
    }

    pub fn outcome(&self, name: &str) -> Option<&Outcome> {
        self.tasks
            .iter()
            .find(|t| t.name == name)
            .map(|t| &t.outcome)
    }

    pub fn is_success(&self) -> bool {
        !self.tasks.iter().any(|t| t.outcome.is_unsuccessful())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|t| t.outcome.is_failure())
    }

    pub fn count(&self, predicate: impl Fn(&Outcome) -> bool) -> usize {
        self.tasks.iter().filter(|t| predicate(&t.outcome)).count()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for task in &self.tasks {
            let marker = match &task.outcome {
                Outcome::Success => ".",
                Outcome::Failure { .. } => "F",
                Outcome::Skipped {
                    reason: SkipReason::UpToDate,
                } => "-",
                Outcome::Skipped { .. } => "x",
            };

            if task.elapsed.is_zero() {
                writeln!(f, "{} {}: {}", marker, task.name, task.outcome)?;
            } else {
                let elapsed = Duration::from_secs(task.elapsed.as_secs())
                    + Duration::from_millis(task.elapsed.subsec_millis().into());
                writeln!(
                    f,
                    "{} {}: {} in {}",
                    marker,
                    task.name,
                    task.outcome,
                    humantime::format_duration(elapsed)
                )?;
            }
        }

        write!(
            f,
            "{} succeeded, {} failed, {} up to date, {} not run",
            self.count(|o| *o == Outcome::Success),
            self.count(Outcome::is_failure),
            self.count(|o| matches!(
                o,
                Outcome::Skipped {
                    reason: SkipReason::UpToDate
                }
            )),
            self.count(
                |o| matches!(o, Outcome::Skipped { reason } if *reason != SkipReason::UpToDate)
            ),
        )
    }
}
