#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use doer::cache::Cache;
use doer::process::{CommandError, CommandFuture, CommandOutput, CommandRunner};
use doer::stat::mock::MockStat;
use doer::task::{BoxError, Runnable};
use doer::{Graph, RunOptions, RunReport, Scheduler};
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Captured per test; shown only for failing tests unless `--nocapture`.
/// Enable levels with e.g. `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A fake command runner that:
/// - records every command it is asked to run
/// - writes a file into the mock filesystem for commands that "produce" one
/// - fails or times out for commands configured to do so
#[derive(Debug, Clone)]
pub struct FakeRunner {
    pub log: Log,
    stat: MockStat,
    produces: HashMap<String, PathBuf>,
    failing: HashSet<String>,
    timing_out: HashSet<String>,
}

impl FakeRunner {
    pub fn new(stat: &MockStat) -> Self {
        Self {
            log: Log::default(),
            stat: stat.clone(),
            produces: HashMap::new(),
            failing: HashSet::new(),
            timing_out: HashSet::new(),
        }
    }

    pub fn producing(mut self, command: &str, path: impl Into<PathBuf>) -> Self {
        self.produces.insert(command.to_string(), path.into());
        self
    }

    pub fn failing(mut self, command: &str) -> Self {
        self.failing.insert(command.to_string());
        self
    }

    pub fn timing_out(mut self, command: &str) -> Self {
        self.timing_out.insert(command.to_string());
        self
    }
}

impl CommandRunner for FakeRunner {
    fn run<'a>(&'a self, command: &'a str, _timeout: Option<Duration>) -> CommandFuture<'a> {
        Box::pin(async move {
            self.log.lock().unwrap().push(command.to_string());

            if self.timing_out.contains(command) {
                return Err(CommandError::Timeout);
            }
            if self.failing.contains(command) {
                return Ok(CommandOutput::failed(1, format!("{command}: boom\n")));
            }
            if let Some(path) = self.produces.get(command) {
                self.stat.write(path, command);
            }
            Ok(CommandOutput::ok())
        })
    }
}

/// A custom action that appends its label to a shared log.
#[derive(Debug)]
pub struct Record {
    pub label: String,
    pub log: Log,
    pub fail_with: Option<String>,
}

impl Record {
    pub fn new(label: &str, log: &Log) -> Self {
        Self {
            label: label.to_string(),
            log: Arc::clone(log),
            fail_with: None,
        }
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.fail_with = Some(message.to_string());
        self
    }
}

impl Runnable for Record {
    fn run(&self) -> Result<(), BoxError> {
        self.log.lock().unwrap().push(self.label.clone());
        match &self.fail_with {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        format!("record {}", self.label)
    }
}

/// Plans everything in `requested` (empty = all) and executes it once.
pub async fn run_once(
    graph: &Graph,
    stat: &MockStat,
    runner: &FakeRunner,
    cache: &mut Cache,
    options: RunOptions,
    requested: &[&str],
) -> RunReport {
    let requested: Vec<String> = requested.iter().map(|s| s.to_string()).collect();
    let plan = graph.plan(&requested).expect("plan");
    let mut scheduler = Scheduler::new(graph, stat, runner, cache, options);
    scheduler.execute(&plan).await
}
