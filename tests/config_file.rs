#![cfg(unix)]

mod common;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use clap::Parser;
use common::init_tracing;
use doer::cli::Cli;
use doer::task::load_tasks;
use doer::{ConfigError, DoerError};
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("doer.toml");
    let config = format!("[variables]\ndir = \"{}\"\n\n{}", dir.path().display(), body);
    fs::write(&path, config).unwrap();
    path
}

async fn run(config: &Path, extra: &[&str]) -> doer::Result<bool> {
    let mut args = vec!["doer", "-f", config.to_str().unwrap()];
    args.extend_from_slice(extra);
    doer::run(Cli::parse_from(args)).await
}

#[test]
fn glob_dependencies_expand_at_load() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("base.in"), "").unwrap();
    fs::write(dir.path().join("dev.in"), "").unwrap();
    fs::write(dir.path().join("notes.md"), "").unwrap();
    let config = write_config(
        &dir,
        r#"
[task.compile]
actions = ["pip-compile ${dir}/base.in"]
file_dep = ["${dir}/*.in"]
targets = ["${dir}/requirements.txt"]
"#,
    );

    let loaded = load_tasks(&config).unwrap();
    let deps: Vec<&PathBuf> = loaded.tasks[0].file_deps().collect();
    assert_eq!(
        deps,
        vec![&dir.path().join("base.in"), &dir.path().join("dev.in")]
    );
    assert_eq!(loaded.tasks[0].targets, vec![dir.path().join("requirements.txt")]);
}

#[tokio::test]
async fn lockfile_task_runs_then_skips_then_reruns() {
    init_tracing();

    let dir = TempDir::new().unwrap();
    let spec = dir.path().join("requirements.in");
    fs::write(&spec, "click\nmacfsevents\npyinotify\nrequests\n").unwrap();
    let config = write_config(
        &dir,
        r#"
[config]
default = "pip"

[task.pip]
doc = "lock and strip platform-only packages"
actions = [
  "cp ${dir}/requirements.in ${dir}/requirements.txt",
  "echo ran >> ${dir}/runs",
  { edit = "${dir}/requirements.txt", delete = "^macfsevents" },
  { edit = "${dir}/requirements.txt", delete = "^pyinotify" },
]
file_dep = ["${dir}/requirements.in"]
targets = ["${dir}/requirements.txt"]
"#,
    );
    let runs = || fs::read_to_string(dir.path().join("runs")).unwrap().lines().count();

    assert!(run(&config, &[]).await.unwrap());
    assert_eq!(
        fs::read_to_string(dir.path().join("requirements.txt")).unwrap(),
        "click\nrequests\n"
    );
    assert_eq!(runs(), 1);

    assert!(run(&config, &[]).await.unwrap());
    assert_eq!(runs(), 1);

    File::options()
        .write(true)
        .open(&spec)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(60))
        .unwrap();
    assert!(run(&config, &["pip"]).await.unwrap());
    assert_eq!(runs(), 2);
}

#[tokio::test]
async fn failing_command_reports_unsuccessful_run() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
[task.broken]
actions = ["exit 3", "touch ${dir}/never"]
"#,
    );

    assert!(!run(&config, &[]).await.unwrap());
    assert!(!dir.path().join("never").exists());
}

#[tokio::test]
async fn cyclic_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
[task.a]
actions = ["touch ${dir}/a-ran"]
task_dep = ["b"]

[task.b]
actions = ["touch ${dir}/b-ran"]
task_dep = ["a"]
"#,
    );

    match run(&config, &[]).await {
        Err(DoerError::Config(ConfigError::Cycle(members))) => {
            assert_eq!(members, vec!["a", "b"]);
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
    assert!(!dir.path().join("a-ran").exists());
    assert!(!dir.path().join("b-ran").exists());
}

#[tokio::test]
async fn dry_run_executes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
[task.touch]
actions = ["touch ${dir}/ran"]
"#,
    );

    assert!(run(&config, &["--dry-run"]).await.unwrap());
    assert!(!dir.path().join("ran").exists());
}

#[tokio::test]
async fn fingerprints_are_persisted_next_to_the_config() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("in.txt"), "one").unwrap();
    let config = write_config(
        &dir,
        r#"
[config]
check = "fingerprint"

[task.copy]
actions = ["cp ${dir}/in.txt ${dir}/out.txt"]
file_dep = ["${dir}/in.txt"]
targets = ["${dir}/out.txt"]
"#,
    );

    assert!(run(&config, &[]).await.unwrap());
    let state = fs::read_to_string(dir.path().join("doer_state.json")).unwrap();
    assert!(state.contains("\"copy\""));
}

#[tokio::test]
async fn unknown_task_on_the_command_line_is_an_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "[task.a]\nactions = [\"true\"]\n");

    assert!(matches!(
        run(&config, &["nope"]).await,
        Err(DoerError::Config(ConfigError::UnknownTask(name))) if name == "nope"
    ));
}

#[tokio::test]
async fn list_mode_runs_nothing() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
[config]
default = "touch"
check = "fingerprint"

[task.touch]
doc = "create a marker"
actions = ["touch ${dir}/ran"]
"#,
    );

    assert!(run(&config, &["-l"]).await.unwrap());
    assert!(!dir.path().join("ran").exists());
    assert!(!dir.path().join("doer_state.json").exists());
}
