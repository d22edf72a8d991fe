//! End-to-end coordinator/worker tests over real loopback TCP, exercising
//! spec.md §8's concrete scenarios: dispatch against a batch file, drain,
//! and job-log start/completion records.

use std::net::TcpListener as StdTcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;

use worker_core::exec::DEFAULT_SHELL;
use worker_engine::{coordinator, worker, ShutdownEvent};

/// Grabs a free loopback port by binding and immediately releasing it.
/// There's a window where another process could steal it before the
/// coordinator binds; acceptable for tests, not for production code.
fn free_addr() -> String {
    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

fn write_batch(dir: &Path, items: &[&str]) -> PathBuf {
    let path = dir.join("batch.txt");
    let mut contents = String::new();
    for item in items {
        contents.push_str(item);
        if !item.ends_with('\n') {
            contents.push('\n');
        }
        contents.push_str("#####--END\n");
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// A shutdown channel whose sender is intentionally leaked, so `recv()`
/// never resolves: these tests exercise the normal dispatch/drain path,
/// not the Ctrl-C path.
fn no_shutdown() -> mpsc::UnboundedReceiver<ShutdownEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::mem::forget(tx);
    rx
}

fn coordinator_config(
    batch_path: PathBuf,
    listen: String,
    workers: u32,
    joblog_path: Option<PathBuf>,
) -> coordinator::CoordinatorConfig {
    coordinator::CoordinatorConfig {
        batch_path,
        listen,
        workers,
        poll_interval: Duration::from_micros(500),
        shell: DEFAULT_SHELL.to_string(),
        joblog_path,
        prolog: None,
        epilog: None,
        verbose: false,
    }
}

fn worker_config(coordinator: String) -> worker::WorkerConfig {
    worker::WorkerConfig {
        coordinator,
        shell: DEFAULT_SHELL.to_string(),
        verbose: false,
    }
}

/// Gives the coordinator's listener time to bind before workers dial in.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn single_job_single_worker() {
    let dir = tempfile::tempdir().unwrap();
    let batch = write_batch(dir.path(), &["echo hi"]);
    let log_path = dir.path().join("job.log");
    let addr = free_addr();

    let coordinator_task = tokio::spawn(coordinator::run(
        coordinator_config(batch, addr.clone(), 1, Some(log_path.clone())),
        no_shutdown(),
    ));
    settle().await;
    let worker_task = tokio::spawn(worker::run(worker_config(addr), no_shutdown()));

    assert_eq!(coordinator_task.await.unwrap().unwrap(), 0);
    assert_eq!(worker_task.await.unwrap().unwrap(), 0);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("1 started by 1 at "));
    assert!(lines[1].starts_with("1 completed by 1 at "));
}

#[tokio::test]
async fn three_jobs_two_workers_no_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let batch = write_batch(
        dir.path(),
        &["sleep 0.2 && true", "true", "true"],
    );
    let log_path = dir.path().join("job.log");
    let addr = free_addr();

    let coordinator_task = tokio::spawn(coordinator::run(
        coordinator_config(batch, addr.clone(), 2, Some(log_path.clone())),
        no_shutdown(),
    ));
    settle().await;
    let w1 = tokio::spawn(worker::run(worker_config(addr.clone()), no_shutdown()));
    let w2 = tokio::spawn(worker::run(worker_config(addr), no_shutdown()));

    assert_eq!(coordinator_task.await.unwrap().unwrap(), 0);
    assert_eq!(w1.await.unwrap().unwrap(), 0);
    assert_eq!(w2.await.unwrap().unwrap(), 0);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let started: Vec<u32> = log
        .lines()
        .filter_map(|l| extract_job_id(l, "started"))
        .collect();
    let completed: Vec<u32> = log
        .lines()
        .filter_map(|l| extract_job_id(l, "completed"))
        .collect();

    let mut started_sorted = started.clone();
    started_sorted.sort_unstable();
    assert_eq!(started_sorted, vec![1, 2, 3]);

    let mut completed_sorted = completed.clone();
    completed_sorted.sort_unstable();
    assert_eq!(completed_sorted, vec![1, 2, 3]);
}

#[tokio::test]
async fn failing_job_is_logged_and_dispatch_continues() {
    let dir = tempfile::tempdir().unwrap();
    let batch = write_batch(dir.path(), &["exit 7", "true"]);
    let log_path = dir.path().join("job.log");
    let addr = free_addr();

    let coordinator_task = tokio::spawn(coordinator::run(
        coordinator_config(batch, addr.clone(), 1, Some(log_path.clone())),
        no_shutdown(),
    ));
    settle().await;
    let worker_task = tokio::spawn(worker::run(worker_config(addr), no_shutdown()));

    assert_eq!(coordinator_task.await.unwrap().unwrap(), 0);
    assert_eq!(worker_task.await.unwrap().unwrap(), 0);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.lines().any(|l| l.starts_with("1 failed by 1 at ") && l.trim_end().ends_with(": 7")));
    assert!(log.lines().any(|l| l.starts_with("2 completed by 1 at ")));
}

#[tokio::test]
async fn environment_exposure() {
    let dir = tempfile::tempdir().unwrap();
    let out1 = dir.path().join("out.1");
    let out2 = dir.path().join("out.2");
    let item = format!(
        "echo \"$WORKER_RANK $WORKER_SIZE\" > {}/out.$WORKER_RANK",
        dir.path().display()
    );
    let batch = write_batch(dir.path(), &[&item, &item]);
    let addr = free_addr();

    let coordinator_task = tokio::spawn(coordinator::run(
        coordinator_config(batch, addr.clone(), 2, None),
        no_shutdown(),
    ));
    settle().await;
    let w1 = tokio::spawn(worker::run(worker_config(addr.clone()), no_shutdown()));
    let w2 = tokio::spawn(worker::run(worker_config(addr), no_shutdown()));

    assert_eq!(coordinator_task.await.unwrap().unwrap(), 0);
    assert_eq!(w1.await.unwrap().unwrap(), 0);
    assert_eq!(w2.await.unwrap().unwrap(), 0);

    for out in [&out1, &out2] {
        let contents = std::fs::read_to_string(out).unwrap();
        let mut parts = contents.split_whitespace();
        let rank: u32 = parts.next().unwrap().parse().unwrap();
        let size: u32 = parts.next().unwrap().parse().unwrap();
        assert!((1..=2).contains(&rank));
        assert_eq!(size, 3);
    }
}

#[tokio::test]
async fn empty_batch_terminates_all_workers() {
    let dir = tempfile::tempdir().unwrap();
    let batch = dir.path().join("batch.txt");
    std::fs::write(&batch, b"").unwrap();
    let addr = free_addr();

    let coordinator_task = tokio::spawn(coordinator::run(
        coordinator_config(batch, addr.clone(), 2, None),
        no_shutdown(),
    ));
    settle().await;
    let w1 = tokio::spawn(worker::run(worker_config(addr.clone()), no_shutdown()));
    let w2 = tokio::spawn(worker::run(worker_config(addr), no_shutdown()));

    assert_eq!(coordinator_task.await.unwrap().unwrap(), 0);
    assert_eq!(w1.await.unwrap().unwrap(), 0);
    assert_eq!(w2.await.unwrap().unwrap(), 0);
}

/// Pulls the leading job id out of a `"<id> <marker> by <rank> at <time>"`
/// job-log line, or `None` if the line doesn't carry that marker.
fn extract_job_id(line: &str, marker: &str) -> Option<u32> {
    let needle = format!(" {marker} by ");
    let idx = line.find(&needle)?;
    line[..idx].parse().ok()
}
