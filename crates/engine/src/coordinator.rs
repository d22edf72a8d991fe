//! The coordinator loop (spec.md §4.D): dispatches work items from a batch
//! file to a fixed pool of connected workers, one item per idle worker at a
//! time, logging each start/completion, and draining outstanding work
//! before exiting.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;

use worker_core::batch::BatchReader;
use worker_core::joblog::JobLog;
use worker_core::protocol::Assignment;
use worker_transport::CoordinatorTransport;

use crate::shutdown::ShutdownEvent;

pub struct CoordinatorConfig {
    pub batch_path: PathBuf,
    pub listen: String,
    pub workers: u32,
    pub poll_interval: Duration,
    pub shell: String,
    pub joblog_path: Option<PathBuf>,
    pub prolog: Option<PathBuf>,
    pub epilog: Option<PathBuf>,
    pub verbose: bool,
}

/// Runs the full coordinator lifecycle and returns the process exit code
/// (spec.md §7): 0 on a clean dispatch, nonzero if the prolog/epilog failed
/// softly is not reflected here (those are warnings only) — only a fabric
/// or batch-file failure propagates as `Err`.
pub async fn run(
    config: CoordinatorConfig,
    mut shutdown_rx: mpsc::UnboundedReceiver<ShutdownEvent>,
) -> anyhow::Result<i32> {
    if let Some(prolog) = &config.prolog {
        match worker_core::exec::run_file(&config.shell, prolog).await {
            Ok(status) if !status.success() => {
                eprintln!(
                    "### warning: prolog exited {}, continuing anyway",
                    worker_core::exec::exit_code(status)
                );
            }
            Err(err) => eprintln!("### warning: prolog failed to run: {err}"),
            Ok(_) => {}
        }
    }

    let batch_file = std::fs::File::open(&config.batch_path).map_err(|err| {
        worker_core::error::DispatcherError::BatchFileUnreadable(config.batch_path.clone(), err)
    })?;
    let mut batch = BatchReader::new(std::io::BufReader::new(batch_file));

    let mut joblog = match &config.joblog_path {
        Some(path) => match JobLog::open(path) {
            Ok(log) => Some(log),
            Err(err) => {
                eprintln!("### warning: couldn't open job log '{}': {err}", path.display());
                None
            }
        },
        None => None,
    };

    let mut transport = CoordinatorTransport::bind(&config.listen, config.workers, config.verbose).await?;

    let mut next_job_id: u32 = 1;
    let mut active_workers = transport.worker_count();
    let mut shutting_down = false;
    let mut items_remain = true;

    // Dispatch phase: poll (with the configurable sleep) for ready/completed
    // workers and feed them work, until the batch is exhausted or shutdown
    // is requested. Mirrors spec.md §4.D step 2's non-blocking receive loop.
    while items_remain && active_workers > 0 {
        tokio::select! {
            biased;

            event = shutdown_rx.recv() => {
                match event {
                    Some(ShutdownEvent::Graceful) | None => {
                        if !shutting_down {
                            shutting_down = true;
                            items_remain = false;
                            eprintln!("### msg: shutdown requested, finishing in-flight jobs and terminating workers");
                        }
                    }
                    Some(ShutdownEvent::Immediate) => {
                        eprintln!("### msg: immediate shutdown requested, aborting");
                        transport.abort("coordinator shutting down immediately").await;
                        return Ok(130);
                    }
                }
            }

            maybe_msg = async {
                loop {
                    match transport.try_recv_completion() {
                        Ok(Some(msg)) => return Ok(msg),
                        Ok(None) => sleep(config.poll_interval).await,
                        Err(err) => return Err(err),
                    }
                }
            } => {
                let (rank, completion) = match maybe_msg {
                    Ok(msg) => msg,
                    Err(err) => {
                        transport.abort(&format!("{err}")).await;
                        return Err(err);
                    }
                };
                log_completion(&mut joblog, rank, completion);

                let next = match batch.next_item() {
                    Ok(next) => next,
                    Err(err) => {
                        transport.abort(&format!("batch read failed: {err}")).await;
                        return Err(err.into());
                    }
                };
                match next {
                    Some(script) => {
                        let job_id = next_job_id;
                        next_job_id += 1;
                        dispatch(&mut transport, &mut joblog, rank, job_id, script).await?;
                    }
                    None => {
                        items_remain = false;
                        transport.send_assignment(rank, Assignment::terminate(), &[]).await?;
                        active_workers -= 1;
                    }
                }
            }
        }
    }

    // Drain phase: the batch is exhausted (or shutdown was requested), so
    // there's nothing left to decide between messages — block for the next
    // completion and reply TERMINATE, per spec.md §4.D's drain step.
    while active_workers > 0 {
        tokio::select! {
            biased;

            event = shutdown_rx.recv(), if !shutting_down => {
                if let Some(ShutdownEvent::Immediate) = event {
                    eprintln!("### msg: immediate shutdown requested, aborting");
                    transport.abort("coordinator shutting down immediately").await;
                    return Ok(130);
                }
                shutting_down = true;
            }

            result = transport.recv_completion() => {
                let (rank, completion) = match result {
                    Ok(msg) => msg,
                    Err(err) => {
                        transport.abort(&format!("{err}")).await;
                        return Err(err);
                    }
                };
                log_completion(&mut joblog, rank, completion);
                transport.send_assignment(rank, Assignment::terminate(), &[]).await?;
                active_workers -= 1;
            }
        }
    }

    if let Some(epilog) = &config.epilog {
        match worker_core::exec::run_file(&config.shell, epilog).await {
            Ok(status) if !status.success() => {
                eprintln!(
                    "### warning: epilog exited {}",
                    worker_core::exec::exit_code(status)
                );
            }
            Err(err) => eprintln!("### warning: epilog failed to run: {err}"),
            Ok(_) => {}
        }
    }

    Ok(0)
}

/// Logs a completion record against the job id the worker actually reported
/// (spec.md §3: the coordinator keeps no per-worker state beyond "who sent
/// the most recent ready/done message"). A `READY` completion (`job_id ==
/// 0`) has nothing to report and is silently skipped, matching spec.md §4.D
/// step 3 ("if the payload's `job_id > 0`...").
fn log_completion(joblog: &mut Option<JobLog>, rank: u32, completion: worker_core::protocol::Completion) {
    if completion.is_ready() {
        return;
    }
    if let Some(log) = joblog.as_mut() {
        if let Err(err) = log.log_complete(rank, completion.job_id, completion.exit_status) {
            eprintln!("### warning: couldn't write job log: {err}");
        }
    }
}

async fn dispatch(
    transport: &mut CoordinatorTransport,
    joblog: &mut Option<JobLog>,
    rank: u32,
    job_id: u32,
    script: Vec<u8>,
) -> anyhow::Result<()> {
    let assignment = Assignment {
        job_id,
        payload_size: script.len() as u32,
    };
    transport.send_assignment(rank, assignment, &script).await?;
    if let Some(log) = joblog.as_mut() {
        if let Err(err) = log.log_start(rank, job_id) {
            eprintln!("### warning: couldn't write job log: {err}");
        }
    }
    Ok(())
}
