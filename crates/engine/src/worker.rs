//! The worker loop (spec.md §4.E): connect, announce readiness, and
//! repeatedly run whatever script the coordinator hands over until told to
//! terminate.

use tokio::sync::mpsc;

use worker_transport::WorkerTransport;

use crate::shutdown::ShutdownEvent;

pub struct WorkerConfig {
    pub coordinator: String,
    pub shell: String,
    pub verbose: bool,
}

/// Runs the worker lifecycle to completion and returns the process exit
/// code (spec.md §7): 0 once the coordinator sends `TERMINATE`, 130 if a
/// shutdown signal cut the run short instead.
///
/// Per spec.md §4.K, a first shutdown signal is only honored *between*
/// jobs (mirroring how the coordinator never sends `TERMINATE` mid-job); a
/// second signal kills whatever child is currently running and returns
/// immediately.
pub async fn run(
    config: WorkerConfig,
    mut shutdown_rx: mpsc::UnboundedReceiver<ShutdownEvent>,
) -> anyhow::Result<i32> {
    let mut transport = WorkerTransport::connect(&config.coordinator).await?;
    let rank = transport.rank();
    let size = transport.size();

    if config.verbose {
        eprintln!("### msg: worker rank {rank}/{size} connected to coordinator");
    }

    transport.send_ready().await?;

    let mut stopping = false;

    loop {
        if stopping {
            if config.verbose {
                eprintln!("### msg: worker rank {rank} stopping after in-flight work");
            }
            transport.shutdown().await.ok();
            return Ok(130);
        }

        let delivery = tokio::select! {
            biased;

            event = shutdown_rx.recv() => {
                match event {
                    Some(ShutdownEvent::Immediate) | None => {
                        eprintln!("### msg: worker rank {rank} stopping immediately");
                        transport.shutdown().await.ok();
                        return Ok(130);
                    }
                    Some(ShutdownEvent::Graceful) => {
                        stopping = true;
                        continue;
                    }
                }
            }

            result = transport.recv_delivery() => result?,
        };

        if delivery.assignment.is_terminate() {
            if config.verbose {
                eprintln!("### msg: worker rank {rank} terminating");
            }
            transport.shutdown().await.ok();
            return Ok(0);
        }

        let job_id = delivery.assignment.job_id;
        let script = delivery.payload.unwrap_or_default();

        if config.verbose {
            eprintln!("### msg: worker rank {rank} starting job {job_id}");
        }

        let mut child = match worker_core::exec::spawn_job(&config.shell, rank, size, &script).await {
            Ok(child) => child,
            Err(err) => {
                // spec.md §4.B/§4.E: a spawn failure is the one fatal
                // worker error, and the worker does not rejoin the pool.
                return Err(anyhow::anyhow!("job {job_id} failed to spawn: {err}"));
            }
        };

        let exit_status = tokio::select! {
            biased;

            event = shutdown_rx.recv() => {
                match event {
                    Some(ShutdownEvent::Immediate) | None => {
                        let _ = child.kill().await;
                        transport.send_completion(job_id, -1).await?;
                        eprintln!("### msg: worker rank {rank} killed job {job_id}, stopping immediately");
                        transport.shutdown().await.ok();
                        return Ok(130);
                    }
                    Some(ShutdownEvent::Graceful) => {
                        stopping = true;
                        match child.wait().await {
                            Ok(status) => worker_core::exec::exit_code(status),
                            Err(_) => -1,
                        }
                    }
                }
            }

            result = child.wait() => match result {
                Ok(status) => worker_core::exec::exit_code(status),
                Err(_) => -1,
            },
        };

        transport.send_completion(job_id, exit_status).await?;
    }
}
