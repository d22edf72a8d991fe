mod cli;
mod shutdown;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use worker_core::config::{self, Defaults};
use worker_core::error::DispatcherError;
use worker_core::exec::DEFAULT_SHELL;
use worker_engine::{coordinator, worker};

use crate::cli::{Cli, Command, CoordinateArgs, WorkArgs};
use crate::shutdown::{spawn_ctrl_c_handler, ShutdownController};

/// Default listen address when `--listen` and the defaults file both leave
/// it unset.
const DEFAULT_LISTEN: &str = "0.0.0.0:9000";

/// Default poll sleep for the coordinator's non-blocking receive
/// (spec.md §6's `-s` flag), matching the reference's typical usage.
const DEFAULT_POLL_INTERVAL_MICROS: u64 = 1_000;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("### error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let defaults = load_defaults();

    match cli.command {
        Command::Coordinate(args) => run_coordinate(args, defaults).await,
        Command::Work(args) => run_work(args, defaults).await,
    }
}

/// Loads `worker-core::config`'s optional defaults file. A read/parse
/// failure is a warning (spec.md §4.I's posture: the file is pure
/// convenience), never fatal.
fn load_defaults() -> Defaults {
    match config::load_defaults() {
        Ok(Some(defaults)) => defaults,
        Ok(None) => Defaults::default(),
        Err(err) => {
            eprintln!("### warning: couldn't read defaults file: {err:#}");
            Defaults::default()
        }
    }
}

async fn run_coordinate(args: CoordinateArgs, defaults: Defaults) -> anyhow::Result<i32> {
    let workers = args.workers.or(defaults.workers).unwrap_or(1);
    if workers == 0 {
        eprintln!("### error: at least one worker is required (--workers 0)");
        return Ok(DispatcherError::NoWorkers.exit_code());
    }

    let listen = args
        .listen
        .or(defaults.listen)
        .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
    let shell = args
        .shell
        .or(defaults.shell)
        .unwrap_or_else(|| DEFAULT_SHELL.to_string());
    let poll_interval = Duration::from_micros(
        args.poll_interval_micros
            .or(defaults.poll_interval_micros)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MICROS),
    );

    let config = coordinator::CoordinatorConfig {
        batch_path: args.batch,
        listen,
        workers,
        poll_interval,
        shell,
        joblog_path: args.log,
        prolog: args.prolog,
        epilog: args.epilog,
        verbose: args.verbose,
    };

    let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
    let shutdown = Arc::new(ShutdownController::new());
    spawn_ctrl_c_handler(shutdown, shutdown_tx);

    let code = coordinator::run(config, shutdown_rx).await?;
    Ok(code)
}

async fn run_work(args: WorkArgs, defaults: Defaults) -> anyhow::Result<i32> {
    let shell = args
        .shell
        .or(defaults.shell)
        .unwrap_or_else(|| DEFAULT_SHELL.to_string());

    let config = worker::WorkerConfig {
        coordinator: args.coordinator,
        shell,
        verbose: args.verbose,
    };

    let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
    let shutdown = Arc::new(ShutdownController::new());
    spawn_ctrl_c_handler(shutdown, shutdown_tx);

    let code = worker::run(config, shutdown_rx).await?;
    Ok(code)
}

/// Maps an unhandled error to spec.md §7's exit-code table. A
/// `DispatcherError` carries its own code; anything else (a transport I/O
/// error bubbling up unclassified, say) is a startup-class failure.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<DispatcherError>()
        .map(DispatcherError::exit_code)
        .unwrap_or(3)
}
