//! Flag parsing for the `worker` binary (spec.md §4.H/§6): one process,
//! two subcommands. `coordinate` keeps spec.md §6's exact `-p/-b/-e/-l/-s/-v`
//! letters; `--listen`/`--workers`/`--coordinator` are this rendition's
//! substitute for the MPI launcher's out-of-band process-group formation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "worker", version, about = "Distributed batch-job dispatcher")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the coordinator: dispatch a batch file's work items to connected workers.
    Coordinate(CoordinateArgs),
    /// Run a worker: connect to a coordinator and execute whatever it assigns.
    Work(WorkArgs),
}

#[derive(Debug, Args)]
pub struct CoordinateArgs {
    /// Prolog script, run once by the coordinator before dispatch begins.
    #[arg(short = 'p', long = "prolog", value_name = "PATH")]
    pub prolog: Option<PathBuf>,

    /// Batch file of sentinel-separated shell scripts.
    #[arg(short = 'b', long = "batch", value_name = "PATH")]
    pub batch: PathBuf,

    /// Epilog script, run once after drain completes.
    #[arg(short = 'e', long = "epilog", value_name = "PATH")]
    pub epilog: Option<PathBuf>,

    /// Job log file. Soft-fails (warns and continues without logging) if it
    /// can't be opened.
    #[arg(short = 'l', long = "log", value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Poll sleep interval, in microseconds, for the coordinator's
    /// non-blocking completion receive.
    #[arg(short = 's', long = "sleep", value_name = "MICROS")]
    pub poll_interval_micros: Option<u64>,

    /// Address to bind and accept worker connections on.
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Number of workers to wait for before dispatch begins (this
    /// rendition's `N - 1`; the coordinator itself is rank 0).
    #[arg(long, value_name = "N")]
    pub workers: Option<u32>,

    /// Shell interpreter used to run scripts, the prolog, and the epilog.
    #[arg(long, value_name = "PATH")]
    pub shell: Option<String>,

    /// Verbose diagnostics to stderr.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

#[derive(Debug, Args)]
pub struct WorkArgs {
    /// Coordinator address to dial, e.g. `127.0.0.1:9000`.
    #[arg(long, value_name = "ADDR")]
    pub coordinator: String,

    /// Shell interpreter used to run assigned scripts.
    #[arg(long, value_name = "PATH")]
    pub shell: Option<String>,

    /// Verbose diagnostics to stderr.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
