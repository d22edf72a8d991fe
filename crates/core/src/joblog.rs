//! Append-only, flush-after-every-write job log. An external observer can
//! `tail -f` this file and see dispatch progress in real time.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;

/// Timestamp format matching the reference's `asctime`-style log lines, e.g.
/// `Tue Jul 28 14:03:21 2026`.
const TIMESTAMP_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

pub struct JobLog {
    file: File,
}

impl JobLog {
    /// Opens (creating if necessary) the log file for appending. Per
    /// spec.md §4.D's failure semantics, callers should treat an `Err` here
    /// as a soft error: warn and continue without logging.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file })
    }

    pub fn log_start(&mut self, rank: u32, job_id: u32) -> io::Result<()> {
        self.write_line(&format!(
            "{job_id} started by {rank} at {}",
            now_str()
        ))
    }

    pub fn log_complete(&mut self, rank: u32, job_id: u32, exit_status: i32) -> io::Result<()> {
        let line = if exit_status == 0 {
            format!("{job_id} completed by {rank} at {}", now_str())
        } else {
            format!(
                "{job_id} failed by {rank} at {}: {exit_status}",
                now_str()
            )
        };
        self.write_line(&line)
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.file, "{line}")?;
        self.file.flush()
    }
}

fn now_str() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
