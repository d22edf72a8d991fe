//! Wire-level message shapes shared by the coordinator and worker loops.
//!
//! These mirror the `JobInfo`/`JobExitInfo` pair from the original
//! master/slave protocol: one struct flows coordinator → worker
//! (`Assignment`), the other flows worker → coordinator (`Completion`).
//! Both overload a zero job id for a second meaning (`TERMINATE`, `READY`)
//! because the two constants are only ever inspected by one side.

use serde::{Deserialize, Serialize};

/// Sentinel `job_id` coordinator → worker: no more work, exit cleanly.
pub const TERMINATE: u32 = 0;

/// Sentinel `job_id` worker → coordinator: freshly ready, nothing to report.
pub const READY: u32 = 0;

/// Coordinator → worker: "here is job `job_id`, its script is `payload_size`
/// bytes, sent next on the data channel." `job_id == TERMINATE` carries no
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub job_id: u32,
    pub payload_size: u32,
}

impl Assignment {
    pub fn terminate() -> Self {
        Self {
            job_id: TERMINATE,
            payload_size: 0,
        }
    }

    pub fn is_terminate(&self) -> bool {
        self.job_id == TERMINATE
    }
}

/// Worker → coordinator: "I finished `job_id` with `exit_status`", or, when
/// `job_id == READY`, "I have nothing to report, send me work."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub job_id: u32,
    pub exit_status: i32,
}

impl Completion {
    pub fn ready() -> Self {
        Self {
            job_id: READY,
            exit_status: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.job_id == READY
    }
}

/// Sent by the coordinator immediately after accepting a worker's
/// connection: the Rust-native substitute for an MPI launcher assigning
/// `(rank, size)` at process-group startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    pub rank: u32,
    pub size: u32,
}
