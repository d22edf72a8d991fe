//! Shared shutdown vocabulary between the coordinator and worker loops.
//!
//! The CLI's Ctrl-C handler (`crates/cli/src/shutdown.rs`) is the only
//! producer of these events; both loops race them against their fabric
//! receives via `tokio::select!`.

/// A shutdown request raised out-of-band from the main loop's own progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownEvent {
    /// First Ctrl-C: stop accepting new work, finish what's in flight, then
    /// drain (coordinator) or exit on the next ready cycle (worker).
    Graceful,
    /// Second Ctrl-C: stop immediately without waiting for in-flight work.
    Immediate,
}
