use std::path::PathBuf;

/// Error classes from the dispatcher's failure-semantics design: configuration
/// errors are caught before any process-group state exists, startup errors
/// abort before dispatch begins, and protocol errors abort an already-running
/// group. Soft errors (log-open failure, prolog/epilog nonzero exit) are
/// deliberately *not* represented here — those are logged as warnings and
/// never propagate as `Err`.
#[derive(Debug, thiserror::Error)]
pub enum DispatcherError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("can't open batch file '{0}'")]
    BatchFileUnreadable(PathBuf, #[source] std::io::Error),

    #[error("at least one worker is required (--workers 0)")]
    NoWorkers,

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Process exit code matching spec.md §7's error-class table.
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatcherError::Config(_) => 2,
            DispatcherError::BatchFileUnreadable(..) | DispatcherError::NoWorkers => 3,
            DispatcherError::Protocol(_) => 4,
            DispatcherError::Io(_) => 3,
        }
    }
}
