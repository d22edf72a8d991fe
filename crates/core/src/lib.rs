pub mod batch;
pub mod config;
pub mod error;
pub mod exec;
pub mod joblog;
pub mod protocol;

pub use batch::BatchReader;
pub use error::DispatcherError;
pub use joblog::JobLog;
