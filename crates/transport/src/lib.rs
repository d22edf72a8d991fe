pub mod coordinator;
pub mod framing;
pub mod worker;

pub use coordinator::CoordinatorTransport;
pub use framing::Tag;
pub use worker::{Delivery, WorkerTransport};
