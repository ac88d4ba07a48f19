pub mod lease;
pub mod message;
pub mod worker;

pub use lease::SchedulerLease;
pub use message::{MessageState, QueueMessage};
pub use worker::{BacklogLimit, WorkerInfo};
