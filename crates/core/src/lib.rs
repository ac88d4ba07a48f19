pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::{ConfigLoader, CoordinatorConfig};
pub use errors::{QueueError, QueueResult};
pub use models::{BacklogLimit, MessageState, QueueMessage, SchedulerLease, WorkerInfo};
pub use traits::{LeaseStore, WorkerDispatcher, WorkerSelectionStrategy};
