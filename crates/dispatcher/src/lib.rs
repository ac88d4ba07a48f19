//! 分布式确认消息队列的协调核心
//!
//! 接收传输层投递的消息，在带权重的Worker池中公平分配，
//! 执行积压准入控制，并通过心跳/激活租约在进程间接管调度权。
//! 传输层本身（会话建立、重连、消息体编码）是外部协作者。

pub mod coordinator;
pub mod failover;
pub mod ledger;
pub mod lease_store;
pub mod metrics_collector;
pub mod registry;
pub mod scheduler;
pub mod strategies;


pub use coordinator::DistributedQueue;
pub use failover::{FailoverConfig, FailoverSupervisor, LeaseState};
pub use ledger::MessageLedger;
pub use lease_store::InMemoryLeaseStore;
pub use metrics_collector::QueueMetrics;
pub use registry::WorkerRegistry;
pub use strategies::WeightedShareStrategy;
