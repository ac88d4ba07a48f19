use async_trait::async_trait;

use crate::{models::QueueMessage, QueueResult};

/// 消息下发边界：把已分配的消息交给指定Worker的处理入口
///
/// 语义为至少一次投递。调度器不等待Worker确认收到，
/// 完成确认由Worker稍后通过完成回调异步驱动。
#[async_trait]
pub trait WorkerDispatcher: Send + Sync {
    async fn dispatch(&self, worker_id: &str, message: &QueueMessage) -> QueueResult<()>;
}
