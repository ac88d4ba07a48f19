use async_trait::async_trait;

use crate::{
    models::{QueueMessage, WorkerInfo},
    QueueResult,
};

/// Worker选择策略接口
#[async_trait]
pub trait WorkerSelectionStrategy: Send + Sync {
    /// 为一条待分配消息选择Worker，无合适者时返回None
    async fn select_worker(
        &self,
        message: &QueueMessage,
        candidates: &[WorkerInfo],
    ) -> QueueResult<Option<String>>;

    /// 获取策略名称
    fn name(&self) -> &str;
}
