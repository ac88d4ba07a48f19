use async_trait::async_trait;
use tracing::debug;

use cmqueue_core::{QueueMessage, QueueResult, WorkerInfo, WorkerSelectionStrategy};

/// 权重份额策略 - 在通过积压准入的Worker中选择 在途任务数/权重 比值最低者
///
/// 权重越高的Worker在比值上升前可以承接越多并发任务，长期分配
/// 比例近似收敛到权重之比，同时权重低的Worker不会被饿死。
/// 比值相同时取ID最小者，保证决策确定性。
pub struct WeightedShareStrategy;

impl WeightedShareStrategy {
    /// 创建新的权重份额策略
    pub fn new() -> Self {
        Self
    }
}

impl Default for WeightedShareStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerSelectionStrategy for WeightedShareStrategy {
    async fn select_worker(
        &self,
        message: &QueueMessage,
        candidates: &[WorkerInfo],
    ) -> QueueResult<Option<String>> {
        if candidates.is_empty() {
            debug!("没有已注册的Worker节点");
            return Ok(None);
        }

        // 积压准入过滤
        let eligible: Vec<&WorkerInfo> = candidates
            .iter()
            .filter(|worker| worker.can_accept(message.size_bytes))
            .collect();

        if eligible.is_empty() {
            debug!(
                sequence_id = message.sequence_id,
                "所有Worker均已达到积压上限，消息暂缓分配"
            );
            return Ok(None);
        }

        let selected = eligible
            .iter()
            .min_by(|a, b| {
                a.load_ratio()
                    .partial_cmp(&b.load_ratio())
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .unwrap();

        debug!(
            sequence_id = message.sequence_id,
            worker_id = %selected.id,
            ratio = selected.load_ratio(),
            "权重份额策略选择Worker"
        );

        Ok(Some(selected.id.clone()))
    }

    fn name(&self) -> &str {
        "WeightedShare"
    }
}
