use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error};

use cmqueue_core::{QueueMessage, QueueResult, WorkerDispatcher, WorkerSelectionStrategy};

use crate::coordinator::QueueState;
use crate::metrics_collector::QueueMetrics;

/// 一轮分配：拉取未分配快照，为每条消息选择Worker并提交分配
///
/// 只由当前租约持有者执行。选择与簿记在状态写锁内完成，下发在
/// 释放锁之后进行；调度器视角下发即忘，不等待Worker应答。
pub struct AssignmentPass {
    state: Arc<RwLock<QueueState>>,
    strategy: Arc<dyn WorkerSelectionStrategy>,
    dispatcher: Arc<dyn WorkerDispatcher>,
    metrics: Arc<QueueMetrics>,
}

impl AssignmentPass {
    pub(crate) fn new(
        state: Arc<RwLock<QueueState>>,
        strategy: Arc<dyn WorkerSelectionStrategy>,
        dispatcher: Arc<dyn WorkerDispatcher>,
        metrics: Arc<QueueMetrics>,
    ) -> Self {
        Self {
            state,
            strategy,
            dispatcher,
            metrics,
        }
    }

    /// 执行一轮分配，返回本轮成功分配的消息数
    pub async fn run_pass(&self) -> QueueResult<usize> {
        let mut outbound: Vec<(String, QueueMessage)> = Vec::new();
        let mut deferred: usize = 0;

        {
            let mut state = self.state.write().await;
            // 最旧优先遍历本轮的未分配消息
            let candidates: Vec<u64> = state
                .ledger
                .unassigned_snapshot()
                .map(|message| message.sequence_id)
                .collect();

            for sequence_id in candidates {
                let message = match state.ledger.get(sequence_id) {
                    Some(message) if message.is_unassigned() => message.clone(),
                    _ => continue,
                };

                let workers = state.registry.workers();
                let selected = self.strategy.select_worker(&message, &workers).await?;
                let Some(worker_id) = selected else {
                    // 无准入Worker：消息保持未分配，等待下次触发重试
                    deferred += 1;
                    continue;
                };

                state.ledger.mark_assigned(sequence_id, &worker_id)?;
                state
                    .registry
                    .record_assignment(&worker_id, sequence_id, message.size_bytes)?;
                if let Some(assigned) = state.ledger.get(sequence_id) {
                    outbound.push((worker_id, assigned.clone()));
                }
            }

            self.metrics
                .set_unassigned_depth(state.ledger.unassigned_count() as f64);
        }

        if deferred > 0 {
            self.metrics.record_deferred(deferred as u64);
            debug!(deferred, "部分消息因积压上限暂缓分配");
        }

        for (worker_id, message) in &outbound {
            self.metrics.record_assignment();
            if let Err(e) = self.dispatcher.dispatch(worker_id, message).await {
                // 至少一次语义：下发失败不回滚簿记，由Worker确认或离开时重排收敛
                error!(
                    worker_id = %worker_id,
                    sequence_id = message.sequence_id,
                    error = %e,
                    "消息下发失败"
                );
            }
        }

        if !outbound.is_empty() {
            debug!(assigned = outbound.len(), "本轮分配完成");
        }
        Ok(outbound.len())
    }
}
