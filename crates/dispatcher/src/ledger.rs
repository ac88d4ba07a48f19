use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use cmqueue_core::{QueueError, QueueMessage, QueueResult};

/// 消息台账：以到达序列号为键的仅追加记录
///
/// 单写者约束由上层协调器的状态锁保证，台账本身不做并发控制。
/// BTreeMap的有序遍历天然给出"最旧优先"的未分配快照。
#[derive(Debug, Default)]
pub struct MessageLedger {
    entries: BTreeMap<u64, QueueMessage>,
}

impl MessageLedger {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// 记录一条新到达的消息
    pub fn record(&mut self, message: QueueMessage) -> QueueResult<()> {
        if self.entries.contains_key(&message.sequence_id) {
            return Err(QueueError::duplicate_sequence(message.sequence_id));
        }
        debug!(
            sequence_id = message.sequence_id,
            size_bytes = message.size_bytes,
            "记录新到达消息"
        );
        self.entries.insert(message.sequence_id, message);
        Ok(())
    }

    /// UNASSIGNED -> ASSIGNED
    pub fn mark_assigned(&mut self, sequence_id: u64, worker_id: &str) -> QueueResult<()> {
        let entry = self
            .entries
            .get_mut(&sequence_id)
            .ok_or_else(|| QueueError::unknown_message(sequence_id))?;
        entry.assign(worker_id)
    }

    /// ASSIGNED -> COMPLETED，返回原持有Worker与消息字节数
    pub fn mark_completed(
        &mut self,
        sequence_id: u64,
        completed_at: DateTime<Utc>,
    ) -> QueueResult<(String, u64)> {
        let entry = self
            .entries
            .get_mut(&sequence_id)
            .ok_or_else(|| QueueError::unknown_message(sequence_id))?;
        let worker_id = entry.complete(completed_at)?;
        Ok((worker_id, entry.size_bytes))
    }

    /// Worker退出时在途消息回到未分配状态，返回原持有Worker
    pub fn requeue(&mut self, sequence_id: u64) -> QueueResult<String> {
        let entry = self
            .entries
            .get_mut(&sequence_id)
            .ok_or_else(|| QueueError::unknown_message(sequence_id))?;
        entry.requeue()
    }

    /// 清除完成时间早于cutoff的已完成记录，在途消息不受影响
    pub fn purge_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, message| match message.completed_at() {
            Some(completed_at) => completed_at >= cutoff,
            None => true,
        });
        before - self.entries.len()
    }

    /// 未分配消息的有序快照（按序列号升序，最旧优先）
    ///
    /// 惰性迭代器，调用方在锁内按需收集。
    pub fn unassigned_snapshot(&self) -> impl Iterator<Item = &QueueMessage> {
        self.entries.values().filter(|message| message.is_unassigned())
    }

    pub fn get(&self, sequence_id: u64) -> Option<&QueueMessage> {
        self.entries.get(&sequence_id)
    }

    pub fn unassigned_count(&self) -> usize {
        self.unassigned_snapshot().count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
