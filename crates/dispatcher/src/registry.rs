use std::collections::{BTreeSet, HashMap};

use tracing::info;

use cmqueue_core::{BacklogLimit, QueueError, QueueResult, WorkerInfo};

/// Worker注册表：跟踪权重、在途任务量与积压上限
///
/// 与台账一样运行在单写者约束下。每个Worker额外记录在途消息的
/// 序列号集合，离开时交还给调用方重新排队。
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: HashMap<String, WorkerInfo>,
    in_flight: HashMap<String, BTreeSet<u64>>,
    /// 历史完成统计，承接台账清理后的计数口径
    completed_count: u64,
    completed_bytes: u64,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册新Worker
    pub fn join(&mut self, id: &str, weight: u32, backlog_limit: BacklogLimit) -> QueueResult<()> {
        if weight == 0 {
            return Err(QueueError::InvalidWeight { weight });
        }
        Self::validate_limit(backlog_limit)?;
        if self.workers.contains_key(id) {
            return Err(QueueError::duplicate_worker(id));
        }
        info!(worker_id = id, weight, "Worker加入队列");
        self.workers
            .insert(id.to_string(), WorkerInfo::new(id, weight, backlog_limit));
        self.in_flight.insert(id.to_string(), BTreeSet::new());
        Ok(())
    }

    /// 注销Worker，返回其全部在途消息序列号（由调用方重新排队）
    pub fn leave(&mut self, id: &str) -> QueueResult<BTreeSet<u64>> {
        if self.workers.remove(id).is_none() {
            return Err(QueueError::unknown_worker(id));
        }
        let orphaned = self.in_flight.remove(id).unwrap_or_default();
        info!(worker_id = id, orphaned = orphaned.len(), "Worker离开队列");
        Ok(orphaned)
    }

    /// 登记一次分配
    pub fn record_assignment(
        &mut self,
        id: &str,
        sequence_id: u64,
        size_bytes: u64,
    ) -> QueueResult<()> {
        let worker = self
            .workers
            .get_mut(id)
            .ok_or_else(|| QueueError::unknown_worker(id))?;
        worker.current_task_count += 1;
        worker.current_backlog_bytes += size_bytes;
        self.in_flight
            .entry(id.to_string())
            .or_default()
            .insert(sequence_id);
        Ok(())
    }

    /// 登记一次完成，计数回落；回落到负数说明状态已被破坏
    pub fn record_completion(
        &mut self,
        id: &str,
        sequence_id: u64,
        size_bytes: u64,
    ) -> QueueResult<()> {
        let worker = self
            .workers
            .get_mut(id)
            .ok_or_else(|| QueueError::unknown_worker(id))?;
        if worker.current_task_count == 0 || worker.current_backlog_bytes < size_bytes {
            return Err(QueueError::negative_backlog(id));
        }
        worker.current_task_count -= 1;
        worker.current_backlog_bytes -= size_bytes;
        if let Some(in_flight) = self.in_flight.get_mut(id) {
            in_flight.remove(&sequence_id);
        }
        self.completed_count += 1;
        self.completed_bytes += size_bytes;
        Ok(())
    }

    /// 调整Worker权重
    pub fn set_weight(&mut self, id: &str, weight: u32) -> QueueResult<()> {
        if weight == 0 {
            return Err(QueueError::InvalidWeight { weight });
        }
        let worker = self
            .workers
            .get_mut(id)
            .ok_or_else(|| QueueError::unknown_worker(id))?;
        worker.weight = weight;
        Ok(())
    }

    /// 调整Worker积压上限
    pub fn set_backlog_limit(&mut self, id: &str, limit: BacklogLimit) -> QueueResult<()> {
        Self::validate_limit(limit)?;
        let worker = self
            .workers
            .get_mut(id)
            .ok_or_else(|| QueueError::unknown_worker(id))?;
        worker.backlog_limit = limit;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&WorkerInfo> {
        self.workers.get(id)
    }

    /// 全部Worker的快照，供选择策略使用
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.workers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// 历史完成统计 (条数, 字节)
    pub fn completed_stats(&self) -> (u64, u64) {
        (self.completed_count, self.completed_bytes)
    }

    fn validate_limit(limit: BacklogLimit) -> QueueResult<()> {
        let valid = match limit {
            BacklogLimit::ByMessages(value) => value > 0,
            BacklogLimit::ByBytes(value) => value > 0,
        };
        if valid {
            Ok(())
        } else {
            Err(QueueError::invalid_argument("积压上限必须大于0"))
        }
    }
}
