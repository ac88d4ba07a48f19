//! 队列协调器运行指标
//!
//! 积压准入造成的暂缓分配只通过这里对外暴露，不作为错误上抛。

use metrics::{counter, gauge, Counter, Gauge};

pub struct QueueMetrics {
    messages_recorded_total: Counter,
    assignments_total: Counter,
    assignments_deferred_total: Counter,
    completions_total: Counter,
    requeued_total: Counter,
    purged_total: Counter,
    unassigned_depth: Gauge,
    active_workers: Gauge,
}

impl QueueMetrics {
    pub fn new() -> Self {
        Self {
            messages_recorded_total: counter!("cmqueue_messages_recorded_total"),
            assignments_total: counter!("cmqueue_assignments_total"),
            assignments_deferred_total: counter!("cmqueue_assignments_deferred_total"),
            completions_total: counter!("cmqueue_completions_total"),
            requeued_total: counter!("cmqueue_requeued_total"),
            purged_total: counter!("cmqueue_purged_total"),
            unassigned_depth: gauge!("cmqueue_unassigned_depth"),
            active_workers: gauge!("cmqueue_active_workers"),
        }
    }

    pub fn record_message(&self) {
        self.messages_recorded_total.increment(1);
    }

    pub fn record_assignment(&self) {
        self.assignments_total.increment(1);
    }

    /// 因积压上限暂缓的分配次数
    pub fn record_deferred(&self, count: u64) {
        self.assignments_deferred_total.increment(count);
    }

    pub fn record_completion(&self) {
        self.completions_total.increment(1);
    }

    pub fn record_requeued(&self, count: u64) {
        self.requeued_total.increment(count);
    }

    pub fn record_purged(&self, count: u64) {
        self.purged_total.increment(count);
    }

    pub fn set_unassigned_depth(&self, depth: f64) {
        self.unassigned_depth.set(depth);
    }

    pub fn set_active_workers(&self, count: f64) {
        self.active_workers.set(count);
    }
}

impl Default for QueueMetrics {
    fn default() -> Self {
        Self::new()
    }
}
