use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 调度租约：同一时刻全系统最多一个有效持有者
///
/// 持有者独占调度决策权，其余进程只是台账与注册表状态的旁观者。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerLease {
    pub holder_id: String,
    /// 防护纪元，每次成功接管时递增，用于比较并交换仲裁
    pub epoch: u64,
    pub last_heartbeat: DateTime<Utc>,
    /// 超过该时刻仍未刷新，租约即失效并开放接管
    pub activation_deadline: DateTime<Utc>,
}

impl SchedulerLease {
    pub fn new(holder_id: &str, epoch: u64, now: DateTime<Utc>, activation: Duration) -> Self {
        Self {
            holder_id: holder_id.to_string(),
            epoch,
            last_heartbeat: now,
            activation_deadline: now + activation,
        }
    }

    /// 租约是否已失效
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.activation_deadline
    }

    /// 刷新心跳并顺延激活期限
    pub fn refresh(&mut self, now: DateTime<Utc>, activation: Duration) {
        self.last_heartbeat = now;
        self.activation_deadline = now + activation;
    }
}
