use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 积压上限类型：按在途消息条数或按在途字节总量
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value")]
pub enum BacklogLimit {
    #[serde(rename = "BY_MESSAGES")]
    ByMessages(u32),
    #[serde(rename = "BY_BYTES")]
    ByBytes(u64),
}

/// Worker节点信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub id: String,
    /// 相对权重，决定该Worker在并发分配中的份额
    pub weight: u32,
    pub current_task_count: u32,
    pub current_backlog_bytes: u64,
    pub backlog_limit: BacklogLimit,
    pub joined_at: DateTime<Utc>,
}

impl WorkerInfo {
    /// 创建新的Worker信息
    pub fn new(id: &str, weight: u32, backlog_limit: BacklogLimit) -> Self {
        Self {
            id: id.to_string(),
            weight,
            current_task_count: 0,
            current_backlog_bytes: 0,
            backlog_limit,
            joined_at: Utc::now(),
        }
    }

    /// 积压准入判断：是否还能接收一条 pending_size_bytes 大小的消息
    pub fn can_accept(&self, pending_size_bytes: u64) -> bool {
        match self.backlog_limit {
            BacklogLimit::ByMessages(limit) => self.current_task_count < limit,
            BacklogLimit::ByBytes(limit) => {
                self.current_backlog_bytes + pending_size_bytes <= limit
            }
        }
    }

    /// 在途任务数与权重之比，调度时在准入Worker中取最小者
    pub fn load_ratio(&self) -> f64 {
        self.current_task_count as f64 / self.weight as f64
    }
}
