mod loader;

pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};

/// 默认Worker权重
pub const DEFAULT_WORKER_WEIGHT: u32 = 1;

/// 默认Worker积压上限（按消息条数）
pub const DEFAULT_WORKER_TASKS: u32 = 1;

/// 默认调度者心跳间隔（秒）
pub const DEFAULT_SCHEDULER_HEARTBEAT_SECONDS: f64 = 1.0;

/// 默认激活间隔（秒）
pub const DEFAULT_SCHEDULER_ACTIVATION_SECONDS: f64 = 3.5;

/// 默认已完成记录保留时长（秒），0表示不保留
pub const DEFAULT_COMPLETE_TIME_SECONDS: f64 = 0.0;

/// 队列协调器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// 队列（确认消息通道）名称
    #[serde(default = "default_queue_name")]
    pub queue_name: String,
    /// 新Worker的默认权重
    #[serde(default = "default_worker_weight")]
    pub worker_weight: u32,
    /// 新Worker的默认积压上限（按消息条数）
    #[serde(default = "default_worker_tasks")]
    pub worker_tasks: u32,
    /// 调度者心跳间隔（秒）
    #[serde(default = "default_heartbeat_seconds")]
    pub scheduler_heartbeat_seconds: f64,
    /// 激活间隔（秒）：租约超过该时长未刷新即视为失效，可被接管
    #[serde(default = "default_activation_seconds")]
    pub scheduler_activation_seconds: f64,
    /// 已完成记录的保留时长（秒），0表示下个清理周期即丢弃
    #[serde(default = "default_complete_time_seconds")]
    pub complete_time_seconds: f64,
}

fn default_queue_name() -> String {
    "cmqueue".to_string()
}

fn default_worker_weight() -> u32 {
    DEFAULT_WORKER_WEIGHT
}

fn default_worker_tasks() -> u32 {
    DEFAULT_WORKER_TASKS
}

fn default_heartbeat_seconds() -> f64 {
    DEFAULT_SCHEDULER_HEARTBEAT_SECONDS
}

fn default_activation_seconds() -> f64 {
    DEFAULT_SCHEDULER_ACTIVATION_SECONDS
}

fn default_complete_time_seconds() -> f64 {
    DEFAULT_COMPLETE_TIME_SECONDS
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            queue_name: default_queue_name(),
            worker_weight: default_worker_weight(),
            worker_tasks: default_worker_tasks(),
            scheduler_heartbeat_seconds: default_heartbeat_seconds(),
            scheduler_activation_seconds: default_activation_seconds(),
            complete_time_seconds: default_complete_time_seconds(),
        }
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_name.is_empty() {
            return Err(anyhow::anyhow!("队列名称不能为空"));
        }

        if self.worker_weight == 0 {
            return Err(anyhow::anyhow!("Worker权重必须大于0"));
        }

        if self.worker_tasks == 0 {
            return Err(anyhow::anyhow!("Worker积压上限必须大于0"));
        }

        if self.scheduler_heartbeat_seconds <= 0.0 {
            return Err(anyhow::anyhow!("心跳间隔必须大于0"));
        }

        if self.scheduler_activation_seconds <= 0.0 {
            return Err(anyhow::anyhow!("激活间隔必须大于0"));
        }

        if self.scheduler_heartbeat_seconds >= self.scheduler_activation_seconds {
            return Err(anyhow::anyhow!(
                "心跳间隔 {} 必须小于激活间隔 {}",
                self.scheduler_heartbeat_seconds,
                self.scheduler_activation_seconds
            ));
        }

        if self.complete_time_seconds < 0.0 {
            return Err(anyhow::anyhow!("已完成记录保留时长不能为负"));
        }

        Ok(())
    }

    /// 心跳间隔
    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.scheduler_heartbeat_seconds)
    }

    /// 激活间隔，同时作为租约操作的超时上限
    pub fn activation_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.scheduler_activation_seconds)
    }

    /// 已完成记录的保留时长
    pub fn completion_retention(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.complete_time_seconds * 1000.0) as i64)
    }
}
