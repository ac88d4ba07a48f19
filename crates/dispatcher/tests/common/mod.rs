#![allow(dead_code)]

use async_trait::async_trait;
use tokio::sync::Mutex;

use cmqueue_core::{CoordinatorConfig, QueueMessage, QueueResult, WorkerDispatcher};

/// 记录所有下发调用的测试替身，代替真实的Worker处理入口
pub struct RecordingDispatcher {
    dispatched: Mutex<Vec<(String, u64)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self {
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub async fn dispatched(&self) -> Vec<(String, u64)> {
        self.dispatched.lock().await.clone()
    }

    pub async fn total(&self) -> usize {
        self.dispatched.lock().await.len()
    }

    pub async fn count_for(&self, worker_id: &str) -> usize {
        self.dispatched
            .lock()
            .await
            .iter()
            .filter(|(id, _)| id == worker_id)
            .count()
    }
}

#[async_trait]
impl WorkerDispatcher for RecordingDispatcher {
    async fn dispatch(&self, worker_id: &str, message: &QueueMessage) -> QueueResult<()> {
        self.dispatched
            .lock()
            .await
            .push((worker_id.to_string(), message.sequence_id));
        Ok(())
    }
}

/// 缩短心跳/激活间隔，让接管与调度在测试里快速收敛
pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        queue_name: "test-queue".to_string(),
        scheduler_heartbeat_seconds: 0.05,
        scheduler_activation_seconds: 0.25,
        complete_time_seconds: 300.0,
        ..CoordinatorConfig::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
