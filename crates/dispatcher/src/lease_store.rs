use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use cmqueue_core::{LeaseStore, QueueResult, SchedulerLease};

/// 内存租约存储
///
/// 单进程/嵌入式部署与测试用的权威仲裁点，语义与共享存储一致：
/// 所有写入都是基于（持有者，纪元）的比较并交换。释放不清空记录，
/// 而是把激活期限置为过去，保持纪元单调递增。
#[derive(Debug, Default)]
pub struct InMemoryLeaseStore {
    lease: Mutex<Option<SchedulerLease>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn current(&self) -> QueueResult<Option<SchedulerLease>> {
        Ok(self.lease.lock().await.clone())
    }

    async fn try_claim(
        &self,
        holder_id: &str,
        observed_epoch: u64,
        now: DateTime<Utc>,
        activation: Duration,
    ) -> QueueResult<Option<SchedulerLease>> {
        let mut guard = self.lease.lock().await;

        let claimable = match guard.as_ref() {
            None => observed_epoch == 0,
            Some(lease) => lease.epoch == observed_epoch && lease.is_expired(now),
        };
        if !claimable {
            debug!(holder_id, observed_epoch, "租约接管失败，已被其他进程抢先");
            return Ok(None);
        }

        let epoch = guard.as_ref().map(|lease| lease.epoch).unwrap_or(0) + 1;
        let lease = SchedulerLease::new(holder_id, epoch, now, activation);
        *guard = Some(lease.clone());
        Ok(Some(lease))
    }

    async fn refresh(
        &self,
        holder_id: &str,
        epoch: u64,
        now: DateTime<Utc>,
        activation: Duration,
    ) -> QueueResult<bool> {
        let mut guard = self.lease.lock().await;
        match guard.as_mut() {
            Some(lease) if lease.holder_id == holder_id && lease.epoch == epoch => {
                lease.refresh(now, activation);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(&self, holder_id: &str, epoch: u64) -> QueueResult<bool> {
        let mut guard = self.lease.lock().await;
        match guard.as_mut() {
            Some(lease) if lease.holder_id == holder_id && lease.epoch == epoch => {
                lease.activation_deadline = DateTime::<Utc>::MIN_UTC;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
