use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::{models::SchedulerLease, QueueResult};

/// 调度租约存储，唯一的接管仲裁点
///
/// 所有写操作都是比较并交换：只有观察到的持有者与纪元仍与存储中
/// 一致时才会生效，保证并发竞争下最多一个进程接管成功。
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// 读取当前租约
    async fn current(&self) -> QueueResult<Option<SchedulerLease>>;

    /// 尝试接管租约
    ///
    /// 仅当存储中没有租约（observed_epoch为0），或存储中的租约已失效
    /// 且纪元仍为 observed_epoch 时成功；成功时返回纪元加一的新租约。
    async fn try_claim(
        &self,
        holder_id: &str,
        observed_epoch: u64,
        now: DateTime<Utc>,
        activation: Duration,
    ) -> QueueResult<Option<SchedulerLease>>;

    /// 刷新心跳；持有者或纪元不再匹配时返回false
    async fn refresh(
        &self,
        holder_id: &str,
        epoch: u64,
        now: DateTime<Utc>,
        activation: Duration,
    ) -> QueueResult<bool>;

    /// 主动释放租约；仅当前持有者可释放，纪元保持单调
    async fn release(&self, holder_id: &str, epoch: u64) -> QueueResult<bool>;
}
