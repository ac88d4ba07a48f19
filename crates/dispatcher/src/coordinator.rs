use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cmqueue_core::{
    BacklogLimit, CoordinatorConfig, LeaseStore, QueueError, QueueMessage, QueueResult,
    WorkerDispatcher, WorkerInfo, WorkerSelectionStrategy,
};

use crate::failover::{FailoverConfig, FailoverSupervisor, LeaseState};
use crate::ledger::MessageLedger;
use crate::metrics_collector::QueueMetrics;
use crate::registry::WorkerRegistry;
use crate::scheduler::AssignmentPass;

/// 台账与注册表合并为单一受锁状态，跨结构的状态转换保持原子
#[derive(Debug, Default)]
pub(crate) struct QueueState {
    pub ledger: MessageLedger,
    pub registry: WorkerRegistry,
}

/// 分布式确认消息队列实例
///
/// 显式的实例对象承载完整生命周期：start()启动监督、调度与清理
/// 任务，shutdown()发出关闭信号并在有限宽限期内让出调度权。
/// 协调器状态全部在内存中，重启后由传输层重放未确认消息重建。
pub struct DistributedQueue {
    config: CoordinatorConfig,
    node_id: String,
    state: Arc<RwLock<QueueState>>,
    supervisor: Arc<FailoverSupervisor>,
    lease_store: Arc<dyn LeaseStore>,
    scheduler: Arc<AssignmentPass>,
    metrics: Arc<QueueMetrics>,
    schedule_tx: mpsc::UnboundedSender<()>,
    retention: Arc<RwLock<ChronoDuration>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl DistributedQueue {
    /// 创建并启动队列实例
    pub async fn start(
        config: CoordinatorConfig,
        strategy: Arc<dyn WorkerSelectionStrategy>,
        dispatcher: Arc<dyn WorkerDispatcher>,
        lease_store: Arc<dyn LeaseStore>,
    ) -> QueueResult<Arc<Self>> {
        config
            .validate()
            .map_err(|e| QueueError::invalid_argument(e.to_string()))?;

        let node_id = format!("{}-{}", config.queue_name, Uuid::new_v4());
        let state = Arc::new(RwLock::new(QueueState::default()));
        let metrics = Arc::new(QueueMetrics::new());
        let scheduler = Arc::new(AssignmentPass::new(
            state.clone(),
            strategy,
            dispatcher,
            metrics.clone(),
        ));
        let supervisor = Arc::new(FailoverSupervisor::new(
            node_id.clone(),
            lease_store.clone(),
            FailoverConfig::from_coordinator(&config),
        ));
        let (schedule_tx, schedule_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(16);
        let retention = Arc::new(RwLock::new(config.completion_retention()));

        let queue = Arc::new(Self {
            config,
            node_id,
            state,
            supervisor,
            lease_store,
            scheduler,
            metrics,
            schedule_tx,
            retention,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        });

        queue.spawn_background_tasks(schedule_rx).await;
        info!(
            node_id = %queue.node_id,
            queue_name = %queue.config.queue_name,
            "分布式队列实例已启动"
        );
        Ok(queue)
    }

    async fn spawn_background_tasks(self: &Arc<Self>, mut schedule_rx: mpsc::UnboundedReceiver<()>) {
        let supervisor_task = self.supervisor.clone().spawn(self.shutdown_tx.subscribe());

        // 调度任务：触发通道的唯一消费者，保证分配轮次不会交错
        let scheduler = self.scheduler.clone();
        let mut lease_rx = self.supervisor.state();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let schedule_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    trigger = schedule_rx.recv() => {
                        if trigger.is_none() {
                            break;
                        }
                        if *lease_rx.borrow() == LeaseState::Active {
                            if let Err(e) = scheduler.run_pass().await {
                                error!(error = %e, "调度执行失败");
                            }
                        } else {
                            debug!("当前进程不持有调度权，忽略调度触发");
                        }
                    }
                    changed = lease_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        // 接管调度权后立刻分配积压的消息（含前任遗留的孤儿工作）
                        if *lease_rx.borrow() == LeaseState::Active {
                            info!("取得调度权，立即执行一轮分配");
                            if let Err(e) = scheduler.run_pass().await {
                                error!(error = %e, "调度执行失败");
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        // 清理任务：按心跳间隔清除超过保留时长的已完成记录
        let state = self.state.clone();
        let retention = self.retention.clone();
        let metrics = self.metrics.clone();
        let purge_interval = self.config.heartbeat_interval();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let purge_task = tokio::spawn(async move {
            let mut ticker = interval(purge_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cutoff = Utc::now() - *retention.read().await;
                        let purged = state.write().await.ledger.purge_older_than(cutoff);
                        if purged > 0 {
                            debug!(purged, "清理过期的已完成记录");
                            metrics.record_purged(purged as u64);
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        let mut tasks = self.tasks.lock().await;
        tasks.push(supervisor_task);
        tasks.push(schedule_task);
        tasks.push(purge_task);
    }

    /// 传输层回调：新消息到达
    ///
    /// 返回前同步完成台账记录，随后触发一轮调度。容量不足不是
    /// 错误，消息会留在未分配状态等待下次触发。
    pub async fn on_message_arrived(&self, sequence_id: u64, size_bytes: u64) -> QueueResult<()> {
        let message = QueueMessage::new(sequence_id, size_bytes, Utc::now());
        {
            let mut state = self.state.write().await;
            state.ledger.record(message)?;
            self.metrics
                .set_unassigned_depth(state.ledger.unassigned_count() as f64);
        }
        self.metrics.record_message();
        self.trigger_schedule();
        Ok(())
    }

    /// Worker完成确认回调
    pub async fn on_worker_complete(
        &self,
        worker_id: &str,
        sequence_id: u64,
        completed_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        {
            let mut state = self.state.write().await;
            // 消息必须正分配给该Worker，迟到的确认在这里被拒绝
            match state.ledger.get(sequence_id) {
                None => return Err(QueueError::unknown_message(sequence_id)),
                Some(message) if message.assigned_worker() != Some(worker_id) => {
                    return Err(QueueError::invalid_transition(
                        sequence_id,
                        message.state.name(),
                    ));
                }
                Some(_) => {}
            }
            let (assigned_worker, size_bytes) =
                state.ledger.mark_completed(sequence_id, completed_at)?;
            state
                .registry
                .record_completion(&assigned_worker, sequence_id, size_bytes)?;
        }
        self.metrics.record_completion();
        self.trigger_schedule();
        Ok(())
    }

    /// Worker加入队列
    pub async fn join_worker(
        &self,
        worker_id: &str,
        weight: u32,
        backlog_limit: BacklogLimit,
    ) -> QueueResult<()> {
        {
            let mut state = self.state.write().await;
            state.registry.join(worker_id, weight, backlog_limit)?;
            self.metrics.set_active_workers(state.registry.len() as f64);
        }
        self.trigger_schedule();
        Ok(())
    }

    /// 以配置中的默认权重与积压上限加入Worker
    pub async fn join_worker_with_defaults(&self, worker_id: &str) -> QueueResult<()> {
        self.join_worker(
            worker_id,
            self.config.worker_weight,
            BacklogLimit::ByMessages(self.config.worker_tasks),
        )
        .await
    }

    /// Worker离开队列，在途消息全部回到未分配状态重新参与调度
    pub async fn leave_worker(&self, worker_id: &str) -> QueueResult<()> {
        let orphaned = {
            let mut state = self.state.write().await;
            let orphaned = state.registry.leave(worker_id)?;
            for &sequence_id in &orphaned {
                if let Err(e) = state.ledger.requeue(sequence_id) {
                    // 完成确认与离开并发时，记录可能已不在途
                    debug!(sequence_id, error = %e, "离开重排时跳过消息");
                }
            }
            self.metrics.set_active_workers(state.registry.len() as f64);
            self.metrics
                .set_unassigned_depth(state.ledger.unassigned_count() as f64);
            orphaned
        };

        if !orphaned.is_empty() {
            self.metrics.record_requeued(orphaned.len() as u64);
            warn!(
                worker_id,
                requeued = orphaned.len(),
                "Worker离开，其在途消息重新排队"
            );
        }
        self.trigger_schedule();
        Ok(())
    }

    /// 调整Worker权重
    pub async fn set_worker_weight(&self, worker_id: &str, weight: u32) -> QueueResult<()> {
        self.state
            .write()
            .await
            .registry
            .set_weight(worker_id, weight)?;
        self.trigger_schedule();
        Ok(())
    }

    /// 调整Worker积压上限
    pub async fn set_backlog_limit(
        &self,
        worker_id: &str,
        limit: BacklogLimit,
    ) -> QueueResult<()> {
        self.state
            .write()
            .await
            .registry
            .set_backlog_limit(worker_id, limit)?;
        self.trigger_schedule();
        Ok(())
    }

    /// 调整已完成记录的保留时长
    pub async fn set_completion_retention(&self, retention: std::time::Duration) -> QueueResult<()> {
        *self.retention.write().await = ChronoDuration::milliseconds(retention.as_millis() as i64);
        Ok(())
    }

    /// 当前已完成记录的保留时长
    pub async fn completion_retention(&self) -> std::time::Duration {
        self.retention
            .read()
            .await
            .to_std()
            .unwrap_or_default()
    }

    /// 当前未分配消息数
    pub async fn unassigned_message_count(&self) -> usize {
        self.state.read().await.ledger.unassigned_count()
    }

    pub async fn worker_weight(&self, worker_id: &str) -> QueueResult<u32> {
        self.state
            .read()
            .await
            .registry
            .get(worker_id)
            .map(|worker| worker.weight)
            .ok_or_else(|| QueueError::unknown_worker(worker_id))
    }

    pub async fn worker_task_count(&self, worker_id: &str) -> QueueResult<u32> {
        self.state
            .read()
            .await
            .registry
            .get(worker_id)
            .map(|worker| worker.current_task_count)
            .ok_or_else(|| QueueError::unknown_worker(worker_id))
    }

    /// 全部Worker的快照
    pub async fn workers(&self) -> Vec<WorkerInfo> {
        self.state.read().await.registry.workers()
    }

    /// 当前调度租约的持有者（租约过期视为无持有者）
    pub async fn current_scheduler_holder(&self) -> QueueResult<Option<String>> {
        let lease = self.lease_store.current().await?;
        Ok(lease
            .filter(|lease| !lease.is_expired(Utc::now()))
            .map(|lease| lease.holder_id))
    }

    /// 本进程的租约状态
    pub fn lease_state(&self) -> LeaseState {
        self.supervisor.current_state()
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    fn trigger_schedule(&self) {
        // 发送失败只意味着调度任务已随关闭退出
        let _ = self.schedule_tx.send(());
    }

    /// 关闭队列实例：广播关闭信号，让出调度权，有限等待后台任务退出
    pub async fn shutdown(&self) {
        info!(node_id = %self.node_id, "关闭分布式队列实例");
        let _ = self.shutdown_tx.send(());

        let grace = self.config.heartbeat_interval();
        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            if timeout(grace, task).await.is_err() {
                warn!(node_id = %self.node_id, "后台任务未在宽限期内退出");
            }
        }
    }
}
