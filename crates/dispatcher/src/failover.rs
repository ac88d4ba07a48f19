use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout};
use tracing::{debug, info, warn};

use cmqueue_core::{CoordinatorConfig, LeaseStore};

/// 租约状态机
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    /// 未持有租约，观察中
    Idle,
    /// 观察到租约失效，正在尝试接管
    Candidate,
    /// 持有租约，拥有调度权
    Active,
}

/// 故障接管配置
#[derive(Debug, Clone)]
pub struct FailoverConfig {
    /// 心跳间隔
    pub heartbeat_interval: std::time::Duration,
    /// 激活间隔：租约超过该时长未刷新即视为失效，同时作为租约操作的超时上限
    pub activation_interval: std::time::Duration,
    /// 连续刷新失败多少次后主动让出调度权
    pub max_refresh_failures: u32,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self::from_coordinator(&CoordinatorConfig::default())
    }
}

impl FailoverConfig {
    pub fn from_coordinator(config: &CoordinatorConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            activation_interval: config.activation_interval(),
            max_refresh_failures: 3,
        }
    }

    fn activation_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.activation_interval.as_millis() as i64)
    }
}

/// 调度权故障接管监督器
///
/// 每个参与进程运行一个监督循环：空闲时观察租约，发现失效即发起
/// 接管（单点比较并交换仲裁）；持有期间按心跳间隔刷新，刷新连续
/// 失败或持有者变更时退回空闲。状态变化通过watch通道对外发布。
pub struct FailoverSupervisor {
    node_id: String,
    store: Arc<dyn LeaseStore>,
    config: FailoverConfig,
    state_tx: watch::Sender<LeaseState>,
}

impl FailoverSupervisor {
    pub fn new(node_id: String, store: Arc<dyn LeaseStore>, config: FailoverConfig) -> Self {
        let (state_tx, _) = watch::channel(LeaseState::Idle);
        Self {
            node_id,
            store,
            config,
            state_tx,
        }
    }

    /// 订阅租约状态
    pub fn state(&self) -> watch::Receiver<LeaseState> {
        self.state_tx.subscribe()
    }

    /// 当前租约状态
    pub fn current_state(&self) -> LeaseState {
        *self.state_tx.borrow()
    }

    pub fn is_active(&self) -> bool {
        self.current_state() == LeaseState::Active
    }

    /// 启动监督循环
    pub fn spawn(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.config.heartbeat_interval);
            let mut epoch: u64 = 0;
            let mut refresh_failures: u32 = 0;
            info!(node_id = %self.node_id, "故障接管监督循环启动");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.step(&mut epoch, &mut refresh_failures).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!(node_id = %self.node_id, "收到关闭信号，监督循环退出");
                        break;
                    }
                }
            }

            self.step_down(epoch).await;
        })
    }

    async fn step(&self, epoch: &mut u64, refresh_failures: &mut u32) {
        match self.current_state() {
            LeaseState::Idle => self.observe_and_maybe_claim(epoch).await,
            // Candidate是单次tick内的瞬态，不会跨tick存在
            LeaseState::Candidate => self.set_state(LeaseState::Idle),
            LeaseState::Active => self.refresh_or_step_down(epoch, refresh_failures).await,
        }
    }

    /// Idle：观察租约；发现失效进入Candidate并尝试接管
    async fn observe_and_maybe_claim(&self, epoch: &mut u64) {
        let now = Utc::now();
        let observed = match timeout(self.config.activation_interval, self.store.current()).await {
            Ok(Ok(lease)) => lease,
            Ok(Err(e)) => {
                warn!(node_id = %self.node_id, error = %e, "读取租约失败");
                return;
            }
            Err(_) => {
                warn!(node_id = %self.node_id, "读取租约超时，放弃本轮观察");
                return;
            }
        };

        let observed_epoch = match &observed {
            None => 0,
            Some(lease) if lease.is_expired(now) => lease.epoch,
            // 租约仍然有效，继续旁观
            Some(_) => return,
        };

        self.set_state(LeaseState::Candidate);
        debug!(node_id = %self.node_id, observed_epoch, "租约已失效，尝试接管");

        let claim = timeout(
            self.config.activation_interval,
            self.store.try_claim(
                &self.node_id,
                observed_epoch,
                now,
                self.config.activation_window(),
            ),
        )
        .await;

        match claim {
            Ok(Ok(Some(lease))) => {
                *epoch = lease.epoch;
                self.set_state(LeaseState::Active);
                info!(node_id = %self.node_id, epoch = lease.epoch, "接管调度租约");
            }
            Ok(Ok(None)) => {
                debug!(node_id = %self.node_id, "接管竞争失败，退回观察");
                self.set_state(LeaseState::Idle);
            }
            Ok(Err(e)) => {
                warn!(node_id = %self.node_id, error = %e, "接管请求失败");
                self.set_state(LeaseState::Idle);
            }
            Err(_) => {
                // 超时即放弃本次接管，绝不悬挂等待
                warn!(node_id = %self.node_id, "接管请求超时，下个周期重试");
                self.set_state(LeaseState::Idle);
            }
        }
    }

    /// Active：刷新心跳；持有者变更或连续失败时让出
    async fn refresh_or_step_down(&self, epoch: &mut u64, refresh_failures: &mut u32) {
        let now = Utc::now();
        let result = timeout(
            self.config.activation_interval,
            self.store.refresh(
                &self.node_id,
                *epoch,
                now,
                self.config.activation_window(),
            ),
        )
        .await;

        match result {
            Ok(Ok(true)) => {
                *refresh_failures = 0;
                return;
            }
            Ok(Ok(false)) => {
                warn!(node_id = %self.node_id, "租约持有者已变更，让出调度权");
                *refresh_failures = 0;
                self.set_state(LeaseState::Idle);
                return;
            }
            Ok(Err(e)) => {
                warn!(node_id = %self.node_id, error = %e, "心跳刷新失败");
            }
            Err(_) => {
                warn!(node_id = %self.node_id, "心跳刷新超时");
            }
        }

        *refresh_failures += 1;
        if *refresh_failures >= self.config.max_refresh_failures {
            warn!(
                node_id = %self.node_id,
                failures = *refresh_failures,
                "心跳连续失败，主动让出调度权"
            );
            let _ = timeout(
                self.config.heartbeat_interval,
                self.store.release(&self.node_id, *epoch),
            )
            .await;
            *refresh_failures = 0;
            self.set_state(LeaseState::Idle);
        }
    }

    /// 关闭时尽力释放租约，超过宽限期不再阻塞
    async fn step_down(&self, epoch: u64) {
        if self.current_state() != LeaseState::Active {
            return;
        }
        match timeout(
            self.config.heartbeat_interval,
            self.store.release(&self.node_id, epoch),
        )
        .await
        {
            Ok(Ok(true)) => info!(node_id = %self.node_id, "已释放调度租约"),
            Ok(Ok(false)) => debug!(node_id = %self.node_id, "租约已不属于本进程，无需释放"),
            Ok(Err(e)) => warn!(node_id = %self.node_id, error = %e, "释放租约失败"),
            Err(_) => warn!(node_id = %self.node_id, "释放租约超时，放弃等待"),
        }
        self.set_state(LeaseState::Idle);
    }

    fn set_state(&self, state: LeaseState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                *current = state;
                true
            }
        });
    }
}
