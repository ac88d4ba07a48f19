use thiserror::Error;

/// 队列协调器错误类型定义
#[derive(Debug, Error, Clone)]
pub enum QueueError {
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    #[error("无效的Worker权重: {weight}")]
    InvalidWeight { weight: u32 },

    #[error("Worker未注册: {id}")]
    UnknownWorker { id: String },

    #[error("消息不存在: sequence_id={sequence_id}")]
    UnknownMessage { sequence_id: u64 },

    #[error("Worker重复注册: {id}")]
    DuplicateWorker { id: String },

    #[error("消息序列号重复投递: sequence_id={sequence_id}")]
    DuplicateSequence { sequence_id: u64 },

    #[error("非法状态转换: 消息 {sequence_id} 当前处于 {state} 状态")]
    InvalidTransition { sequence_id: u64, state: String },

    #[error("Worker {id} 的积压计数即将为负")]
    NegativeBacklog { id: String },

    #[error("失去调度租约")]
    LeaseLost,

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type QueueResult<T> = std::result::Result<T, QueueError>;

impl QueueError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn unknown_worker<S: Into<String>>(id: S) -> Self {
        Self::UnknownWorker { id: id.into() }
    }

    pub fn unknown_message(sequence_id: u64) -> Self {
        Self::UnknownMessage { sequence_id }
    }

    pub fn duplicate_worker<S: Into<String>>(id: S) -> Self {
        Self::DuplicateWorker { id: id.into() }
    }

    pub fn duplicate_sequence(sequence_id: u64) -> Self {
        Self::DuplicateSequence { sequence_id }
    }

    pub fn invalid_transition<S: Into<String>>(sequence_id: u64, state: S) -> Self {
        Self::InvalidTransition {
            sequence_id,
            state: state.into(),
        }
    }

    pub fn negative_backlog<S: Into<String>>(id: S) -> Self {
        Self::NegativeBacklog { id: id.into() }
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }
}
