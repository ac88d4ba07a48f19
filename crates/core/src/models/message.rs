use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{QueueError, QueueResult};

/// 队列中的一条确认消息记录
///
/// 只保存协调所需的元数据，消息体由传输层负责。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// 到达序列号，每个队列实例内严格递增
    pub sequence_id: u64,
    pub size_bytes: u64,
    pub arrival_time: DateTime<Utc>,
    pub state: MessageState,
}

/// 消息分配状态
///
/// 正常流转只允许 UNASSIGNED -> ASSIGNED -> COMPLETED 单向推进，
/// 唯一的回退路径是持有Worker退出时的重新排队。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state")]
pub enum MessageState {
    #[serde(rename = "UNASSIGNED")]
    Unassigned,
    #[serde(rename = "ASSIGNED")]
    Assigned { worker_id: String },
    #[serde(rename = "COMPLETED")]
    Completed { completed_at: DateTime<Utc> },
}

impl MessageState {
    pub fn name(&self) -> &'static str {
        match self {
            MessageState::Unassigned => "UNASSIGNED",
            MessageState::Assigned { .. } => "ASSIGNED",
            MessageState::Completed { .. } => "COMPLETED",
        }
    }
}

impl QueueMessage {
    /// 创建一条新到达的未分配消息
    pub fn new(sequence_id: u64, size_bytes: u64, arrival_time: DateTime<Utc>) -> Self {
        Self {
            sequence_id,
            size_bytes,
            arrival_time,
            state: MessageState::Unassigned,
        }
    }

    pub fn is_unassigned(&self) -> bool {
        matches!(self.state, MessageState::Unassigned)
    }

    /// 当前持有该消息的Worker
    pub fn assigned_worker(&self) -> Option<&str> {
        match &self.state {
            MessageState::Assigned { worker_id } => Some(worker_id),
            _ => None,
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self.state {
            MessageState::Completed { completed_at } => Some(completed_at),
            _ => None,
        }
    }

    /// 分配给指定Worker，仅允许 UNASSIGNED -> ASSIGNED
    pub fn assign(&mut self, worker_id: &str) -> QueueResult<()> {
        match self.state {
            MessageState::Unassigned => {
                self.state = MessageState::Assigned {
                    worker_id: worker_id.to_string(),
                };
                Ok(())
            }
            _ => Err(QueueError::invalid_transition(
                self.sequence_id,
                self.state.name(),
            )),
        }
    }

    /// 标记完成，仅允许 ASSIGNED -> COMPLETED，返回原持有Worker
    pub fn complete(&mut self, completed_at: DateTime<Utc>) -> QueueResult<String> {
        match &self.state {
            MessageState::Assigned { worker_id } => {
                let worker_id = worker_id.clone();
                self.state = MessageState::Completed { completed_at };
                Ok(worker_id)
            }
            _ => Err(QueueError::invalid_transition(
                self.sequence_id,
                self.state.name(),
            )),
        }
    }

    /// 持有Worker退出时回到未分配状态，返回原持有Worker
    pub fn requeue(&mut self) -> QueueResult<String> {
        match &self.state {
            MessageState::Assigned { worker_id } => {
                let worker_id = worker_id.clone();
                self.state = MessageState::Unassigned;
                Ok(worker_id)
            }
            _ => Err(QueueError::invalid_transition(
                self.sequence_id,
                self.state.name(),
            )),
        }
    }
}
