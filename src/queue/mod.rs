pub mod memory;
pub mod registry;
pub mod retry;
pub mod worker;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::{InMemoryTaskQueue, Lease, QueueCounts};
pub use registry::{ActionHandler, HandlerRegistry};
pub use retry::RetryPolicy;
pub use worker::WorkerGroup;

/// Handler name an action is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SendMessage,
    EditMessage,
    DeleteMessage,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [
        ActionKind::SendMessage,
        ActionKind::EditMessage,
        ActionKind::DeleteMessage,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::SendMessage => "send_message",
            ActionKind::EditMessage => "edit_message",
            ActionKind::DeleteMessage => "delete_message",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One unit of work for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Create { item_id: i64 },
    Update { item_id: i64, message_id: i64 },
    Delete { item_id: i64, message_id: i64 },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Create { .. } => ActionKind::SendMessage,
            Action::Update { .. } => ActionKind::EditMessage,
            Action::Delete { .. } => ActionKind::DeleteMessage,
        }
    }

    pub fn item_id(&self) -> i64 {
        match self {
            Action::Create { item_id }
            | Action::Update { item_id, .. }
            | Action::Delete { item_id, .. } => *item_id,
        }
    }

    pub fn message_id(&self) -> Option<i64> {
        match self {
            Action::Create { .. } => None,
            Action::Update { message_id, .. } | Action::Delete { message_id, .. } => {
                Some(*message_id)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A leased action plus its delivery attempt (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub action: Action,
    pub attempt: u32,
}

/// Handler failure as seen by the queue.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    pub message: String,
    pub retryable: bool,
}

/// At-least-once submission. Returns once the action is accepted; execution
/// happens elsewhere.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn submit(&self, action: Action) -> Result<TaskId>;
}
