use recall_shared::Id;
use serde::{Deserialize, Serialize};

use crate::kind::TaskKind;

/// The task manager's single lifecycle: every task starts `Submitted`,
/// moves to `Running` once a worker picks it up, and ends in exactly one
/// of `Done`, `Failed`, or `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
  Submitted,
  Running,
  Done,
  Failed,
  Cancelled,
}

impl TaskStatus {
  #[must_use]
  pub fn is_terminal(self) -> bool {
    matches!(self, TaskStatus::Done | TaskStatus::Failed | TaskStatus::Cancelled)
  }
}

/// One message on the task manager's publish/subscribe progress channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
  pub task_id: Id,
  pub kind: TaskKind,
  pub status: TaskStatus,
  pub message: Option<String>,
  pub timestamp: i64,
}
