use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use apalis::memory::MemoryStorage;
use apalis::prelude::{BoxDynError, Monitor, Storage, WorkerBuilder, WorkerContext};
use recall_shared::{now_ms, Id, RecallError, Result};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::job::{JobPayload, JobRuntime, RecallJob};
use crate::status::{ProgressEvent, TaskStatus};

const PROGRESS_CHANNEL_CAPACITY: usize = 1024;

/// Task manager: submits jobs onto an apalis in-memory backend, tracks each
/// task through its single lifecycle (submitted → running → done|failed|
/// cancelled), and republishes every transition on a broadcast channel so
/// any number of subscribers can watch progress without polling.
#[derive(Clone)]
pub struct TaskManager {
  backend: MemoryStorage<RecallJob>,
  statuses: Arc<RwLock<HashMap<Id, TaskStatus>>>,
  progress_tx: broadcast::Sender<ProgressEvent>,
}

impl TaskManager {
  #[must_use]
  pub fn new() -> Self {
    let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
    Self { backend: MemoryStorage::new(), statuses: Arc::new(RwLock::new(HashMap::new())), progress_tx }
  }

  #[must_use]
  pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
    self.progress_tx.subscribe()
  }

  pub async fn status(&self, task_id: &Id) -> Option<TaskStatus> {
    self.statuses.read().await.get(task_id).copied()
  }

  /// Marks a submitted-or-running task `Cancelled`. Best-effort: a job
  /// already picked up by a worker runs to completion, since apalis has no
  /// cooperative-cancellation hook for in-flight jobs; this only prevents
  /// the status from ever reporting success for a task the caller gave up
  /// on.
  pub async fn cancel(&self, task_id: &Id) -> Result<()> {
    let mut statuses = self.statuses.write().await;
    match statuses.get(task_id) {
      Some(status) if !status.is_terminal() => {
        statuses.insert(task_id.clone(), TaskStatus::Cancelled);
        drop(statuses);
        self.publish(task_id.clone(), crate::kind::TaskKind::Consolidation, TaskStatus::Cancelled, None);
        Ok(())
      }
      Some(_) => Ok(()),
      None => Err(RecallError::not_found(format!("no such task: {task_id}"))),
    }
  }

  fn publish(&self, task_id: Id, kind: crate::kind::TaskKind, status: TaskStatus, message: Option<String>) {
    let _ = self.progress_tx.send(ProgressEvent { task_id, kind, status, message, timestamp: now_ms() });
  }

  /// Mints a task id, records it `Submitted`, and pushes the job onto the
  /// backend. Returns the id immediately; the caller observes completion
  /// via [`Self::subscribe`] or polling [`Self::status`].
  pub async fn submit(&self, payload: JobPayload) -> Result<Id> {
    let task_id = Id::new("task");
    let kind = payload.kind();
    self.statuses.write().await.insert(task_id.clone(), TaskStatus::Submitted);
    self.publish(task_id.clone(), kind, TaskStatus::Submitted, None);

    let job = RecallJob { task_id: task_id.clone(), payload };
    let mut backend = self.backend.clone();
    backend.push(job).await.map_err(|err| RecallError::backend_unavailable(anyhow::anyhow!(err.to_string())))?;
    Ok(task_id)
  }

  /// Runs the worker loop against `runtime` until the process receives
  /// Ctrl-C, matching the reference workspace's `Monitor`/`WorkerBuilder`
  /// shutdown pattern.
  pub async fn run(self, runtime: Arc<dyn JobRuntime>) -> Result<()> {
    let manager = self.clone();
    let backend = self.backend.clone();

    Monitor::new()
      .register(move |_run_id| {
        let manager = manager.clone();
        let runtime = runtime.clone();
        WorkerBuilder::new("recall-worker").backend(backend.clone()).build(move |job: RecallJob, _ctx: WorkerContext| {
          let manager = manager.clone();
          let runtime = runtime.clone();
          async move { dispatch_one(&manager, runtime.as_ref(), job).await }
        })
      })
      .shutdown_timeout(Duration::from_secs(5))
      .run_with_signal(tokio::signal::ctrl_c())
      .await
      .map_err(|err| RecallError::backend_unavailable(anyhow::anyhow!(err.to_string())))
  }
}

impl Default for TaskManager {
  fn default() -> Self {
    Self::new()
  }
}

/// The per-job dispatch body, split out of the apalis-wired closure so it
/// can be exercised directly in tests without a real `Monitor` run loop.
async fn dispatch_one(manager: &TaskManager, runtime: &dyn JobRuntime, job: RecallJob) -> Result<(), BoxDynError> {
  let RecallJob { task_id, payload } = job;
  let kind = payload.kind();

  if manager.status(&task_id).await == Some(TaskStatus::Cancelled) {
    info!(%task_id, %kind, "skipping cancelled task");
    return Ok(());
  }

  manager.statuses.write().await.insert(task_id.clone(), TaskStatus::Running);
  manager.publish(task_id.clone(), kind, TaskStatus::Running, None);

  match runtime.run(payload).await {
    Ok(()) => {
      manager.statuses.write().await.insert(task_id.clone(), TaskStatus::Done);
      manager.publish(task_id.clone(), kind, TaskStatus::Done, None);
      Ok(())
    }
    Err(err) => {
      warn!(%task_id, %kind, %err, "task failed");
      manager.statuses.write().await.insert(task_id.clone(), TaskStatus::Failed);
      manager.publish(task_id.clone(), kind, TaskStatus::Failed, Some(err.to_string()));
      Err(Box::new(err) as BoxDynError)
    }
  }
}

#[cfg(test)]
mod tests {
  use async_trait::async_trait;
  use recall_shared::Result as RecallResult;

  use super::*;
  use crate::job::JobPayload;

  struct AlwaysOk;
  #[async_trait]
  impl JobRuntime for AlwaysOk {
    async fn run(&self, _payload: JobPayload) -> RecallResult<()> {
      Ok(())
    }
  }

  struct AlwaysFails;
  #[async_trait]
  impl JobRuntime for AlwaysFails {
    async fn run(&self, _payload: JobPayload) -> RecallResult<()> {
      Err(RecallError::invalid_argument("nope"))
    }
  }

  #[tokio::test]
  async fn submit_marks_task_submitted() {
    let manager = TaskManager::new();
    let id = manager.submit(JobPayload::IndexSnapshot).await.unwrap();
    assert_eq!(manager.status(&id).await, Some(TaskStatus::Submitted));
  }

  #[tokio::test]
  async fn successful_dispatch_reaches_done() {
    let manager = TaskManager::new();
    let id = Id::new("task");
    manager.statuses.write().await.insert(id.clone(), TaskStatus::Submitted);
    let job = RecallJob { task_id: id.clone(), payload: JobPayload::Consolidation };
    dispatch_one(&manager, &AlwaysOk, job).await.unwrap();
    assert_eq!(manager.status(&id).await, Some(TaskStatus::Done));
  }

  #[tokio::test]
  async fn failed_dispatch_reaches_failed_and_reports_error() {
    let manager = TaskManager::new();
    let id = Id::new("task");
    manager.statuses.write().await.insert(id.clone(), TaskStatus::Submitted);
    let job = RecallJob { task_id: id.clone(), payload: JobPayload::IndexSnapshot };
    let result = dispatch_one(&manager, &AlwaysFails, job).await;
    assert!(result.is_err());
    assert_eq!(manager.status(&id).await, Some(TaskStatus::Failed));
  }

  #[tokio::test]
  async fn cancelled_task_is_skipped_without_running() {
    let manager = TaskManager::new();
    let id = Id::new("task");
    manager.statuses.write().await.insert(id.clone(), TaskStatus::Cancelled);
    let job = RecallJob { task_id: id.clone(), payload: JobPayload::Consolidation };
    dispatch_one(&manager, &AlwaysFails, job).await.unwrap();
    assert_eq!(manager.status(&id).await, Some(TaskStatus::Cancelled));
  }

  #[tokio::test]
  async fn subscribers_observe_progress_events_in_order() {
    let manager = TaskManager::new();
    let mut rx = manager.subscribe();
    let id = manager.submit(JobPayload::ArchiveSeal).await.unwrap();
    let event = rx.recv().await.unwrap();
    assert_eq!(event.task_id, id);
    assert_eq!(event.status, TaskStatus::Submitted);
  }
}
