use async_trait::async_trait;
use recall_entities::EntityKey;
use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

use crate::kind::TaskKind;

/// Payload carried by a `RecallJob`, one variant per `TaskKind`. Kept to
/// plain ids and small scalars — the actual store/graph/analyzer state a
/// handler needs to do its work lives with whoever implements
/// [`JobRuntime`], not in the job itself, so jobs stay cheaply
/// `Clone`/`Serialize` for the apalis backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobPayload {
  EntityExtraction { memory_id: Id },
  RelationExtraction { memory_id: Id },
  ContradictionDetection { entity: EntityKey },
  Summarization { entity: EntityKey },
  EpisodeSegmentation { session_id: String },
  ForeshadowingAnalysis { character_id: String },
  ForeshadowingResolution { foreshadowing_id: Id },
  PersistentContextSweep { user_id: String },
  ConsistencyCheck { character_id: String, output: String },
  Deduplication { memory_id: Id },
  Consolidation,
  IndexSnapshot,
  ArchiveSeal,
  CommunityDetection,
}

impl JobPayload {
  #[must_use]
  pub fn kind(&self) -> TaskKind {
    match self {
      JobPayload::EntityExtraction { .. } => TaskKind::EntityExtraction,
      JobPayload::RelationExtraction { .. } => TaskKind::RelationExtraction,
      JobPayload::ContradictionDetection { .. } => TaskKind::ContradictionDetection,
      JobPayload::Summarization { .. } => TaskKind::Summarization,
      JobPayload::EpisodeSegmentation { .. } => TaskKind::EpisodeSegmentation,
      JobPayload::ForeshadowingAnalysis { .. } => TaskKind::ForeshadowingAnalysis,
      JobPayload::ForeshadowingResolution { .. } => TaskKind::ForeshadowingResolution,
      JobPayload::PersistentContextSweep { .. } => TaskKind::PersistentContextSweep,
      JobPayload::ConsistencyCheck { .. } => TaskKind::ConsistencyCheck,
      JobPayload::Deduplication { .. } => TaskKind::Deduplication,
      JobPayload::Consolidation => TaskKind::Consolidation,
      JobPayload::IndexSnapshot => TaskKind::IndexSnapshot,
      JobPayload::ArchiveSeal => TaskKind::ArchiveSeal,
      JobPayload::CommunityDetection => TaskKind::CommunityDetection,
    }
  }
}

/// One unit of work pushed onto the apalis backend. `task_id` is minted by
/// [`crate::TaskManager::submit`] before the job is pushed, so status
/// lookups and progress events can key on it immediately, ahead of the
/// worker ever polling the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallJob {
  pub task_id: Id,
  pub payload: JobPayload,
}

/// Supplies the actual business logic for every task kind. `recall-engine`
/// is the real implementor: it owns the store/graph/dedup/analyzer state a
/// handler needs and is the only crate with a consistent view across all of
/// them. Keeping the trait here, rather than depending on those crates
/// directly from `recall-worker`, lets the task manager and its apalis
/// wiring be tested in isolation with a stub runtime.
#[async_trait]
pub trait JobRuntime: Send + Sync {
  async fn run(&self, payload: JobPayload) -> Result<()>;
}
