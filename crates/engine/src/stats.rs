use recall_shared::{Config, RecallMode};

use crate::engine::Engine;
use crate::types::Stats;

/// Effective mode report.
#[derive(Debug, Clone)]
pub struct ModeReport {
  pub mode: RecallMode,
  pub foreshadowing_enabled: bool,
  pub rp_consistency_enabled: bool,
  pub character_dimension_enabled: bool,
  pub embedding_mode: recall_shared::EmbeddingMode,
}

impl ModeReport {
  fn from_config(config: &Config) -> Self {
    Self {
      mode: config.mode,
      foreshadowing_enabled: config.foreshadowing.enabled,
      rp_consistency_enabled: config.rp_consistency_enabled,
      character_dimension_enabled: config.character_dimension_enabled,
      embedding_mode: config.embedding.mode,
    }
  }
}

impl Engine {
  /// `Stats() → counters`.
  pub async fn stats(&self) -> Stats {
    let (l2_resident, l1_resident) = self.store.read().await.resident_counts();
    let (total_entities, total_facts) = self.graph.read().await.counts();
    let pending_contradictions = self.contradictions.read().await.pending_count() as u64;
    let active_foreshadowings = self.foreshadowing.read().await.active_count() as u64;
    let active_persistent_context = self.persistent_context.read().await.active_count() as u64;

    Stats {
      total_memories: l2_resident + l1_resident,
      l2_resident,
      l1_resident,
      total_entities,
      total_facts,
      pending_contradictions,
      active_foreshadowings,
      active_persistent_context,
    }
  }

  /// Mode endpoint: the resolved `RECALL_MODE` and every sub-switch.
  pub async fn mode(&self) -> ModeReport {
    ModeReport::from_config(&self.config().await)
  }
}
