use recall_analyzers::AnalysisReport;
use recall_entities::{Foreshadowing, PersistentContextItem};
use recall_shared::{Id, Result};

use crate::engine::Engine;

impl Engine {
  /// Plants a new foreshadowing thread for `character_id`. No-ops into an error for callers that forgot the feature can be
  /// disabled entirely via config; the tracker itself always accepts plants
  /// regardless of the `enabled` switch, which only gates `analyze`.
  pub async fn plant_foreshadowing(&self, character_id: &str, content: impl Into<String>, importance: f64, evidence: impl Into<String>) -> Id {
    self.foreshadowing.write().await.plant(character_id, content, importance, evidence)
  }

  pub async fn add_foreshadowing_hint(&self, id: &Id, hint: impl Into<String>) -> Result<()> {
    self.foreshadowing.write().await.add_hint(id, hint)
  }

  pub async fn resolve_foreshadowing(&self, id: &Id) -> Result<()> {
    self.foreshadowing.write().await.resolve(id)
  }

  pub async fn abandon_foreshadowing(&self, id: &Id) -> Result<()> {
    self.foreshadowing.write().await.abandon(id)
  }

  pub async fn active_foreshadowing(&self, character_id: &str) -> Vec<Foreshadowing> {
    self.foreshadowing.read().await.get_active(character_id).into_iter().cloned().collect()
  }

  /// Runs the LLM-backed foreshadowing analysis over `recent_turns` for
  /// `character_id`. A no-op `AnalysisReport` when the
  /// feature is disabled or no chat client is configured — see
  /// `ForeshadowingTracker::analyze`.
  pub async fn analyze_foreshadowing(&self, character_id: &str, recent_turns: &[String]) -> Result<AnalysisReport> {
    self.foreshadowing.write().await.analyze(character_id, recent_turns).await
  }

  pub async fn observe_persistent_context(&self, item: PersistentContextItem) -> Id {
    self.persistent_context.write().await.observe(item)
  }

  pub async fn reobserve_persistent_context(&self, id: &Id) -> bool {
    self.persistent_context.write().await.reobserve(id)
  }

  /// Sweeps every item whose decayed confidence has bottomed out, returning
  /// the ids removed. Intended to be driven by
  /// the `PersistentContextSweep` background job, not the request path.
  pub async fn sweep_persistent_context(&self) -> Vec<Id> {
    self.persistent_context.write().await.sweep_decayed()
  }

  pub async fn get_persistent_context(&self, id: &Id) -> Option<PersistentContextItem> {
    self.persistent_context.read().await.get(id).cloned()
  }

  pub async fn active_persistent_context(&self, user_id: &str) -> Vec<PersistentContextItem> {
    self.persistent_context.read().await.active_items(user_id).into_iter().cloned().collect()
  }

  pub async fn persistent_context_reminders(&self, user_id: &str, min_confidence: f64) -> Vec<PersistentContextItem> {
    self.persistent_context.read().await.reminder_candidates(user_id, min_confidence).into_iter().cloned().collect()
  }

  /// Checks `output` against the compiled absolute-rules set.
  /// Rules are recompiled whenever `set_core_settings` changes them; this
  /// method only reads the already-compiled set.
  pub async fn check_consistency(&self, output: &str) -> recall_analyzers::ConsistencyCheck {
    self.consistency.read().await.check(output)
  }

  /// Replaces the absolute-rules set and recompiles the consistency checker
  /// to match, keeping core settings and the checker from drifting apart.
  pub async fn set_core_settings(&self, settings: recall_entities::CoreSettings) -> Result<()> {
    let mut checker = recall_analyzers::ConsistencyChecker::compile(&settings.absolute_rules);
    {
      let mut store = self.store.write().await;
      store.set_core_settings(settings)?;
    }
    std::mem::swap(&mut *self.consistency.write().await, &mut checker);
    Ok(())
  }
}
