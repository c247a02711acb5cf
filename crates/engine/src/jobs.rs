use async_trait::async_trait;
use recall_ai::{ChatClient, ChatMessage};
use recall_entities::FactObject;
use recall_graph::{CommunityAlgorithm, GraphBackend};
use recall_shared::{RecallError, Result};
use recall_worker::{JobPayload, JobRuntime};
use tracing::{info, warn};

use crate::engine::Engine;

impl Engine {
  async fn run_relation_extraction(&self, memory_id: &recall_shared::Id) -> Result<()> {
    let keys = self.extract_entities(memory_id).await?;
    for pair in keys.windows(2) {
      let [subject, object] = pair else { continue };
      let outcome = self
        .upsert_relation(subject.clone(), "mentioned_with", FactObject::Entity(object.clone()), 0.6, None, Some(memory_id.clone()))
        .await;
      if let Err(err) = outcome {
        warn!(%err, memory_id = %memory_id, "relation extraction skipped a pair after a conflict");
      }
    }
    Ok(())
  }

  async fn run_summarization(&self, key: &recall_entities::EntityKey) -> Result<()> {
    let Some(mut entity) = self.entity(key).await? else {
      return Err(RecallError::not_found(format!("entity {key:?} not found")));
    };

    let summary = if let Some(chat) = &self.chat {
      let prompt = format!(
        "Summarize in one sentence what is known about {} ({:?}), mentioned {} times: {}",
        entity.name,
        entity.entity_type,
        entity.mention_count,
        entity.attributes.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(", ")
      );
      chat.chat(&[ChatMessage::user(prompt)]).await.unwrap_or_else(|_| entity.name.clone())
    } else {
      format!("{} ({:?}), mentioned {} time(s)", entity.name, entity.entity_type, entity.mention_count)
    };

    entity.summary = Some(summary);
    let mut graph = self.graph.write().await;
    graph.upsert_entity(entity).await?;
    Ok(())
  }

  async fn run_consistency_check(&self, character_id: &str, output: &str) -> Result<()> {
    let check = self.check_consistency(output).await;
    if !check.is_consistent {
      for violation in &check.violations {
        warn!(%character_id, rule = %violation.rule_ref, severity = ?violation.severity, "consistency violation detected");
      }
    }
    Ok(())
  }

  async fn run_deduplication(&self, memory_id: &recall_shared::Id) -> Result<()> {
    let Some(memory) = self.get(memory_id).await? else {
      return Ok(());
    };
    let decision = {
      let dedup = self.dedup.read().await;
      let texts = self.dedup_texts.read().await;
      dedup.evaluate(&memory.tokens, &memory.embedding, &memory.content, &texts).await?
    };
    if let recall_dedup::Decision::MergeInto(existing_id) = decision {
      info!(memory_id = %memory_id, merged_into = %existing_id, "background dedup merged a memory");
      self.delete(memory_id, recall_store::DeleteMode::Physical).await?;
    }
    Ok(())
  }

  async fn run_foreshadowing_analysis(&self, character_id: &str) -> Result<()> {
    let recent: Vec<String> = self.store.read().await.list_by_character(character_id, 20).into_iter().map(|m| m.content).collect();
    let report = self.analyze_foreshadowing(character_id, &recent).await?;
    info!(%character_id, planted = report.planted.len(), auto_resolved = report.auto_resolved.len(), "foreshadowing analysis ran");
    Ok(())
  }

  async fn run_contradiction_detection(&self, key: &recall_entities::EntityKey) -> Result<()> {
    let Some(entity) = self.entity(key).await? else {
      return Ok(());
    };
    let pending = self.pending_contradiction_count().await;
    info!(entity = %entity.name, pending, "contradiction sweep visited entity");
    Ok(())
  }

  async fn run_community_detection(&self) -> Result<()> {
    let communities = self.communities(CommunityAlgorithm::Louvain).await?;
    info!(community_count = communities.values().collect::<std::collections::HashSet<_>>().len(), "community detection ran");
    Ok(())
  }
}

#[async_trait]
impl JobRuntime for Engine {
  /// Dispatches every background task kind to the matching operation,
  /// fulfilling `recall-worker`'s `JobRuntime` contract. This is the only
  /// `impl JobRuntime`, since `recall-engine` is the sole crate with a
  /// consistent view across store/graph/indexes.
  async fn run(&self, payload: JobPayload) -> Result<()> {
    match payload {
      JobPayload::EntityExtraction { memory_id } => {
        self.extract_entities(&memory_id).await?;
        Ok(())
      }
      JobPayload::RelationExtraction { memory_id } => self.run_relation_extraction(&memory_id).await,
      JobPayload::ContradictionDetection { entity } => self.run_contradiction_detection(&entity).await,
      JobPayload::Summarization { entity } => self.run_summarization(&entity).await,
      JobPayload::EpisodeSegmentation { session_id } => {
        self.segment_episode(&session_id).await?;
        Ok(())
      }
      JobPayload::ForeshadowingAnalysis { character_id } => self.run_foreshadowing_analysis(&character_id).await,
      JobPayload::ForeshadowingResolution { foreshadowing_id } => self.resolve_foreshadowing(&foreshadowing_id).await,
      JobPayload::PersistentContextSweep { user_id: _ } => {
        self.sweep_persistent_context().await;
        Ok(())
      }
      JobPayload::ConsistencyCheck { character_id, output } => self.run_consistency_check(&character_id, &output).await,
      JobPayload::Deduplication { memory_id } => self.run_deduplication(&memory_id).await,
      JobPayload::Consolidation => {
        self.store.write().await.migrate_batch_to_l1()?;
        Ok(())
      }
      JobPayload::IndexSnapshot => self.indexes.write().await.snapshot(),
      JobPayload::ArchiveSeal => self.flush().await,
      JobPayload::CommunityDetection => self.run_community_detection().await,
    }
  }
}
