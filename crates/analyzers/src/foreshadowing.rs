use std::collections::HashMap;
use std::sync::Arc;

use recall_ai::{cosine_similarity, ChatClient, ChatMessage, Embedder, SchemaSpec};
use recall_entities::Foreshadowing;
use recall_shared::{ForeshadowingConfig, Id, RecallError, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

/// One suggestion parsed from the LLM analyzer's structured response.
#[derive(Debug, Deserialize, JsonSchema)]
struct NewForeshadowing {
  content: String,
  importance: f64,
  evidence: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct AnalyzerResponse {
  #[serde(default)]
  new_foreshadowings: Vec<NewForeshadowing>,
  #[serde(default)]
  potentially_resolved: Vec<String>,
}

/// Result of one `analyze` pass, after auto-plant/auto-resolve policy has
/// already been applied.
#[derive(Debug, Default)]
pub struct AnalysisReport {
  pub planted: Vec<Id>,
  pub skipped_as_duplicate: usize,
  pub auto_resolved: Vec<Id>,
  /// Ids the LLM flagged as possibly resolved but which require explicit
  /// confirmation (`auto_resolve = false`).
  pub pending_resolution: Vec<Id>,
}

/// Holds `{active (planted/developing), resolved, abandoned}` sets keyed
/// by character. Manual CRUD is always
/// available; the LLM analyzer is optional and gated by
/// `ForeshadowingConfig::enabled`.
pub struct ForeshadowingTracker {
  config: ForeshadowingConfig,
  chat: Option<Arc<dyn ChatClient>>,
  embedder: Option<Arc<dyn Embedder>>,
  items: HashMap<Id, Foreshadowing>,
  by_character: HashMap<String, Vec<Id>>,
}

impl ForeshadowingTracker {
  #[must_use]
  pub fn new(config: ForeshadowingConfig, chat: Option<Arc<dyn ChatClient>>, embedder: Option<Arc<dyn Embedder>>) -> Self {
    Self {
      config,
      chat,
      embedder,
      items: HashMap::new(),
      by_character: HashMap::new(),
    }
  }

  pub fn plant(&mut self, character_id: impl Into<String>, content: impl Into<String>, importance: f64, evidence: impl Into<String>) -> Id {
    let character_id = character_id.into();
    let item = Foreshadowing::plant(character_id.clone(), content, importance, evidence);
    let id = item.id.clone();
    self.by_character.entry(character_id).or_default().push(id.clone());
    self.items.insert(id.clone(), item);
    id
  }

  pub fn add_hint(&mut self, id: &Id, hint: impl Into<String>) -> Result<()> {
    let item = self.items.get_mut(id).ok_or_else(|| RecallError::not_found(format!("foreshadowing {id} not found")))?;
    item.add_hint(hint);
    Ok(())
  }

  pub fn resolve(&mut self, id: &Id) -> Result<()> {
    let item = self.items.get_mut(id).ok_or_else(|| RecallError::not_found(format!("foreshadowing {id} not found")))?;
    item.resolve();
    Ok(())
  }

  pub fn abandon(&mut self, id: &Id) -> Result<()> {
    let item = self.items.get_mut(id).ok_or_else(|| RecallError::not_found(format!("foreshadowing {id} not found")))?;
    item.abandon();
    Ok(())
  }

  #[must_use]
  pub fn get_active(&self, character_id: &str) -> Vec<&Foreshadowing> {
    self
      .by_character
      .get(character_id)
      .into_iter()
      .flatten()
      .filter_map(|id| self.items.get(id))
      .filter(|item| item.is_active())
      .collect()
  }

  /// Count of active (planted/developing) items across every character,
  /// for the stats operation.
  #[must_use]
  pub fn active_count(&self) -> usize {
    self.items.values().filter(|item| item.is_active()).count()
  }

  async fn embed(&self, text: &str) -> Option<Vec<f32>> {
    let embedder = self.embedder.as_ref()?;
    embedder.embed(text).await.ok()
  }

  /// Runs the optional LLM analyzer over the last `max_context_turns`
  /// turns, applying `auto_plant`/`auto_resolve` policy to its output
  ///. No-ops (returns an empty report) when disabled or when no
  /// chat client was configured.
  pub async fn analyze(&mut self, character_id: &str, recent_turns: &[String]) -> Result<AnalysisReport> {
    let mut report = AnalysisReport::default();
    if !self.config.enabled {
      return Ok(report);
    }
    let Some(chat) = self.chat.clone() else {
      return Ok(report);
    };

    let turns_window: Vec<&String> = recent_turns.iter().rev().take(self.config.max_context_turns as usize).collect();
    let active_summaries: Vec<String> = self.get_active(character_id).iter().map(|f| f.content.clone()).collect();
    let prompt = format!(
      "Recent turns:\n{}\n\nCurrently active foreshadowings:\n{}\n\nIdentify any new foreshadowing planted in the recent turns and any active foreshadowing the turns suggest has been resolved.",
      turns_window.iter().rev().cloned().cloned().collect::<Vec<_>>().join("\n"),
      active_summaries.join("\n"),
    );
    let schema = SchemaSpec::for_type::<AnalyzerResponse>("foreshadowing_analysis", Some("newly planted foreshadowing and ids of foreshadowing that appear resolved"));
    let raw = chat.chat_structured(&[ChatMessage::user(prompt)], &schema).await?;
    let parsed: AnalyzerResponse = match serde_json::from_str(&raw) {
      Ok(p) => p,
      Err(err) => {
        warn!(%err, "foreshadowing analyzer returned unparseable JSON");
        return Ok(report);
      }
    };

    for suggestion in parsed.new_foreshadowings {
      if !self.config.auto_plant {
        continue;
      }
      let embedding = self.embed(&suggestion.content).await;
      let is_duplicate = if let Some(embedding) = &embedding {
        self
          .get_active(character_id)
          .iter()
          .any(|existing| !existing.embedding.is_empty() && cosine_similarity(embedding, &existing.embedding) >= self.config.dedup_cosine_threshold)
      } else {
        false
      };
      if is_duplicate {
        report.skipped_as_duplicate += 1;
        continue;
      }
      let id = self.plant(character_id, suggestion.content, suggestion.importance, suggestion.evidence);
      if let Some(embedding) = embedding {
        if let Some(item) = self.items.get_mut(&id) {
          item.embedding = embedding;
        }
      }
      report.planted.push(id);
    }

    for id_str in parsed.potentially_resolved {
      let id = Id::from(id_str);
      if !self.items.contains_key(&id) {
        continue;
      }
      if self.config.auto_resolve {
        if self.resolve(&id).is_ok() {
          info!(foreshadowing_id = %id, "auto-resolved");
          report.auto_resolved.push(id);
        }
      } else {
        report.pending_resolution.push(id);
      }
    }

    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plant_and_get_active_roundtrip() {
    let mut tracker = ForeshadowingTracker::new(ForeshadowingConfig::default(), None, None);
    let id = tracker.plant("char1", "a locked door appears", 0.7, "chapter 2");
    let active = tracker.get_active("char1");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, id);
  }

  #[test]
  fn resolved_items_drop_out_of_active() {
    let mut tracker = ForeshadowingTracker::new(ForeshadowingConfig::default(), None, None);
    let id = tracker.plant("char1", "a locked door appears", 0.7, "chapter 2");
    tracker.resolve(&id).unwrap();
    assert!(tracker.get_active("char1").is_empty());
  }

  #[test]
  fn add_hint_promotes_planted_to_developing() {
    let mut tracker = ForeshadowingTracker::new(ForeshadowingConfig::default(), None, None);
    let id = tracker.plant("char1", "a locked door appears", 0.7, "chapter 2");
    tracker.add_hint(&id, "the door has a strange symbol").unwrap();
    assert_eq!(tracker.items[&id].state, recall_entities::ForeshadowingState::Developing);
  }

  #[tokio::test]
  async fn analyzer_is_a_noop_when_disabled() {
    let mut tracker = ForeshadowingTracker::new(ForeshadowingConfig::default(), None, None);
    let report = tracker.analyze("char1", &["turn 1".to_owned()]).await.unwrap();
    assert!(report.planted.is_empty());
  }
}
