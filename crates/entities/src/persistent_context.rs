use recall_shared::{Id, now_ms};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The 15 closed persistent-context types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ContextType {
  UserIdentity,
  UserGoal,
  UserPreference,
  UserConstraint,
  UserRelationship,
  UserSkill,
  UserSchedule,
  WorldFact,
  WorldRule,
  WorldLocation,
  WorldOrganization,
  WorldHistory,
  AssistantRole,
  AssistantConstraint,
  Custom,
}

/// A durable user/world fact outside the narrative log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentContextItem {
  pub id: Id,
  pub context_type: ContextType,
  pub content: String,
  pub confidence: f64,
  pub last_seen_at: i64,
  pub embedding: Vec<f32>,
  pub user_id: String,
  pub session_id: String,
  pub archived: bool,
}

impl PersistentContextItem {
  #[must_use]
  pub fn new(context_type: ContextType, content: impl Into<String>, confidence: f64, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
    Self {
      id: Id::new("pci"),
      context_type,
      content: content.into(),
      confidence: confidence.clamp(0.0, 1.0),
      last_seen_at: now_ms(),
      embedding: Vec::new(),
      user_id: user_id.into(),
      session_id: session_id.into(),
      archived: false,
    }
  }

  pub fn reobserve(&mut self) {
    self.last_seen_at = now_ms();
  }

  /// Linear confidence decay after `decay_days` of not being re-seen,
  /// reaching zero at `2 * decay_days`. Below `min_confidence` the caller
  /// should archive the item.
  #[must_use]
  pub fn decayed_confidence(&self, now_ms_: i64, decay_days: i64) -> f64 {
    if decay_days <= 0 {
      return self.confidence;
    }
    let age_days = (now_ms_ - self.last_seen_at).max(0) / (1000 * 60 * 60 * 24);
    if age_days <= decay_days {
      return self.confidence;
    }
    let overdue = (age_days - decay_days) as f64;
    let decay_window = decay_days as f64;
    let factor = (1.0 - overdue / decay_window).max(0.0);
    self.confidence * factor
  }
}
