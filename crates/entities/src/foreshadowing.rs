use recall_shared::{Id, now_ms};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ForeshadowingState {
  Planted,
  Developing,
  Resolved,
  Abandoned,
}

/// A narrative seed whose resolution is expected in future turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Foreshadowing {
  pub id: Id,
  pub character_id: String,
  pub content: String,
  pub importance: f64,
  pub state: ForeshadowingState,
  pub related_entities: Vec<Id>,
  pub created_at: i64,
  pub last_update_at: i64,
  pub hints: Vec<String>,
  pub evidence: String,
  pub embedding: Vec<f32>,
}

impl Foreshadowing {
  #[must_use]
  pub fn plant(character_id: impl Into<String>, content: impl Into<String>, importance: f64, evidence: impl Into<String>) -> Self {
    let now = now_ms();
    Self {
      id: Id::new("fsh"),
      character_id: character_id.into(),
      content: content.into(),
      importance: importance.clamp(0.0, 1.0),
      state: ForeshadowingState::Planted,
      related_entities: Vec::new(),
      created_at: now,
      last_update_at: now,
      hints: Vec::new(),
      evidence: evidence.into(),
      embedding: Vec::new(),
    }
  }

  pub fn add_hint(&mut self, hint: impl Into<String>) {
    self.hints.push(hint.into());
    self.last_update_at = now_ms();
    if matches!(self.state, ForeshadowingState::Planted) {
      self.state = ForeshadowingState::Developing;
    }
  }

  pub fn resolve(&mut self) {
    self.state = ForeshadowingState::Resolved;
    self.last_update_at = now_ms();
  }

  pub fn abandon(&mut self) {
    self.state = ForeshadowingState::Abandoned;
    self.last_update_at = now_ms();
  }

  #[must_use]
  pub const fn is_active(&self) -> bool {
    matches!(self.state, ForeshadowingState::Planted | ForeshadowingState::Developing)
  }
}
