use std::collections::HashSet;

use recall_shared::{Id, now_ms};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::entity::EntityKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FactStatus {
  Active,
  Superseded,
  Rejected,
}

/// Either a reference to another entity, or a literal value (e.g.
/// `hair_color = "black"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactObject {
  Entity(EntityKey),
  Literal(String),
}

impl FactObject {
  #[must_use]
  pub fn as_literal(&self) -> Option<&str> {
    match self {
      Self::Literal(s) => Some(s),
      Self::Entity(_) => None,
    }
  }
}

/// A subject–predicate–object triple with the three-time model.
/// `fact_time` is when it was true in the world; `knowledge_time` is when
/// the system learned it (populated as `now()` at extraction time);
/// `system_time` is when the record was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
  pub id: Id,
  pub subject: EntityKey,
  pub predicate: String,
  pub object: FactObject,
  pub fact_time: Option<i64>,
  pub knowledge_time: i64,
  pub system_time: i64,
  pub confidence: f64,
  pub source_memory_ids: HashSet<Id>,
  pub status: FactStatus,
  pub superseded_by: Option<Id>,
  pub coexist_label: Option<String>,
}

impl Fact {
  #[must_use]
  pub fn new(subject: EntityKey, predicate: impl Into<String>, object: FactObject, confidence: f64) -> Self {
    let now = now_ms();
    Self {
      id: Id::new("fact"),
      subject,
      predicate: predicate.into(),
      object,
      fact_time: None,
      knowledge_time: now,
      system_time: now,
      confidence: confidence.clamp(0.0, 1.0),
      source_memory_ids: HashSet::new(),
      status: FactStatus::Active,
      superseded_by: None,
      coexist_label: None,
    }
  }

  /// `(subject, predicate, object)` triple identity, used to enforce that
  /// at most one `ACTIVE` fact exists per triple.
  #[must_use]
  pub fn triple_key(&self) -> (EntityKey, String, FactObject) {
    (self.subject.clone(), self.predicate.clone(), self.object.clone())
  }

  #[must_use]
  pub const fn is_active(&self) -> bool {
    matches!(self.status, FactStatus::Active)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entity::EntityType;

  #[test]
  fn system_time_ge_knowledge_time() {
    let f = Fact::new(
      EntityKey::new("Bob", EntityType::Person),
      "hair_color",
      FactObject::Literal("black".to_owned()),
      0.9,
    );
    assert!(f.system_time >= f.knowledge_time);
  }
}
