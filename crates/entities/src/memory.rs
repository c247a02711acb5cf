use std::collections::{HashMap, HashSet};

use recall_shared::{Id, now_ms};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MemoryRole {
  User,
  Assistant,
  System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
  Ephemeral,
  Low,
  Normal,
  High,
  Critical,
}

impl Default for Priority {
  fn default() -> Self {
    Self::Normal
  }
}

/// One narrative segmentation boundary kind, used by the L9 reranker's
/// retrieval boost. Supplemental field grounded on the reference
/// workspace's `BoundaryType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BoundaryKind {
  TemporalGap,
  ContentShift,
  GoalCompletion,
  PredictionError,
}

impl BoundaryKind {
  /// Multiplier folded into the L9 score.
  #[must_use]
  pub fn retrieval_boost(self, surprise: f64) -> f64 {
    match self {
      Self::PredictionError => 1.3 + 0.2 * surprise,
      Self::GoalCompletion => 1.2,
      Self::ContentShift => 1.0,
      Self::TemporalGap => 0.9,
    }
  }
}

/// One turn of conversation persisted to the layered store.
/// Immutable after dedup resolution; logical deletion sets `deleted_at`
/// without removing the archive copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
  pub id: Id,
  pub content: String,
  pub role: MemoryRole,
  pub user_id: String,
  pub session_id: String,
  pub character_id: Option<String>,
  pub turn_seq: i64,
  pub embedding: Vec<f32>,
  pub tokens: Vec<String>,
  pub entities: Vec<Id>,
  pub source: Option<String>,
  pub tags: HashSet<String>,
  pub category: Option<String>,
  pub content_type: Option<String>,
  pub priority: Priority,
  pub boundary_kind: Option<BoundaryKind>,
  pub surprise: f64,
  pub created_at: i64,
  pub deleted_at: Option<i64>,
  /// Unknown/forward-compatible metadata, carried verbatim.
  pub extras: HashMap<String, String>,
}

impl Memory {
  #[must_use]
  pub fn builder(content: impl Into<String>, role: MemoryRole, user_id: impl Into<String>, session_id: impl Into<String>) -> MemoryBuilder {
    MemoryBuilder::new(content, role, user_id, session_id)
  }

  #[must_use]
  pub const fn is_deleted(&self) -> bool {
    self.deleted_at.is_some()
  }
}

/// Builder mirroring the reference workspace's preference for explicit
/// constructor functions over directly public all-field structs for
/// records with many optional fields.
pub struct MemoryBuilder {
  memory: Memory,
}

impl MemoryBuilder {
  fn new(content: impl Into<String>, role: MemoryRole, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
    Self {
      memory: Memory {
        id: Id::new("mem"),
        content: content.into(),
        role,
        user_id: user_id.into(),
        session_id: session_id.into(),
        character_id: None,
        turn_seq: 0,
        embedding: Vec::new(),
        tokens: Vec::new(),
        entities: Vec::new(),
        source: None,
        tags: HashSet::new(),
        category: None,
        content_type: None,
        priority: Priority::default(),
        boundary_kind: None,
        surprise: 0.0,
        created_at: now_ms(),
        deleted_at: None,
        extras: HashMap::new(),
      },
    }
  }

  #[must_use]
  pub fn turn_seq(mut self, v: i64) -> Self {
    self.memory.turn_seq = v;
    self
  }

  #[must_use]
  pub fn character_id(mut self, v: impl Into<String>) -> Self {
    self.memory.character_id = Some(v.into());
    self
  }

  #[must_use]
  pub fn embedding(mut self, v: Vec<f32>) -> Self {
    self.memory.embedding = v;
    self
  }

  #[must_use]
  pub fn tokens(mut self, v: Vec<String>) -> Self {
    self.memory.tokens = v;
    self
  }

  #[must_use]
  pub fn entities(mut self, v: Vec<Id>) -> Self {
    self.memory.entities = v;
    self
  }

  #[must_use]
  pub fn tags(mut self, v: HashSet<String>) -> Self {
    self.memory.tags = v;
    self
  }

  #[must_use]
  pub fn priority(mut self, v: Priority) -> Self {
    self.memory.priority = v;
    self
  }

  #[must_use]
  pub fn build(self) -> Memory {
    self.memory
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_sets_defaults() {
    let m = Memory::builder("hello", MemoryRole::User, "u1", "s1").build();
    assert_eq!(m.priority, Priority::Normal);
    assert!(!m.is_deleted());
  }
}
