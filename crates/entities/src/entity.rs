use std::collections::{HashMap, HashSet};

use recall_shared::now_ms;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
  Person,
  Place,
  Org,
  Object,
  Concept,
  Custom,
}

/// A node in the knowledge graph. `(name, type)` is the
/// unique key — callers normalize `name` (lowercase, trimmed) before
/// constructing one so the graph's alias map stays consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
  pub name: String,
  pub entity_type: EntityType,
  pub aliases: HashSet<String>,
  pub attributes: HashMap<String, String>,
  pub summary: Option<String>,
  pub created_at: i64,
  pub last_mentioned_at: i64,
  pub mention_count: u64,
}

/// `(name, type)` uniqueness key, normalized at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKey {
  pub name: String,
  pub entity_type: EntityType,
}

impl EntityKey {
  #[must_use]
  pub fn new(name: &str, entity_type: EntityType) -> Self {
    Self {
      name: normalize_name(name),
      entity_type,
    }
  }
}

/// Lowercase + collapse internal whitespace, the normalization the graph's
/// alias map keys on.
#[must_use]
pub fn normalize_name(name: &str) -> String {
  name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl Entity {
  #[must_use]
  pub fn new(name: &str, entity_type: EntityType) -> Self {
    let now = now_ms();
    Self {
      name: normalize_name(name),
      entity_type,
      aliases: HashSet::new(),
      attributes: HashMap::new(),
      summary: None,
      created_at: now,
      last_mentioned_at: now,
      mention_count: 1,
    }
  }

  #[must_use]
  pub fn key(&self) -> EntityKey {
    EntityKey::new(&self.name, self.entity_type)
  }

  /// Record another mention, bumping `last_mentioned_at`/`mention_count`.
  pub fn touch(&mut self) {
    self.last_mentioned_at = now_ms();
    self.mention_count += 1;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalization_collapses_case_and_whitespace() {
    assert_eq!(normalize_name("  Alice   Smith "), "alice smith");
  }

  #[test]
  fn same_key_for_same_name_type() {
    let a = EntityKey::new("Alice", EntityType::Person);
    let b = EntityKey::new("alice", EntityType::Person);
    assert_eq!(a, b);
  }
}
