use recall_shared::{Id, now_ms};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ContradictionKind {
  Attribute,
  Relationship,
  State,
  Timeline,
  Rule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionStrategy {
  Supersede,
  Coexist,
  Reject,
  Manual,
}

/// A detected conflict between two facts about the same subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contradiction {
  pub id: Id,
  pub fact_a: Id,
  pub fact_b: Id,
  pub kind: ContradictionKind,
  pub strategy: ResolutionStrategy,
  pub resolved: bool,
  pub resolved_at: Option<i64>,
}

impl Contradiction {
  #[must_use]
  pub fn new(fact_a: Id, fact_b: Id, kind: ContradictionKind, strategy: ResolutionStrategy) -> Self {
    Self {
      id: Id::new("ctr"),
      fact_a,
      fact_b,
      kind,
      strategy,
      resolved: !matches!(strategy, ResolutionStrategy::Manual),
      resolved_at: if matches!(strategy, ResolutionStrategy::Manual) {
        None
      } else {
        Some(now_ms())
      },
    }
  }

  pub fn resolve_manually(&mut self, strategy: ResolutionStrategy) {
    self.strategy = strategy;
    self.resolved = true;
    self.resolved_at = Some(now_ms());
  }
}
