use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The fourteen named background task kinds. Mirrors the reference
/// workspace's one-worker-type apalis setup, generalized here since this
/// engine has many more kinds of maintenance work than a single segmentation
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TaskKind {
  EntityExtraction,
  RelationExtraction,
  ContradictionDetection,
  Summarization,
  EpisodeSegmentation,
  ForeshadowingAnalysis,
  ForeshadowingResolution,
  PersistentContextSweep,
  ConsistencyCheck,
  Deduplication,
  Consolidation,
  IndexSnapshot,
  ArchiveSeal,
  CommunityDetection,
}

impl TaskKind {
  #[must_use]
  pub const fn all() -> [TaskKind; 14] {
    [
      TaskKind::EntityExtraction,
      TaskKind::RelationExtraction,
      TaskKind::ContradictionDetection,
      TaskKind::Summarization,
      TaskKind::EpisodeSegmentation,
      TaskKind::ForeshadowingAnalysis,
      TaskKind::ForeshadowingResolution,
      TaskKind::PersistentContextSweep,
      TaskKind::ConsistencyCheck,
      TaskKind::Deduplication,
      TaskKind::Consolidation,
      TaskKind::IndexSnapshot,
      TaskKind::ArchiveSeal,
      TaskKind::CommunityDetection,
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fourteen_named_kinds_are_exposed() {
    assert_eq!(TaskKind::all().len(), 14);
  }

  #[test]
  fn kind_round_trips_through_its_string_form() {
    for kind in TaskKind::all() {
      let text = kind.to_string();
      let parsed: TaskKind = text.parse().unwrap();
      assert_eq!(parsed, kind);
    }
  }
}
