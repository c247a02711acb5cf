use std::collections::HashMap;

use recall_entities::{ContextType, PersistentContextItem};
use recall_shared::{now_ms, Id, PersistentContextConfig};
use tracing::info;

/// Enforces the `max_per_type`/`max_total` caps over the set of active
/// (non-archived) persistent-context items and ages items out by decayed
/// confidence.
pub struct PersistentContextTracker {
  config: PersistentContextConfig,
  items: HashMap<Id, PersistentContextItem>,
}

impl PersistentContextTracker {
  #[must_use]
  pub fn new(config: PersistentContextConfig) -> Self {
    Self { config, items: HashMap::new() }
  }

  fn active(&self) -> impl Iterator<Item = &PersistentContextItem> {
    self.items.values().filter(|item| !item.archived)
  }

  fn active_of_type(&self, context_type: ContextType) -> Vec<&PersistentContextItem> {
    self.active().filter(|item| item.context_type == context_type).collect()
  }

  /// Evicts (archives) the lowest-decayed-confidence active item of the
  /// given type, if any exist.
  fn evict_lowest_confidence(&mut self, context_type: Option<ContextType>) {
    let now = now_ms();
    let victim = self
      .items
      .values()
      .filter(|item| !item.archived)
      .filter(|item| context_type.is_none_or(|t| item.context_type == t))
      .min_by(|a, b| a.decayed_confidence(now, self.config.decay_days).total_cmp(&b.decayed_confidence(now, self.config.decay_days)))
      .map(|item| item.id.clone());
    if let Some(id) = victim {
      if let Some(item) = self.items.get_mut(&id) {
        item.archived = true;
        info!(context_id = %id, "evicted persistent-context item for capacity");
      }
    }
  }

  /// Inserts a newly-observed context item, enforcing the per-type and
  /// total caps by evicting the weakest active item of the same type
  /// (or, if the type itself is already below cap, the weakest active
  /// item overall) before admitting the new one.
  pub fn observe(&mut self, item: PersistentContextItem) -> Id {
    let context_type = item.context_type;
    if self.active_of_type(context_type).len() >= self.config.max_per_type {
      self.evict_lowest_confidence(Some(context_type));
    }
    if self.active().count() >= self.config.max_total {
      self.evict_lowest_confidence(None);
    }
    let id = item.id.clone();
    self.items.insert(id.clone(), item);
    id
  }

  pub fn reobserve(&mut self, id: &Id) -> bool {
    if let Some(item) = self.items.get_mut(id) {
      item.reobserve();
      true
    } else {
      false
    }
  }

  /// Archives any active item whose decayed confidence has fallen below
  /// `min_confidence`. Returns the ids archived.
  pub fn sweep_decayed(&mut self) -> Vec<Id> {
    let now = now_ms();
    let mut archived = Vec::new();
    for item in self.items.values_mut() {
      if item.archived {
        continue;
      }
      if item.decayed_confidence(now, self.config.decay_days) < self.config.min_confidence {
        item.archived = true;
        archived.push(item.id.clone());
      }
    }
    archived
  }

  #[must_use]
  pub fn get(&self, id: &Id) -> Option<&PersistentContextItem> {
    self.items.get(id)
  }

  #[must_use]
  pub fn active_items(&self, user_id: &str) -> Vec<&PersistentContextItem> {
    self.active().filter(|item| item.user_id == user_id).collect()
  }

  /// Items unseen for at least `reminder_turns`-worth of elapsed wall
  /// time (approximated by `reminder_turns` turns at one per minute,
  /// since this tracker has no turn counter of its own) whose confidence
  /// still clears `reminder_importance_threshold`. Callers drive the
  /// actual turn-based cadence; this just filters by the configured
  /// threshold on demand.
  #[must_use]
  pub fn reminder_candidates(&self, user_id: &str, min_confidence: f64) -> Vec<&PersistentContextItem> {
    self.active_items(user_id).into_iter().filter(|item| item.confidence >= min_confidence).collect()
  }

  /// Count of active (non-archived) items across every user, for the
  /// stats operation.
  #[must_use]
  pub fn active_count(&self) -> usize {
    self.active().count()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn item(context_type: ContextType, confidence: f64) -> PersistentContextItem {
    PersistentContextItem::new(context_type, "some fact", confidence, "user1", "sess1")
  }

  #[test]
  fn observing_under_cap_keeps_everything_active() {
    let mut tracker = PersistentContextTracker::new(PersistentContextConfig::default());
    for _ in 0..3 {
      tracker.observe(item(ContextType::UserGoal, 0.9));
    }
    assert_eq!(tracker.active_items("user1").len(), 3);
  }

  #[test]
  fn exceeding_max_per_type_evicts_the_weakest() {
    let config = PersistentContextConfig { max_per_type: 2, ..PersistentContextConfig::default() };
    let mut tracker = PersistentContextTracker::new(config);
    let weak = item(ContextType::UserGoal, 0.1);
    let weak_id = weak.id.clone();
    tracker.observe(weak);
    tracker.observe(item(ContextType::UserGoal, 0.9));
    tracker.observe(item(ContextType::UserGoal, 0.95));
    assert_eq!(tracker.active_items("user1").len(), 2);
    assert!(tracker.get(&weak_id).unwrap().archived);
  }

  #[test]
  fn sweep_decayed_archives_items_below_min_confidence() {
    let config = PersistentContextConfig { min_confidence: 0.5, decay_days: 0, ..PersistentContextConfig::default() };
    let mut tracker = PersistentContextTracker::new(config);
    let low = item(ContextType::WorldFact, 0.2);
    let low_id = low.id.clone();
    tracker.observe(low);
    let archived = tracker.sweep_decayed();
    assert_eq!(archived, vec![low_id]);
  }
}
