use std::collections::HashMap;

use fsrs::{DEFAULT_PARAMETERS, FSRS, FSRS6_DEFAULT_DECAY, MemoryState};
use recall_shared::{Id, RecallError, Result};

const DESIRED_RETENTION: f32 = 0.9;
/// Stability boost ceiling from the surprise signal at creation time
///.
const SURPRISE_BOOST_FACTOR: f32 = 0.5;

fn ms_to_days(elapsed_ms: i64) -> u32 {
  u32::try_from((elapsed_ms / (1000 * 60 * 60 * 24)).clamp(0, 365 * 100)).unwrap_or(0)
}

/// Tracks an FSRS `(stability, difficulty)` pair per memory, used by L9 to
/// compute a slower-forgetting recency decay than a bare exponential for
/// facts that keep getting recalled. Kept as a side table here rather than a field on `Memory`
/// itself, since not every memory is ever retrieved and the state only
/// matters once it has been.
pub struct RetentionTracker {
  fsrs: FSRS,
  states: HashMap<Id, (MemoryState, i64)>,
}

impl RetentionTracker {
  pub fn new() -> Result<Self> {
    let fsrs = FSRS::new(Some(&DEFAULT_PARAMETERS)).map_err(RecallError::backend_unavailable)?;
    Ok(Self { fsrs, states: HashMap::new() })
  }

  /// Seeds the tracker for a freshly created memory, applying the
  /// surprise-based stability boost the reference workspace uses at
  /// creation time.
  pub fn initialize(&mut self, id: Id, surprise: f64, created_at_ms: i64) -> Result<()> {
    let initial = self.fsrs.next_states(None, DESIRED_RETENTION, 0).map_err(RecallError::backend_unavailable)?.good.memory;
    let boosted = MemoryState {
      stability: initial.stability * (1.0 + surprise.clamp(0.0, 1.0) as f32 * SURPRISE_BOOST_FACTOR),
      difficulty: initial.difficulty,
    };
    self.states.insert(id, (boosted, created_at_ms));
    Ok(())
  }

  /// Current retrievability in `[0, 1]` given elapsed time since the last
  /// review; unseen ids (never initialized) are treated as fully
  /// retrievable so the recency term doesn't unfairly punish memories the
  /// tracker hasn't observed yet.
  #[must_use]
  pub fn retrievability(&self, id: &Id, now_ms: i64) -> f64 {
    let Some((state, last_reviewed)) = self.states.get(id) else {
      return 1.0;
    };
    let days = ms_to_days(now_ms - last_reviewed);
    f64::from(self.fsrs.current_retrievability(state.clone(), days, FSRS6_DEFAULT_DECAY))
  }

  /// Records an implicit "good" review: being retrieved reinforces a
  /// memory the same way recalling a flashcard does.
  pub fn reinforce(&mut self, id: &Id, now_ms: i64) -> Result<()> {
    let Some((state, last_reviewed)) = self.states.get(id).cloned() else {
      return Ok(());
    };
    let days = ms_to_days(now_ms - last_reviewed);
    let next = self.fsrs.next_states(Some(state), DESIRED_RETENTION, days).map_err(RecallError::backend_unavailable)?;
    self.states.insert(id.clone(), (next.good.memory, now_ms));
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fresh_memory_is_fully_retrievable() {
    let mut tracker = RetentionTracker::new().unwrap();
    let id = Id::new("mem");
    tracker.initialize(id.clone(), 0.2, 0).unwrap();
    let r = tracker.retrievability(&id, 0);
    assert!(r > 0.9);
  }

  #[test]
  fn retrievability_decays_over_elapsed_days() {
    let mut tracker = RetentionTracker::new().unwrap();
    let id = Id::new("mem");
    tracker.initialize(id.clone(), 0.0, 0).unwrap();
    let day_one = tracker.retrievability(&id, 1000 * 60 * 60 * 24);
    let day_sixty = tracker.retrievability(&id, 1000 * 60 * 60 * 24 * 60);
    assert!(day_sixty < day_one);
  }

  #[test]
  fn untracked_memory_defaults_to_fully_retrievable() {
    let tracker = RetentionTracker::new().unwrap();
    assert_eq!(tracker.retrievability(&Id::new("mem"), 0), 1.0);
  }

  #[test]
  fn reinforcing_a_memory_extends_its_stability() {
    let mut tracker = RetentionTracker::new().unwrap();
    let id = Id::new("mem");
    let far_future = 1000 * 60 * 60 * 24 * 30;
    tracker.initialize(id.clone(), 0.0, 0).unwrap();
    let before = tracker.retrievability(&id, far_future);
    tracker.reinforce(&id, far_future).unwrap();
    let after = tracker.retrievability(&id, far_future);
    assert!(after > before);
  }
}
