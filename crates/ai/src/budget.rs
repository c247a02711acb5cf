use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Admits an LLM call only if hourly/daily limits would not be violated
///. `BudgetExceeded` callers
/// downgrade to rule-based fallback (analyzers) or skip a retriever stage.
pub struct BudgetManager {
  hourly_limit: Option<u32>,
  daily_limit: Option<u32>,
  calls: Mutex<VecDeque<Instant>>,
}

impl BudgetManager {
  #[must_use]
  pub fn new(hourly_limit: Option<u32>, daily_limit: Option<u32>) -> Self {
    Self {
      hourly_limit,
      daily_limit,
      calls: Mutex::new(VecDeque::new()),
    }
  }

  fn count_within(calls: &VecDeque<Instant>, now: Instant, window: Duration) -> u32 {
    calls.iter().filter(|&&t| now.duration_since(t) <= window).count() as u32
  }

  /// Returns `true` and records the call if admitted; `false` if the
  /// budget is exhausted for the relevant window.
  pub fn try_admit(&self) -> bool {
    let now = Instant::now();
    let mut calls = self.calls.lock().expect("budget lock poisoned");

    while let Some(&front) = calls.front() {
      if now.duration_since(front) > Duration::from_secs(24 * 3600) {
        calls.pop_front();
      } else {
        break;
      }
    }

    if let Some(limit) = self.hourly_limit {
      if Self::count_within(&calls, now, Duration::from_secs(3600)) >= limit {
        return false;
      }
    }
    if let Some(limit) = self.daily_limit {
      if Self::count_within(&calls, now, Duration::from_secs(24 * 3600)) >= limit {
        return false;
      }
    }

    calls.push_back(now);
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hourly_limit_is_enforced() {
    let budget = BudgetManager::new(Some(2), None);
    assert!(budget.try_admit());
    assert!(budget.try_admit());
    assert!(!budget.try_admit());
  }

  #[test]
  fn unlimited_when_not_configured() {
    let budget = BudgetManager::new(None, None);
    for _ in 0..100 {
      assert!(budget.try_admit());
    }
  }
}
