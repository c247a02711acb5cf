use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opens after `threshold` consecutive failures and stays open for
/// `cooldown_secs`, after which a single probe call is allowed through
/// (half-open).
pub struct CircuitBreaker {
  threshold: u32,
  cooldown_secs: u64,
  consecutive_failures: AtomicU32,
  opened_at_epoch_secs: AtomicU64,
}

impl CircuitBreaker {
  #[must_use]
  pub fn new(threshold: u32, cooldown_secs: u64) -> Self {
    Self {
      threshold,
      cooldown_secs,
      consecutive_failures: AtomicU32::new(0),
      opened_at_epoch_secs: AtomicU64::new(0),
    }
  }

  fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
  }

  #[must_use]
  pub fn is_open(&self) -> bool {
    let opened_at = self.opened_at_epoch_secs.load(Ordering::Acquire);
    if opened_at == 0 {
      return false;
    }
    Self::now_secs().saturating_sub(opened_at) < self.cooldown_secs
  }

  pub fn record_success(&self) {
    self.consecutive_failures.store(0, Ordering::Release);
    self.opened_at_epoch_secs.store(0, Ordering::Release);
  }

  pub fn record_failure(&self) {
    let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
    if failures >= self.threshold {
      self.opened_at_epoch_secs.store(Self::now_secs(), Ordering::Release);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn opens_after_threshold_failures() {
    let cb = CircuitBreaker::new(3, 60);
    assert!(!cb.is_open());
    cb.record_failure();
    cb.record_failure();
    assert!(!cb.is_open());
    cb.record_failure();
    assert!(cb.is_open());
  }

  #[test]
  fn success_resets() {
    let cb = CircuitBreaker::new(2, 60);
    cb.record_failure();
    cb.record_success();
    cb.record_failure();
    assert!(!cb.is_open());
  }
}
