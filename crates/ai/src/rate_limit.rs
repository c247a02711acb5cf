use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window rate limiter: `N requests / W seconds`.
pub struct SlidingWindowLimiter {
  window: Duration,
  max_requests: u32,
  timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
  #[must_use]
  pub fn new(max_requests: u32, window: Duration) -> Self {
    Self {
      window,
      max_requests,
      timestamps: Mutex::new(VecDeque::new()),
    }
  }

  fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
    while let Some(&front) = timestamps.front() {
      if now.duration_since(front) > self.window {
        timestamps.pop_front();
      } else {
        break;
      }
    }
  }

  /// Returns `true` and records the request if it fits the window;
  /// `false` if the caller should back off.
  pub fn try_acquire(&self) -> bool {
    let now = Instant::now();
    let mut timestamps = self.timestamps.lock().expect("limiter lock poisoned");
    self.prune(&mut timestamps, now);
    if timestamps.len() as u32 >= self.max_requests {
      return false;
    }
    timestamps.push_back(now);
    true
  }

  /// Async wait-and-acquire: polls until a slot frees up or `deadline`
  /// elapses.
  pub async fn acquire(&self, deadline: Duration) -> bool {
    let start = Instant::now();
    loop {
      if self.try_acquire() {
        return true;
      }
      if start.elapsed() >= deadline {
        return false;
      }
      tokio::time::sleep(Duration::from_millis(20)).await;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn denies_after_limit_reached() {
    let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(60));
    assert!(limiter.try_acquire());
    assert!(limiter.try_acquire());
    assert!(!limiter.try_acquire());
  }
}
