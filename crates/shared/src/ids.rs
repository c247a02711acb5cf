use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A globally unique id: a monotonic counter plus a random suffix, so ids
/// sort in insertion order (useful for `turn_seq`-adjacent ordering checks)
/// while still being collision-resistant across process restarts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
  /// Mint a new id scoped under `prefix` (e.g. `"mem"`, `"ent"`, `"fact"`).
  #[must_use]
  pub fn new(prefix: &str) -> Self {
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix: u32 = rand::thread_rng().r#gen();
    Self(format!("{prefix}_{seq:016x}_{suffix:08x}"))
  }

  #[must_use]
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Id {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<String> for Id {
  fn from(s: String) -> Self {
    Self(s)
  }
}

impl From<&str> for Id {
  fn from(s: &str) -> Self {
    Self(s.to_owned())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ids_are_monotonic_and_unique() {
    let a = Id::new("mem");
    let b = Id::new("mem");
    assert_ne!(a, b);
    assert!(a < b, "ids should sort in mint order");
  }

  #[test]
  fn prefix_is_preserved() {
    let id = Id::new("ent");
    assert!(id.as_str().starts_with("ent_"));
  }
}
