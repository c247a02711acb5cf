use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

use crate::persist::WalSnapshot;

/// Membership filter over every `memory-id` ever written. Target
/// false-positive rate 1%; used only as a fast negative check ahead of L2+
/// so a doomed-to-miss query skips the rest of the funnel.
pub struct BloomIndex {
  bits: Vec<u64>,
  num_hashes: u32,
  len_bits: u64,
  persist: WalSnapshot,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
  bits: Vec<u64>,
  num_hashes: u32,
  len_bits: u64,
}

impl Default for Snapshot {
  fn default() -> Self {
    BloomIndex::sized_for(1_000_000)
  }
}

#[derive(Serialize, Deserialize)]
enum Op {
  Add(String),
}

impl BloomIndex {
  /// Sizes the bit array for `expected_items` at a 1% target FPR, using the
  /// standard `m = -n*ln(p)/(ln 2)^2`, `k = (m/n)*ln 2` formulas.
  fn sized_for(expected_items: u64) -> Snapshot {
    let n = expected_items.max(1) as f64;
    let p = 0.01_f64;
    let m = (-n * p.ln() / (2f64.ln().powi(2))).ceil() as u64;
    let k = ((m as f64 / n) * 2f64.ln()).ceil().clamp(1.0, 16.0) as u32;
    let words = m.div_ceil(64).max(1);
    Snapshot {
      bits: vec![0u64; words as usize],
      num_hashes: k,
      len_bits: words * 64,
    }
  }

  #[must_use]
  pub fn new(dir: impl AsRef<Path>, expected_items: u64) -> Self {
    let persist = WalSnapshot::new(dir, "bloom");
    let snap = Self::sized_for(expected_items);
    Self {
      bits: snap.bits,
      num_hashes: snap.num_hashes,
      len_bits: snap.len_bits,
      persist,
    }
  }

  /// Loads from `dir`, rebuilding via WAL replay if no snapshot exists yet.
  pub fn load(dir: impl AsRef<Path>, expected_items: u64) -> Result<Self> {
    let persist = WalSnapshot::new(dir, "bloom");
    let snap: Snapshot = persist.load(|state: &mut Snapshot, op| match op {
      Op::Add(id) => Self::set_bits(&mut state.bits, state.len_bits, state.num_hashes, &id),
    })?;
    let snap = if snap.bits.is_empty() { Self::sized_for(expected_items) } else { snap };
    Ok(Self {
      bits: snap.bits,
      num_hashes: snap.num_hashes,
      len_bits: snap.len_bits,
      persist,
    })
  }

  fn hash_n(id: &str, seed: u32) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    id.hash(&mut hasher);
    hasher.finish()
  }

  fn set_bits(bits: &mut [u64], len_bits: u64, num_hashes: u32, id: &str) {
    for i in 0..num_hashes {
      let h = Self::hash_n(id, i) % len_bits;
      bits[(h / 64) as usize] |= 1 << (h % 64);
    }
  }

  pub fn add(&mut self, id: &Id) -> Result<()> {
    Self::set_bits(&mut self.bits, self.len_bits, self.num_hashes, id.as_str());
    self.persist.append(&Op::Add(id.as_str().to_owned()))
  }

  /// `true` means "maybe present"; `false` means "definitely absent".
  #[must_use]
  pub fn might_contain(&self, id: &Id) -> bool {
    (0..self.num_hashes).all(|i| {
      let h = Self::hash_n(id.as_str(), i) % self.len_bits;
      self.bits[(h / 64) as usize] & (1 << (h % 64)) != 0
    })
  }

  pub fn snapshot(&mut self) -> Result<()> {
    let snap = Snapshot {
      bits: self.bits.clone(),
      num_hashes: self.num_hashes,
      len_bits: self.len_bits,
    };
    self.persist.snapshot(&snap)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn never_false_negative() {
    let dir = tempfile::tempdir().unwrap();
    let mut bloom = BloomIndex::new(dir.path(), 1000);
    let ids: Vec<Id> = (0..200).map(|_| Id::new("mem")).collect();
    for id in &ids {
      bloom.add(id).unwrap();
    }
    for id in &ids {
      assert!(bloom.might_contain(id));
    }
  }

  #[test]
  fn absent_id_usually_not_contained() {
    let dir = tempfile::tempdir().unwrap();
    let mut bloom = BloomIndex::new(dir.path(), 1000);
    for _ in 0..100 {
      bloom.add(&Id::new("mem")).unwrap();
    }
    let false_positives = (0..200).filter(|_| bloom.might_contain(&Id::new("mem"))).count();
    assert!(false_positives < 20, "false positive rate too high: {false_positives}/200");
  }

  #[test]
  fn reloads_from_wal() {
    let dir = tempfile::tempdir().unwrap();
    let id = Id::new("mem");
    {
      let mut bloom = BloomIndex::new(dir.path(), 1000);
      bloom.add(&id).unwrap();
    }
    let reloaded = BloomIndex::load(dir.path(), 1000).unwrap();
    assert!(reloaded.might_contain(&id));
  }
}
