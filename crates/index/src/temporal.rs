use std::path::Path;

use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

use crate::persist::WalSnapshot;

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
  /// Kept sorted by timestamp at all times; `snapshot()` is the only place
  /// that re-sorts after a batch of WAL-replayed inserts.
  entries: Vec<(i64, Id)>,
}

#[derive(Serialize, Deserialize)]
enum Op {
  Add(i64, Id),
  Remove(Id),
}

/// Sorted `(timestamp, memory-id)` array with binary-search range queries,
/// `O(log n + k)`. Backs retrieval stage L2 and `query_at_time`
/// style lookups elsewhere.
pub struct TemporalIndex {
  entries: Vec<(i64, Id)>,
  persist: WalSnapshot,
}

impl TemporalIndex {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      entries: Vec::new(),
      persist: WalSnapshot::new(dir, "temporal"),
    }
  }

  pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
    let persist = WalSnapshot::new(dir, "temporal");
    let mut snap: Snapshot = persist.load(|state: &mut Snapshot, op| match op {
      Op::Add(ts, id) => state.entries.push((ts, id)),
      Op::Remove(id) => state.entries.retain(|(_, existing)| existing != &id),
    })?;
    snap.entries.sort_by_key(|(ts, _)| *ts);
    Ok(Self {
      entries: snap.entries,
      persist,
    })
  }

  pub fn add(&mut self, id: &Id, timestamp: i64) -> Result<()> {
    let pos = self.entries.partition_point(|(ts, _)| *ts <= timestamp);
    self.entries.insert(pos, (timestamp, id.clone()));
    self.persist.append(&Op::Add(timestamp, id.clone()))
  }

  pub fn remove(&mut self, id: &Id) -> Result<()> {
    self.entries.retain(|(_, existing)| existing != id);
    self.persist.append(&Op::Remove(id.clone()))
  }

  /// Every memory-id with `since <= timestamp <= until`, oldest first.
  #[must_use]
  pub fn range(&self, since: i64, until: i64, k: usize) -> Vec<Id> {
    let start = self.entries.partition_point(|(ts, _)| *ts < since);
    self.entries[start..]
      .iter()
      .take_while(|(ts, _)| *ts <= until)
      .take(k)
      .map(|(_, id)| id.clone())
      .collect()
  }

  pub fn snapshot(&mut self) -> Result<()> {
    let snap = Snapshot {
      entries: self.entries.clone(),
    };
    self.persist.snapshot(&snap)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn range_query_is_ordered_and_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = TemporalIndex::new(dir.path());
    let ids: Vec<Id> = (0..5).map(|_| Id::new("mem")).collect();
    for (i, id) in ids.iter().enumerate() {
      idx.add(id, i as i64 * 100).unwrap();
    }
    let hits = idx.range(100, 300, 10);
    assert_eq!(hits, vec![ids[1].clone(), ids[2].clone(), ids[3].clone()]);
  }

  #[test]
  fn remove_drops_entry() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = TemporalIndex::new(dir.path());
    let id = Id::new("mem");
    idx.add(&id, 10).unwrap();
    idx.remove(&id).unwrap();
    assert!(idx.range(0, 100, 10).is_empty());
  }
}
