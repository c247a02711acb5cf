use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use recall_entities::Memory;
use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
  memories: Vec<Memory>,
}

/// L2 working set: a bounded, hand-rolled LRU cache over the most recently
/// touched memories. Unlike the indexes
/// in `recall-index`, the whole set is small enough that persistence is a
/// single full rewrite rather than a WAL.
pub struct WorkingSet {
  path: PathBuf,
  capacity: usize,
  entries: HashMap<Id, Memory>,
  /// Least-recently-used at the front, most-recently-used at the back.
  order: VecDeque<Id>,
}

impl WorkingSet {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>, capacity: usize) -> Self {
    Self {
      path: dir.as_ref().join("state.json"),
      capacity,
      entries: HashMap::new(),
      order: VecDeque::new(),
    }
  }

  pub fn load(dir: impl AsRef<Path>, capacity: usize) -> Result<Self> {
    let path = dir.as_ref().join("state.json");
    let mut set = Self {
      path: path.clone(),
      capacity,
      entries: HashMap::new(),
      order: VecDeque::new(),
    };
    if path.exists() {
      let bytes = fs::read(&path)?;
      let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
      for memory in snapshot.memories {
        set.order.push_back(memory.id.clone());
        set.entries.insert(memory.id.clone(), memory);
      }
    }
    Ok(set)
  }

  fn touch(&mut self, id: &Id) {
    if let Some(pos) = self.order.iter().position(|existing| existing == id) {
      self.order.remove(pos);
      self.order.push_back(id.clone());
    }
  }

  /// Inserts (or refreshes) `memory`, evicting the least-recently-used
  /// entry if the set is now over capacity. The evicted memory, if any, is
  /// handed back so the caller can migrate it into L1.
  pub fn put(&mut self, memory: Memory) -> Option<Memory> {
    let id = memory.id.clone();
    if self.entries.insert(id.clone(), memory).is_some() {
      self.touch(&id);
      return None;
    }
    self.order.push_back(id);
    if self.order.len() > self.capacity {
      let evict_id = self.order.pop_front().expect("order non-empty, just grew past capacity");
      return self.entries.remove(&evict_id);
    }
    None
  }

  pub fn get(&mut self, id: &Id) -> Option<&Memory> {
    if self.entries.contains_key(id) {
      self.touch(id);
      self.entries.get(id)
    } else {
      None
    }
  }

  pub fn remove(&mut self, id: &Id) -> Option<Memory> {
    if let Some(pos) = self.order.iter().position(|existing| existing == id) {
      self.order.remove(pos);
    }
    self.entries.remove(id)
  }

  pub fn contains(&self, id: &Id) -> bool {
    self.entries.contains_key(id)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Memory> {
    self.entries.values()
  }

  pub fn flush(&self) -> Result<()> {
    let memories: Vec<Memory> = self.order.iter().filter_map(|id| self.entries.get(id).cloned()).collect();
    let bytes = serde_json::to_vec(&Snapshot { memories })?;
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(&self.path, bytes)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use recall_entities::MemoryRole;

  use super::*;

  fn memory(content: &str) -> Memory {
    Memory::builder(content, MemoryRole::User, "u1", "s1").build()
  }

  #[test]
  fn evicts_least_recently_used_past_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let mut set = WorkingSet::new(dir.path(), 2);
    let a = memory("a");
    let b = memory("b");
    let c = memory("c");
    let id_a = a.id.clone();
    assert!(set.put(a).is_none());
    assert!(set.put(b).is_none());
    let evicted = set.put(c);
    assert_eq!(evicted.unwrap().id, id_a);
  }

  #[test]
  fn get_refreshes_recency() {
    let dir = tempfile::tempdir().unwrap();
    let mut set = WorkingSet::new(dir.path(), 2);
    let a = memory("a");
    let b = memory("b");
    let c = memory("c");
    let id_a = a.id.clone();
    let id_b = b.id.clone();
    set.put(a);
    set.put(b);
    set.get(&id_a); // touch a, so b becomes the LRU entry
    let evicted = set.put(c);
    assert_eq!(evicted.unwrap().id, id_b);
  }

  #[test]
  fn flush_and_reload_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let mut set = WorkingSet::new(dir.path(), 10);
    let m = memory("hello");
    let id = m.id.clone();
    set.put(m);
    set.flush().unwrap();
    let mut reloaded = WorkingSet::load(dir.path(), 10).unwrap();
    assert!(reloaded.get(&id).is_some());
  }
}
