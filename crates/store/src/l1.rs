use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use recall_entities::Memory;
use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

#[derive(Default, Serialize, Deserialize)]
struct ShardFile {
  memories: Vec<Memory>,
}

struct Shard {
  seq: u32,
  memories: HashMap<Id, Memory>,
}

impl Shard {
  fn path(dir: &Path, seq: u32) -> PathBuf {
    dir.join(format!("shard-{seq:04}.json"))
  }

  fn persist(&self, dir: &Path) -> Result<()> {
    let file = ShardFile {
      memories: self.memories.values().cloned().collect(),
    };
    let bytes = serde_json::to_vec(&file)?;
    fs::write(Self::path(dir, self.seq), bytes)?;
    Ok(())
  }
}

/// L1 consolidated long-term store: memories evicted from L2 land here,
/// grouped into capacity-bounded shards.
pub struct ConsolidatedStore {
  dir: PathBuf,
  shard_capacity: usize,
  shards: HashMap<u32, Shard>,
  location: HashMap<Id, u32>,
}

impl ConsolidatedStore {
  #[must_use]
  pub fn new(dir: impl Into<PathBuf>, shard_capacity: usize) -> Self {
    Self {
      dir: dir.into(),
      shard_capacity,
      shards: HashMap::new(),
      location: HashMap::new(),
    }
  }

  pub fn load(dir: impl Into<PathBuf>, shard_capacity: usize) -> Result<Self> {
    let dir = dir.into();
    let mut store = Self {
      dir: dir.clone(),
      shard_capacity,
      shards: HashMap::new(),
      location: HashMap::new(),
    };
    if dir.exists() {
      let mut entries: Vec<(u32, PathBuf)> = Vec::new();
      for entry in fs::read_dir(&dir)?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(seq_str) = name.strip_prefix("shard-").and_then(|s| s.strip_suffix(".json")) {
          if let Ok(seq) = seq_str.parse::<u32>() {
            entries.push((seq, entry.path()));
          }
        }
      }
      for (seq, path) in entries {
        let bytes = fs::read(&path)?;
        let file: ShardFile = serde_json::from_slice(&bytes)?;
        let mut memories = HashMap::new();
        for memory in file.memories {
          store.location.insert(memory.id.clone(), seq);
          memories.insert(memory.id.clone(), memory);
        }
        store.shards.insert(seq, Shard { seq, memories });
      }
    }
    Ok(store)
  }

  /// Picks the newest shard that still has room, or opens a fresh one, and
  /// merges `batch` into it.
  pub fn migrate(&mut self, batch: Vec<Memory>) -> Result<()> {
    fs::create_dir_all(&self.dir)?;
    if batch.is_empty() {
      return Ok(());
    }

    let target_seq = self
      .shards
      .values()
      .filter(|shard| shard.memories.len() < self.shard_capacity)
      .map(|shard| shard.seq)
      .max()
      .unwrap_or_else(|| self.shards.keys().max().map_or(0, |max| max + 1));

    let shard = self.shards.entry(target_seq).or_insert_with(|| Shard {
      seq: target_seq,
      memories: HashMap::new(),
    });

    let mut remaining = Vec::new();
    let mut seq = target_seq;
    for memory in batch {
      if shard.memories.len() >= self.shard_capacity {
        remaining.push(memory);
        continue;
      }
      self.location.insert(memory.id.clone(), seq);
      shard.memories.insert(memory.id.clone(), memory);
    }
    shard.persist(&self.dir)?;
    seq += 1;

    if !remaining.is_empty() {
      let overflow = Shard {
        seq,
        memories: HashMap::new(),
      };
      self.shards.insert(seq, overflow);
      return self.migrate(remaining);
    }
    Ok(())
  }

  pub fn get(&self, id: &Id) -> Option<&Memory> {
    let seq = self.location.get(id)?;
    self.shards.get(seq)?.memories.get(id)
  }

  pub fn remove(&mut self, id: &Id) -> Result<Option<Memory>> {
    let Some(seq) = self.location.remove(id) else {
      return Ok(None);
    };
    let removed = self.shards.get_mut(&seq).and_then(|shard| shard.memories.remove(id));
    if let Some(shard) = self.shards.get(&seq) {
      shard.persist(&self.dir)?;
    }
    Ok(removed)
  }

  pub fn iter(&self) -> impl Iterator<Item = &Memory> {
    self.shards.values().flat_map(|shard| shard.memories.values())
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
  fn migrate_then_get_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ConsolidatedStore::new(dir.path(), 10);
    let m = memory("hello");
    let id = m.id.clone();
    store.migrate(vec![m]).unwrap();
    assert!(store.get(&id).is_some());
  }

  #[test]
  fn overflow_spills_into_a_new_shard() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = ConsolidatedStore::new(dir.path(), 1);
    let a = memory("a");
    let b = memory("b");
    let id_a = a.id.clone();
    let id_b = b.id.clone();
    store.migrate(vec![a, b]).unwrap();
    assert!(store.get(&id_a).is_some());
    assert!(store.get(&id_b).is_some());
  }

  #[test]
  fn reload_rebuilds_location_map() {
    let dir = tempfile::tempdir().unwrap();
    let id;
    {
      let mut store = ConsolidatedStore::new(dir.path(), 10);
      let m = memory("hello");
      id = m.id.clone();
      store.migrate(vec![m]).unwrap();
    }
    let reloaded = ConsolidatedStore::load(dir.path(), 10).unwrap();
    assert!(reloaded.get(&id).is_some());
  }
}
