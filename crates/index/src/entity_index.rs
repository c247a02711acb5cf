use std::collections::{HashMap, HashSet};
use std::path::Path;

use recall_entities::EntityKey;
use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

use crate::persist::WalSnapshot;

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
  postings: HashMap<EntityKeyOwned, HashSet<Id>>,
}

/// `EntityKey` doesn't implement `Serialize` with a stable map-key
/// representation by default (serde_json requires string map keys), so the
/// index stores `"name|TYPE"` strings internally and reconstitutes on read.
type EntityKeyOwned = String;

fn key_to_string(key: &EntityKey) -> EntityKeyOwned {
  format!("{}|{}", key.name, key.entity_type)
}

#[derive(Serialize, Deserialize)]
enum Op {
  Add(EntityKeyOwned, Id),
  Remove(Id),
}

/// `entity-key -> memory-ids mentioning it`. Backs retrieval stage
/// L4 and graph-adjacent entity lookups.
pub struct EntityIndex {
  postings: HashMap<EntityKeyOwned, HashSet<Id>>,
  mentions_by_memory: HashMap<Id, Vec<EntityKeyOwned>>,
  persist: WalSnapshot,
}

impl EntityIndex {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      postings: HashMap::new(),
      mentions_by_memory: HashMap::new(),
      persist: WalSnapshot::new(dir, "entity"),
    }
  }

  pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
    let persist = WalSnapshot::new(dir, "entity");
    let snap: Snapshot = persist.load(|state: &mut Snapshot, op| match op {
      Op::Add(key, id) => {
        state.postings.entry(key).or_default().insert(id);
      }
      Op::Remove(id) => {
        for list in state.postings.values_mut() {
          list.remove(&id);
        }
      }
    })?;
    let mut mentions_by_memory: HashMap<Id, Vec<EntityKeyOwned>> = HashMap::new();
    for (key, ids) in &snap.postings {
      for id in ids {
        mentions_by_memory.entry(id.clone()).or_default().push(key.clone());
      }
    }
    Ok(Self {
      postings: snap.postings,
      mentions_by_memory,
      persist,
    })
  }

  pub fn add(&mut self, id: &Id, keys: &[EntityKey]) -> Result<()> {
    for key in keys {
      let k = key_to_string(key);
      self.postings.entry(k.clone()).or_default().insert(id.clone());
      self.mentions_by_memory.entry(id.clone()).or_default().push(k.clone());
      self.persist.append(&Op::Add(k, id.clone()))?;
    }
    Ok(())
  }

  pub fn remove(&mut self, id: &Id) -> Result<()> {
    if let Some(keys) = self.mentions_by_memory.remove(id) {
      for key in keys {
        if let Some(list) = self.postings.get_mut(&key) {
          list.remove(id);
        }
      }
    }
    self.persist.append(&Op::Remove(id.clone()))
  }

  #[must_use]
  pub fn query(&self, keys: &[EntityKey], k: usize) -> Vec<(Id, f64)> {
    let mut scores: HashMap<Id, u32> = HashMap::new();
    for key in keys {
      if let Some(list) = self.postings.get(&key_to_string(key)) {
        for id in list {
          *scores.entry(id.clone()).or_insert(0) += 1;
        }
      }
    }
    let mut ranked: Vec<(Id, f64)> = scores.into_iter().map(|(id, c)| (id, f64::from(c))).collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(k);
    ranked
  }

  pub fn snapshot(&mut self) -> Result<()> {
    let snap = Snapshot {
      postings: self.postings.clone(),
    };
    self.persist.snapshot(&snap)
  }
}

#[cfg(test)]
mod tests {
  use recall_entities::EntityType;

  use super::*;

  #[test]
  fn finds_memory_by_entity_mention() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = EntityIndex::new(dir.path());
    let id = Id::new("mem");
    let key = EntityKey::new("Alice", EntityType::Person);
    idx.add(&id, &[key.clone()]).unwrap();
    assert_eq!(idx.query(&[key], 10)[0].0, id);
  }
}
