use std::collections::{HashMap, HashSet};
use std::path::Path;

use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

use crate::persist::WalSnapshot;

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
  postings: HashMap<String, HashSet<Id>>,
}

#[derive(Serialize, Deserialize)]
enum Op {
  Add(String, Id),
  Remove(Id),
}

/// `token -> posting list of memory-ids`. Backs retrieval stage L3.
pub struct InvertedIndex {
  postings: HashMap<String, HashSet<Id>>,
  /// Reverse map so `remove` doesn't require scanning every posting list.
  tokens_by_memory: HashMap<Id, Vec<String>>,
  persist: WalSnapshot,
}

impl InvertedIndex {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      postings: HashMap::new(),
      tokens_by_memory: HashMap::new(),
      persist: WalSnapshot::new(dir, "inverted"),
    }
  }

  pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
    let persist = WalSnapshot::new(dir, "inverted");
    let snap: Snapshot = persist.load(|state: &mut Snapshot, op| match op {
      Op::Add(token, id) => {
        state.postings.entry(token).or_default().insert(id);
      }
      Op::Remove(id) => {
        for list in state.postings.values_mut() {
          list.remove(&id);
        }
      }
    })?;
    let mut tokens_by_memory: HashMap<Id, Vec<String>> = HashMap::new();
    for (token, ids) in &snap.postings {
      for id in ids {
        tokens_by_memory.entry(id.clone()).or_default().push(token.clone());
      }
    }
    Ok(Self {
      postings: snap.postings,
      tokens_by_memory,
      persist,
    })
  }

  pub fn add(&mut self, id: &Id, tokens: &[String]) -> Result<()> {
    let mut unique: Vec<String> = tokens.to_vec();
    unique.sort();
    unique.dedup();
    for token in &unique {
      self.postings.entry(token.clone()).or_default().insert(id.clone());
      self.persist.append(&Op::Add(token.clone(), id.clone()))?;
    }
    self.tokens_by_memory.insert(id.clone(), unique);
    Ok(())
  }

  pub fn remove(&mut self, id: &Id) -> Result<()> {
    if let Some(tokens) = self.tokens_by_memory.remove(id) {
      for token in tokens {
        if let Some(list) = self.postings.get_mut(&token) {
          list.remove(id);
        }
      }
    }
    self.persist.append(&Op::Remove(id.clone()))
  }

  /// Exact-token AND-style lookup: intersect postings of every supplied
  /// token, returning memory-ids with the count of matched tokens as score.
  #[must_use]
  pub fn query(&self, tokens: &[String], k: usize) -> Vec<(Id, f64)> {
    let mut scores: HashMap<Id, u32> = HashMap::new();
    for token in tokens {
      if let Some(list) = self.postings.get(token) {
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

  #[must_use]
  pub fn posting(&self, token: &str) -> Option<&HashSet<Id>> {
    self.postings.get(token)
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
  use super::*;

  #[test]
  fn finds_verbatim_token() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = InvertedIndex::new(dir.path());
    let id = Id::new("mem");
    idx.add(&id, &["hello".into(), "world".into()]).unwrap();
    let hits = idx.query(&["hello".into()], 10);
    assert_eq!(hits[0].0, id);
  }

  #[test]
  fn remove_clears_all_postings() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = InvertedIndex::new(dir.path());
    let id = Id::new("mem");
    idx.add(&id, &["a".into(), "b".into()]).unwrap();
    idx.remove(&id).unwrap();
    assert!(idx.query(&["a".into()], 10).is_empty());
  }

  #[test]
  fn reloads_from_wal() {
    let dir = tempfile::tempdir().unwrap();
    let id = Id::new("mem");
    {
      let mut idx = InvertedIndex::new(dir.path());
      idx.add(&id, &["persisted".into()]).unwrap();
    }
    let reloaded = InvertedIndex::load(dir.path()).unwrap();
    assert_eq!(reloaded.query(&["persisted".into()], 10)[0].0, id);
  }
}
