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

/// Character 2/3-gram postings, used for fuzzy matching (retrieval
/// stage L6) and as the basis of the raw-text fallback scan.
pub struct NgramIndex {
  postings: HashMap<String, HashSet<Id>>,
  grams_by_memory: HashMap<Id, Vec<String>>,
  persist: WalSnapshot,
}

/// Lowercased, whitespace-collapsed 2-gram and 3-gram shingles of `text`.
#[must_use]
pub fn shingles(text: &str) -> HashSet<String> {
  let normalized: String = text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
  let chars: Vec<char> = normalized.chars().collect();
  let mut out = HashSet::new();
  for n in [2usize, 3usize] {
    if chars.len() < n {
      continue;
    }
    for window in chars.windows(n) {
      out.insert(window.iter().collect());
    }
  }
  out
}

impl NgramIndex {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      postings: HashMap::new(),
      grams_by_memory: HashMap::new(),
      persist: WalSnapshot::new(dir, "ngram"),
    }
  }

  pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
    let persist = WalSnapshot::new(dir, "ngram");
    let snap: Snapshot = persist.load(|state: &mut Snapshot, op| match op {
      Op::Add(gram, id) => {
        state.postings.entry(gram).or_default().insert(id);
      }
      Op::Remove(id) => {
        for list in state.postings.values_mut() {
          list.remove(&id);
        }
      }
    })?;
    let mut grams_by_memory: HashMap<Id, Vec<String>> = HashMap::new();
    for (gram, ids) in &snap.postings {
      for id in ids {
        grams_by_memory.entry(id.clone()).or_default().push(gram.clone());
      }
    }
    Ok(Self {
      postings: snap.postings,
      grams_by_memory,
      persist,
    })
  }

  pub fn add(&mut self, id: &Id, text: &str) -> Result<()> {
    let grams = shingles(text);
    for gram in &grams {
      self.postings.entry(gram.clone()).or_default().insert(id.clone());
      self.persist.append(&Op::Add(gram.clone(), id.clone()))?;
    }
    self.grams_by_memory.insert(id.clone(), grams.into_iter().collect());
    Ok(())
  }

  pub fn remove(&mut self, id: &Id) -> Result<()> {
    if let Some(grams) = self.grams_by_memory.remove(id) {
      for gram in grams {
        if let Some(list) = self.postings.get_mut(&gram) {
          list.remove(id);
        }
      }
    }
    self.persist.append(&Op::Remove(id.clone()))
  }

  /// Ranks by fraction of query shingles found in each candidate's shingle
  /// set — a cheap Jaccard-like fuzzy score, no embeddings required.
  #[must_use]
  pub fn query(&self, text: &str, k: usize) -> Vec<(Id, f64)> {
    let query_grams = shingles(text);
    if query_grams.is_empty() {
      return Vec::new();
    }
    let mut hits: HashMap<Id, u32> = HashMap::new();
    for gram in &query_grams {
      if let Some(list) = self.postings.get(gram) {
        for id in list {
          *hits.entry(id.clone()).or_insert(0) += 1;
        }
      }
    }
    let mut ranked: Vec<(Id, f64)> =
      hits.into_iter().map(|(id, c)| (id, f64::from(c) / query_grams.len() as f64)).collect();
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
  use super::*;

  #[test]
  fn fuzzy_match_survives_typo() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = NgramIndex::new(dir.path());
    let id = Id::new("mem");
    idx.add(&id, "the quick brown fox").unwrap();
    let hits = idx.query("the quikc brown fox", 10);
    assert_eq!(hits[0].0, id);
  }
}
