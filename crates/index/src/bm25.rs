use std::collections::HashMap;
use std::path::Path;

use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

use crate::persist::WalSnapshot;

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
  doc_lengths: HashMap<Id, u32>,
  doc_term_freqs: HashMap<Id, HashMap<String, u32>>,
  term_doc_counts: HashMap<String, u32>,
  total_doc_length: u64,
  doc_count: u64,
}

#[derive(Serialize, Deserialize)]
enum Op {
  Add(Id, Vec<String>),
  Remove(Id),
}

/// Full-text BM25 scorer computed directly over the inverted index's term
/// statistics. No
/// dedicated IR-engine crate is pulled in for this — the scoring formula
/// is simple enough to own directly, and the inverted index already
/// maintains the postings this needs.
pub struct Bm25Index {
  doc_lengths: HashMap<Id, u32>,
  doc_term_freqs: HashMap<Id, HashMap<String, u32>>,
  term_doc_counts: HashMap<String, u32>,
  total_doc_length: u64,
  doc_count: u64,
  k1: f64,
  b: f64,
  persist: WalSnapshot,
}

impl Bm25Index {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>, k1: f64, b: f64) -> Self {
    Self {
      doc_lengths: HashMap::new(),
      doc_term_freqs: HashMap::new(),
      term_doc_counts: HashMap::new(),
      total_doc_length: 0,
      doc_count: 0,
      k1,
      b,
      persist: WalSnapshot::new(dir, "fulltext"),
    }
  }

  fn apply(snap: &mut Snapshot, id: Id, tokens: Vec<String>) {
    let mut tf: HashMap<String, u32> = HashMap::new();
    for token in &tokens {
      *tf.entry(token.clone()).or_insert(0) += 1;
    }
    for token in tf.keys() {
      *snap.term_doc_counts.entry(token.clone()).or_insert(0) += 1;
    }
    snap.total_doc_length += tokens.len() as u64;
    snap.doc_count += 1;
    snap.doc_lengths.insert(id.clone(), tokens.len() as u32);
    snap.doc_term_freqs.insert(id, tf);
  }

  pub fn load(dir: impl AsRef<Path>, k1: f64, b: f64) -> Result<Self> {
    let persist = WalSnapshot::new(dir, "fulltext");
    let snap: Snapshot = persist.load(|state: &mut Snapshot, op| match op {
      Op::Add(id, tokens) => Self::apply(state, id, tokens),
      Op::Remove(id) => {
        if let Some(len) = state.doc_lengths.remove(&id) {
          state.total_doc_length = state.total_doc_length.saturating_sub(u64::from(len));
          state.doc_count = state.doc_count.saturating_sub(1);
        }
        if let Some(tf) = state.doc_term_freqs.remove(&id) {
          for token in tf.keys() {
            if let Some(c) = state.term_doc_counts.get_mut(token) {
              *c = c.saturating_sub(1);
            }
          }
        }
      }
    })?;
    Ok(Self {
      doc_lengths: snap.doc_lengths,
      doc_term_freqs: snap.doc_term_freqs,
      term_doc_counts: snap.term_doc_counts,
      total_doc_length: snap.total_doc_length,
      doc_count: snap.doc_count,
      k1,
      b,
      persist,
    })
  }

  pub fn add(&mut self, id: &Id, tokens: &[String]) -> Result<()> {
    let mut snap = Snapshot {
      doc_lengths: std::mem::take(&mut self.doc_lengths),
      doc_term_freqs: std::mem::take(&mut self.doc_term_freqs),
      term_doc_counts: std::mem::take(&mut self.term_doc_counts),
      total_doc_length: self.total_doc_length,
      doc_count: self.doc_count,
    };
    Self::apply(&mut snap, id.clone(), tokens.to_vec());
    self.doc_lengths = snap.doc_lengths;
    self.doc_term_freqs = snap.doc_term_freqs;
    self.term_doc_counts = snap.term_doc_counts;
    self.total_doc_length = snap.total_doc_length;
    self.doc_count = snap.doc_count;
    self.persist.append(&Op::Add(id.clone(), tokens.to_vec()))
  }

  pub fn remove(&mut self, id: &Id) -> Result<()> {
    if let Some(len) = self.doc_lengths.remove(id) {
      self.total_doc_length = self.total_doc_length.saturating_sub(u64::from(len));
      self.doc_count = self.doc_count.saturating_sub(1);
    }
    if let Some(tf) = self.doc_term_freqs.remove(id) {
      for token in tf.keys() {
        if let Some(c) = self.term_doc_counts.get_mut(token) {
          *c = c.saturating_sub(1);
        }
      }
    }
    self.persist.append(&Op::Remove(id.clone()))
  }

  fn avg_doc_length(&self) -> f64 {
    if self.doc_count == 0 {
      0.0
    } else {
      self.total_doc_length as f64 / self.doc_count as f64
    }
  }

  fn idf(&self, term: &str) -> f64 {
    let n = self.doc_count as f64;
    let df = f64::from(self.term_doc_counts.get(term).copied().unwrap_or(0));
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
  }

  /// Raw BM25 score for `doc_id` against `query_tokens`.
  #[must_use]
  pub fn score(&self, doc_id: &Id, query_tokens: &[String]) -> f64 {
    let Some(tf) = self.doc_term_freqs.get(doc_id) else {
      return 0.0;
    };
    let doc_len = f64::from(self.doc_lengths.get(doc_id).copied().unwrap_or(0));
    let avg_len = self.avg_doc_length().max(1.0);
    query_tokens
      .iter()
      .map(|term| {
        let f = f64::from(tf.get(term).copied().unwrap_or(0));
        if f == 0.0 {
          return 0.0;
        }
        let idf = self.idf(term);
        idf * (f * (self.k1 + 1.0)) / (f + self.k1 * (1.0 - self.b + self.b * doc_len / avg_len))
      })
      .sum()
  }

  /// Ranks every document with at least one matching token, highest score
  /// first.
  #[must_use]
  pub fn query(&self, query_tokens: &[String], k: usize) -> Vec<(Id, f64)> {
    let mut scores: Vec<(Id, f64)> = self
      .doc_term_freqs
      .keys()
      .map(|id| (id.clone(), self.score(id, query_tokens)))
      .filter(|(_, s)| *s > 0.0)
      .collect();
    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scores.truncate(k);
    scores
  }

  pub fn snapshot(&mut self) -> Result<()> {
    let snap = Snapshot {
      doc_lengths: self.doc_lengths.clone(),
      doc_term_freqs: self.doc_term_freqs.clone(),
      term_doc_counts: self.term_doc_counts.clone(),
      total_doc_length: self.total_doc_length,
      doc_count: self.doc_count,
    };
    self.persist.snapshot(&snap)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rarer_term_scores_higher() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = Bm25Index::new(dir.path(), 1.2, 0.75);
    let common = Id::new("mem");
    let rare = Id::new("mem");
    idx.add(&common, &["the".into(), "cat".into(), "sat".into()]).unwrap();
    idx.add(&rare, &["the".into(), "xylophone".into()]).unwrap();
    // Add more docs containing "the" so it has a low idf relative to "xylophone".
    for _ in 0..5 {
      idx.add(&Id::new("mem"), &["the".into(), "dog".into()]).unwrap();
    }
    let common_score = idx.score(&common, &["the".into()]);
    let rare_score = idx.score(&rare, &["xylophone".into()]);
    assert!(rare_score > common_score);
  }

  #[test]
  fn query_ranks_matching_docs() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = Bm25Index::new(dir.path(), 1.2, 0.75);
    let id = Id::new("mem");
    idx.add(&id, &["rust".into(), "memory".into(), "safety".into()]).unwrap();
    let hits = idx.query(&["memory".into()], 10);
    assert_eq!(hits[0].0, id);
  }
}
