use std::path::Path;

use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

use crate::persist::WalSnapshot;

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
  vectors: Vec<(Id, Vec<f32>)>,
}

#[derive(Serialize, Deserialize)]
enum Op {
  Add(Id, Vec<f32>),
  Remove(Id),
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
  let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
  let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
  let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
  if na == 0.0 || nb == 0.0 {
    0.0
  } else {
    f64::from(dot / (na * nb))
  }
}

/// Brute-force exact vector index. Used below `VECTOR_FLAT_THRESHOLD` and as the L8 exact
/// cosine re-rank stage regardless of which coarse backend ran at L7.
pub struct FlatVectorIndex {
  vectors: Vec<(Id, Vec<f32>)>,
  persist: WalSnapshot,
}

impl FlatVectorIndex {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      vectors: Vec::new(),
      persist: WalSnapshot::new(dir, "vector_flat"),
    }
  }

  pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
    let persist = WalSnapshot::new(dir, "vector_flat");
    let snap: Snapshot = persist.load(|state: &mut Snapshot, op| match op {
      Op::Add(id, v) => state.vectors.push((id, v)),
      Op::Remove(id) => state.vectors.retain(|(existing, _)| existing != &id),
    })?;
    Ok(Self {
      vectors: snap.vectors,
      persist,
    })
  }

  pub fn add(&mut self, id: &Id, embedding: Vec<f32>) -> Result<()> {
    self.persist.append(&Op::Add(id.clone(), embedding.clone()))?;
    self.vectors.push((id.clone(), embedding));
    Ok(())
  }

  pub fn remove(&mut self, id: &Id) -> Result<()> {
    self.vectors.retain(|(existing, _)| existing != id);
    self.persist.append(&Op::Remove(id.clone()))
  }

  #[must_use]
  pub fn len(&self) -> usize {
    self.vectors.len()
  }

  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.vectors.is_empty()
  }

  #[must_use]
  pub fn query(&self, embedding: &[f32], k: usize) -> Vec<(Id, f64)> {
    let mut scored: Vec<(Id, f64)> =
      self.vectors.iter().map(|(id, v)| (id.clone(), cosine(v, embedding))).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
  }

  /// Re-ranks a candidate set by exact cosine similarity (retrieval stage
  /// L8). Candidates missing an embedding in this index score zero.
  #[must_use]
  pub fn rerank(&self, candidates: &[Id], embedding: &[f32]) -> Vec<(Id, f64)> {
    let mut scored: Vec<(Id, f64)> = candidates
      .iter()
      .map(|id| {
        let score = self
          .vectors
          .iter()
          .find(|(existing, _)| existing == id)
          .map_or(0.0, |(_, v)| cosine(v, embedding));
        (id.clone(), score)
      })
      .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
  }

  pub fn snapshot(&mut self) -> Result<()> {
    let snap = Snapshot {
      vectors: self.vectors.clone(),
    };
    self.persist.snapshot(&snap)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn nearest_neighbor_ranks_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = FlatVectorIndex::new(dir.path());
    let close = Id::new("mem");
    let far = Id::new("mem");
    idx.add(&close, vec![1.0, 0.0, 0.0]).unwrap();
    idx.add(&far, vec![0.0, 1.0, 0.0]).unwrap();
    let hits = idx.query(&[0.9, 0.1, 0.0], 2);
    assert_eq!(hits[0].0, close);
  }
}
