use std::path::Path;

use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::prelude::DistCosine;
use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};

use crate::persist::WalSnapshot;

#[derive(Clone, Serialize, Deserialize)]
pub struct HnswParams {
  pub m: usize,
  pub ef_construction: usize,
  pub ef_search: usize,
}

impl Default for HnswParams {
  fn default() -> Self {
    Self {
      m: 16,
      ef_construction: 200,
      ef_search: 64,
    }
  }
}

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
  ids: Vec<Id>,
  vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
enum Op {
  Add(Id, Vec<f32>),
  Remove(Id),
}

/// Approximate vector index via `hnsw_rs`. It has no
/// incremental-deletion support, so `remove` only drops the id from the
/// owned vector list; the index is rebuilt from that list on the next
/// `rebuild()` call (invoked by the store's consolidation job, matching
/// the same "rebuild on namespace reload" approach the reference
/// workspace's HNSW storage backend uses).
pub struct HnswVectorIndex {
  ids: Vec<Id>,
  vectors: Vec<Vec<f32>>,
  params: HnswParams,
  index: Hnsw<'static, f32, DistCosine>,
  persist: WalSnapshot,
}

impl HnswVectorIndex {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>, params: HnswParams) -> Self {
    let index = Self::build_index(&[], &params);
    Self {
      ids: Vec::new(),
      vectors: Vec::new(),
      params,
      index,
      persist: WalSnapshot::new(dir, "vector_hnsw"),
    }
  }

  fn build_index(vectors: &[Vec<f32>], params: &HnswParams) -> Hnsw<'static, f32, DistCosine> {
    let max_elements = vectors.len().max(1000);
    let nb_layers = 16.min((max_elements as f32).ln() as usize).max(1);
    let index = Hnsw::new(params.m, max_elements, nb_layers, params.ef_construction, DistCosine);
    if !vectors.is_empty() {
      let refs: Vec<(&Vec<f32>, usize)> = vectors.iter().enumerate().map(|(i, v)| (v, i)).collect();
      index.parallel_insert(&refs);
    }
    index
  }

  pub fn load(dir: impl AsRef<Path>, params: HnswParams) -> Result<Self> {
    let persist = WalSnapshot::new(dir, "vector_hnsw");
    let snap: Snapshot = persist.load(|state: &mut Snapshot, op| match op {
      Op::Add(id, v) => {
        state.ids.push(id);
        state.vectors.push(v);
      }
      Op::Remove(id) => {
        if let Some(pos) = state.ids.iter().position(|existing| existing == &id) {
          state.ids.remove(pos);
          state.vectors.remove(pos);
        }
      }
    })?;
    let index = Self::build_index(&snap.vectors, &params);
    Ok(Self {
      ids: snap.ids,
      vectors: snap.vectors,
      params,
      index,
      persist,
    })
  }

  /// Adds a vector and inserts it into the live index immediately
  /// (amortized `O(log n)`, mirroring `hnsw_rs`'s incremental insertion).
  pub fn add(&mut self, id: &Id, embedding: Vec<f32>) -> Result<()> {
    self.persist.append(&Op::Add(id.clone(), embedding.clone()))?;
    let internal_id = self.vectors.len();
    self.index.insert((&embedding, internal_id));
    self.ids.push(id.clone());
    self.vectors.push(embedding);
    Ok(())
  }

  pub fn remove(&mut self, id: &Id) -> Result<()> {
    self.persist.append(&Op::Remove(id.clone()))?;
    if let Some(pos) = self.ids.iter().position(|existing| existing == id) {
      self.ids.remove(pos);
      self.vectors.remove(pos);
    }
    Ok(())
  }

  /// Rebuilds the index from the currently owned vector list, clearing out
  /// tombstoned (removed) entries that a prior `remove` only unlinked.
  pub fn rebuild(&mut self) {
    self.index = Self::build_index(&self.vectors, &self.params);
  }

  #[must_use]
  pub fn query(&self, embedding: &[f32], k: usize) -> Vec<(Id, f64)> {
    if self.ids.is_empty() {
      return Vec::new();
    }
    let neighbours = self.index.search(embedding, k, self.params.ef_search);
    neighbours
      .into_iter()
      .filter_map(|n| self.ids.get(n.d_id).map(|id| (id.clone(), 1.0 - f64::from(n.distance))))
      .collect()
  }

  pub fn snapshot(&mut self) -> Result<()> {
    let snap = Snapshot {
      ids: self.ids.clone(),
      vectors: self.vectors.clone(),
    };
    self.persist.snapshot(&snap)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn inserts_and_finds_nearest() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = HnswVectorIndex::new(dir.path(), HnswParams::default());
    let target = Id::new("mem");
    idx.add(&target, vec![1.0, 0.0, 0.0]).unwrap();
    idx.add(&Id::new("mem"), vec![0.0, 1.0, 0.0]).unwrap();
    let hits = idx.query(&[0.95, 0.05, 0.0], 1);
    assert_eq!(hits[0].0, target);
  }

  #[test]
  fn rebuild_drops_removed_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = HnswVectorIndex::new(dir.path(), HnswParams::default());
    let id = Id::new("mem");
    idx.add(&id, vec![1.0, 0.0, 0.0]).unwrap();
    idx.remove(&id).unwrap();
    idx.rebuild();
    assert!(idx.query(&[1.0, 0.0, 0.0], 5).is_empty());
  }
}
