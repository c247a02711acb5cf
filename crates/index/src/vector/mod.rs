mod flat;
mod hnsw;

use std::path::{Path, PathBuf};

pub use flat::FlatVectorIndex;
pub use hnsw::{HnswParams, HnswVectorIndex};
use recall_shared::{Id, Result};

/// Selects `Flat` below `flat_threshold` vectors and `Hnsw` above it. Both backends are
/// kept warm simultaneously below the threshold so the switch is
/// transparent: the flat index is always maintained, and once the corpus
/// crosses the threshold subsequent queries are served from HNSW.
pub struct VectorIndex {
  dir: PathBuf,
  flat: FlatVectorIndex,
  hnsw: Option<HnswVectorIndex>,
  flat_threshold: usize,
  hnsw_params: HnswParams,
}

impl VectorIndex {
  #[must_use]
  pub fn new(dir: impl Into<PathBuf>, flat_threshold: usize, hnsw_params: HnswParams) -> Self {
    let dir = dir.into();
    Self {
      flat: FlatVectorIndex::new(&dir),
      hnsw: None,
      flat_threshold,
      hnsw_params,
      dir,
    }
  }

  pub fn load(dir: impl AsRef<Path>, flat_threshold: usize, hnsw_params: HnswParams) -> Result<Self> {
    let dir = dir.as_ref().to_path_buf();
    let flat = FlatVectorIndex::load(&dir)?;
    let hnsw = if flat.len() > flat_threshold {
      Some(HnswVectorIndex::load(&dir, hnsw_params.clone())?)
    } else {
      None
    };
    Ok(Self {
      flat,
      hnsw,
      flat_threshold,
      hnsw_params,
      dir,
    })
  }

  pub fn add(&mut self, id: &Id, embedding: Vec<f32>) -> Result<()> {
    self.flat.add(id, embedding.clone())?;
    if self.flat.len() > self.flat_threshold {
      let hnsw = self.hnsw.get_or_insert_with(|| HnswVectorIndex::new(&self.dir, self.hnsw_params.clone()));
      hnsw.add(id, embedding)?;
    }
    Ok(())
  }

  pub fn remove(&mut self, id: &Id) -> Result<()> {
    self.flat.remove(id)?;
    if let Some(hnsw) = &mut self.hnsw {
      hnsw.remove(id)?;
    }
    Ok(())
  }

  /// Coarse ANN pass (retrieval stage L7): HNSW once the corpus crossed the
  /// threshold, otherwise the flat index itself (still exact, just small).
  #[must_use]
  pub fn query_coarse(&self, embedding: &[f32], k: usize) -> Vec<(Id, f64)> {
    if let Some(hnsw) = &self.hnsw {
      hnsw.query(embedding, k)
    } else {
      self.flat.query(embedding, k)
    }
  }

  /// Exact cosine re-rank (retrieval stage L8) over a candidate set, always
  /// served from the flat index regardless of corpus size.
  #[must_use]
  pub fn rerank_fine(&self, candidates: &[Id], embedding: &[f32]) -> Vec<(Id, f64)> {
    self.flat.rerank(candidates, embedding)
  }

  pub fn snapshot(&mut self) -> Result<()> {
    self.flat.snapshot()?;
    if let Some(hnsw) = &mut self.hnsw {
      hnsw.rebuild();
      hnsw.snapshot()?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stays_on_flat_below_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = VectorIndex::new(dir.path(), 1000, HnswParams::default());
    let id = Id::new("mem");
    idx.add(&id, vec![1.0, 0.0]).unwrap();
    assert_eq!(idx.query_coarse(&[1.0, 0.0], 1)[0].0, id);
  }

  #[test]
  fn switches_to_hnsw_above_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let mut idx = VectorIndex::new(dir.path(), 2, HnswParams::default());
    for _ in 0..5 {
      idx.add(&Id::new("mem"), vec![0.1, 0.2, 0.3]).unwrap();
    }
    assert!(idx.hnsw.is_some());
  }
}
