use std::path::Path;

use recall_entities::EntityKey;
use recall_index::{BloomIndex, Bm25Index, EntityIndex, HnswParams, InvertedIndex, NgramIndex, TemporalIndex, VectorIndex};
use recall_retriever::IndexSet;
use recall_shared::{Id, RetrievalConfig, Result};

/// Owns every index type the funnel stages query. A single `add`/`remove` keeps all seven
/// in sync for one memory, so no call site can update a subset and leave
/// the others stale.
pub struct IndexBundle {
  pub bloom: BloomIndex,
  pub inverted: InvertedIndex,
  pub bm25: Bm25Index,
  pub entity: EntityIndex,
  pub ngram: NgramIndex,
  pub vector: VectorIndex,
  pub temporal: TemporalIndex,
}

impl IndexBundle {
  pub fn open(dir: &Path, retrieval: &RetrievalConfig, expected_items: u64) -> Result<Self> {
    let hnsw_params = HnswParams {
      m: retrieval.hnsw_m,
      ef_construction: retrieval.hnsw_ef_construction,
      ef_search: retrieval.hnsw_ef_search,
    };
    Ok(Self {
      bloom: BloomIndex::load(dir.join("bloom"), expected_items)?,
      inverted: InvertedIndex::load(dir.join("inverted"))?,
      bm25: Bm25Index::load(dir.join("bm25"), 1.2, 0.75)?,
      entity: EntityIndex::load(dir.join("entity"))?,
      ngram: NgramIndex::load(dir.join("ngram"))?,
      vector: VectorIndex::load(dir.join("vector"), 1000, hnsw_params)?,
      temporal: TemporalIndex::load(dir.join("temporal"))?,
    })
  }

  /// Indexes one freshly-stored memory across every stage it participates
  /// in. Called while holding the index batch lock so a single ingest's
  /// updates land atomically across all six index types.
  pub fn add(&mut self, id: &Id, tokens: &[String], text: &str, entities: &[EntityKey], embedding: &[f32], created_at: i64) -> Result<()> {
    self.bloom.add(id)?;
    self.inverted.add(id, tokens)?;
    self.bm25.add(id, tokens)?;
    self.entity.add(id, entities)?;
    self.ngram.add(id, text)?;
    if !embedding.is_empty() {
      self.vector.add(id, embedding.to_vec())?;
    }
    self.temporal.add(id, created_at)?;
    Ok(())
  }

  pub fn remove(&mut self, id: &Id) -> Result<()> {
    self.inverted.remove(id)?;
    self.bm25.remove(id)?;
    self.entity.remove(id)?;
    self.ngram.remove(id)?;
    self.vector.remove(id)?;
    self.temporal.remove(id)?;
    Ok(())
  }

  pub fn snapshot(&mut self) -> Result<()> {
    self.bloom.snapshot()?;
    self.inverted.snapshot()?;
    self.bm25.snapshot()?;
    self.entity.snapshot()?;
    self.ngram.snapshot()?;
    self.vector.snapshot()?;
    self.temporal.snapshot()?;
    Ok(())
  }

  #[must_use]
  pub fn as_index_set(&self) -> IndexSet<'_> {
    IndexSet {
      bloom: &self.bloom,
      temporal: &self.temporal,
      inverted: &self.inverted,
      bm25: &self.bm25,
      entity: &self.entity,
      ngram: &self.ngram,
      vector: &self.vector,
    }
  }
}
