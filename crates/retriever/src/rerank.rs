use std::collections::HashMap;

use recall_ai::cosine_similarity;
use recall_entities::{EntityKey, Memory};
use recall_shared::{now_ms, Id, RetrievalConfig};

use crate::fsrs_rank::RetentionTracker;
use crate::query::ScoredMemory;

fn bm25_norm(raw: f64) -> f64 {
  // BM25 is unbounded; squash to (0, 1) the same way the reference
  // workspace's hybrid scorer treats its tf-idf component, so it can be
  // linearly combined with the other [0, 1]-ish terms.
  raw / (raw + 1.0)
}

fn entity_match(memory_entities: &[EntityKey], query_entities: &[EntityKey]) -> f64 {
  if query_entities.is_empty() {
    return 0.0;
  }
  let matched = query_entities.iter().filter(|k| memory_entities.contains(k)).count();
  matched as f64 / query_entities.len() as f64
}

/// L9 multi-factor rerank: `w_vector * cosine + w_keyword * bm25_norm +
/// w_entity * entity_match - w_recency * decay(age)`, where `decay(age)`
/// is `1 - FSRS retrievability` rather than a bare exponential,
/// further scaled by the memory's boundary-kind retrieval boost.
///
/// `memory_entity_keys` supplies each memory's own mentioned entities
/// (not stored on `Memory` itself — resolved by the caller from its
/// entity-extraction bookkeeping) so entity overlap can be scored without
/// re-deriving it here.
#[must_use]
pub fn rerank(
  memories: Vec<Memory>,
  bm25_scores: &HashMap<Id, f64>,
  query_embedding: &[f32],
  query_entities: &[EntityKey],
  memory_entity_keys: &HashMap<Id, Vec<EntityKey>>,
  retention: &RetentionTracker,
  config: &RetrievalConfig,
) -> Vec<ScoredMemory> {
  let now = now_ms();
  let mut scored: Vec<ScoredMemory> = memories
    .into_iter()
    .map(|memory| {
      let cosine = if query_embedding.is_empty() || memory.embedding.is_empty() {
        0.0
      } else {
        cosine_similarity(query_embedding, &memory.embedding)
      };
      let bm25 = bm25_norm(bm25_scores.get(&memory.id).copied().unwrap_or(0.0));
      let entities = memory_entity_keys.get(&memory.id).map(Vec::as_slice).unwrap_or(&[]);
      let entity = entity_match(entities, query_entities);
      let retrievability = retention.retrievability(&memory.id, now);
      let age_decay = 1.0 - retrievability;

      let mut score = config.weight_vector * cosine + config.weight_keyword * bm25 + config.weight_entity * entity - config.weight_recency * age_decay;
      if let Some(boundary) = memory.boundary_kind {
        score *= boundary.retrieval_boost(memory.surprise);
      }
      ScoredMemory { memory, score }
    })
    .collect();

  scored.sort_by(|a, b| b.score.total_cmp(&a.score));
  if config.l9_rerank.top_k > 0 {
    scored.truncate(config.l9_rerank.top_k);
  }
  scored
}

#[cfg(test)]
mod tests {
  use recall_entities::MemoryRole;

  use super::*;

  fn memory(embedding: Vec<f32>) -> Memory {
    Memory::builder("hello world", MemoryRole::User, "u1", "s1").embedding(embedding).build()
  }

  #[test]
  fn higher_cosine_similarity_ranks_first() {
    let retention = RetentionTracker::new().unwrap();
    let config = RetrievalConfig::default();
    let close = memory(vec![1.0, 0.0, 0.0]);
    let far = memory(vec![0.0, 1.0, 0.0]);
    let close_id = close.id.clone();
    let ranked = rerank(vec![far, close], &HashMap::new(), &[1.0, 0.0, 0.0], &[], &HashMap::new(), &retention, &config);
    assert_eq!(ranked[0].memory.id, close_id);
  }

  #[test]
  fn bm25_contributes_when_vectors_are_absent() {
    let retention = RetentionTracker::new().unwrap();
    let config = RetrievalConfig::default();
    let low = memory(vec![]);
    let high = memory(vec![]);
    let mut bm25 = HashMap::new();
    bm25.insert(low.id.clone(), 0.1);
    bm25.insert(high.id.clone(), 9.0);
    let high_id = high.id.clone();
    let ranked = rerank(vec![low, high], &bm25, &[], &[], &HashMap::new(), &retention, &config);
    assert_eq!(ranked[0].memory.id, high_id);
  }
}
