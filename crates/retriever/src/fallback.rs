use recall_entities::Memory;
use recall_index::shingles;
use recall_shared::RetrievalConfig;

use crate::query::ScoredMemory;

fn overlap_score(query_grams: &std::collections::HashSet<String>, text: &str) -> f64 {
  if query_grams.is_empty() {
    return 0.0;
  }
  let doc_grams = shingles(text);
  let hits = query_grams.intersection(&doc_grams).count();
  hits as f64 / query_grams.len() as f64
}

/// Raw-text fallback scan over the full archive, run only when every other stage
/// returned nothing. Chunks `memories` across up to `fallback_workers`
/// `tokio::spawn` tasks when `fallback_parallel` is set, matching the
/// reference workspace's worker-pool pattern for CPU-bound scans.
pub async fn scan(memories: Vec<Memory>, query_text: &str, config: &RetrievalConfig) -> Vec<ScoredMemory> {
  let query_grams = shingles(query_text);
  let top_k = config.fallback_top_k.max(1);

  let scored: Vec<ScoredMemory> = if config.fallback_parallel && config.fallback_workers > 1 {
    let workers = config.fallback_workers.min(memories.len().max(1));
    let chunk_size = memories.len().div_ceil(workers.max(1)).max(1);
    let mut handles = Vec::new();
    for chunk in memories.chunks(chunk_size) {
      let chunk = chunk.to_vec();
      let query_grams = query_grams.clone();
      handles.push(tokio::spawn(async move {
        chunk
          .into_iter()
          .map(|memory| {
            let score = overlap_score(&query_grams, &memory.content);
            ScoredMemory { memory, score }
          })
          .collect::<Vec<_>>()
      }));
    }
    let mut out = Vec::new();
    for handle in handles {
      if let Ok(part) = handle.await {
        out.extend(part);
      }
    }
    out
  } else {
    memories
      .into_iter()
      .map(|memory| {
        let score = overlap_score(&query_grams, &memory.content);
        ScoredMemory { memory, score }
      })
      .collect()
  };

  let mut scored: Vec<ScoredMemory> = scored.into_iter().filter(|s| s.score > 0.0).collect();
  scored.sort_by(|a, b| b.score.total_cmp(&a.score));
  scored.truncate(top_k);
  scored
}

#[cfg(test)]
mod tests {
  use recall_entities::MemoryRole;

  use super::*;

  #[tokio::test]
  async fn finds_a_match_missed_by_every_other_stage() {
    let memory = Memory::builder("金色蝴蝶在月光下飞舞", MemoryRole::User, "u1", "s1").build();
    let id = memory.id.clone();
    let results = scan(vec![memory], "月光蝴蝶", &RetrievalConfig::default()).await;
    assert_eq!(results[0].memory.id, id);
  }

  #[tokio::test]
  async fn unrelated_query_yields_nothing() {
    let memory = Memory::builder("completely unrelated content", MemoryRole::User, "u1", "s1").build();
    let results = scan(vec![memory], "金色蝴蝶", &RetrievalConfig::default()).await;
    assert!(results.is_empty());
  }
}
