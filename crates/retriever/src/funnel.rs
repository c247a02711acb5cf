use recall_graph::{Direction, GraphBackend};
use recall_index::{BloomIndex, Bm25Index, EntityIndex, InvertedIndex, NgramIndex, TemporalIndex, VectorIndex};
use recall_shared::{Id, RetrievalConfig};
use tracing::debug;

use crate::query::{CandidateSet, SearchQuery};
use crate::rrf::fuse;

/// Read-only handles to every index the funnel stages query. Owned by the
/// caller (the engine); the retriever only ever borrows them.
pub struct IndexSet<'a> {
  pub bloom: &'a BloomIndex,
  pub temporal: &'a TemporalIndex,
  pub inverted: &'a InvertedIndex,
  pub bm25: &'a Bm25Index,
  pub entity: &'a EntityIndex,
  pub ngram: &'a NgramIndex,
  pub vector: &'a VectorIndex,
}

async fn graph_entity_expansion(graph: &dyn GraphBackend, seeds: &[recall_entities::EntityKey], depth: usize) -> Vec<recall_entities::EntityKey> {
  if seeds.is_empty() {
    return Vec::new();
  }
  match graph.traverse(seeds, depth, Direction::Both, None, None).await {
    Ok(hits) => hits.into_iter().map(|hit| hit.node).collect(),
    Err(err) => {
      debug!(%err, "graph traversal failed, L5 arm contributes nothing");
      Vec::new()
    }
  }
}

/// Runs L3 (inverted index), L4 (entity index), and L6 (n-gram index) and
/// fuses them with RRF into a single ranked id list.
fn keyword_arm(indexes: &IndexSet<'_>, query: &SearchQuery, config: &RetrievalConfig) -> (Vec<Id>, std::collections::HashMap<Id, f64>) {
  let mut lists = Vec::new();
  let mut bm25_scores = std::collections::HashMap::new();

  if config.l3_inverted.enabled {
    let hits = indexes.inverted.query(&query.tokens, config.l3_inverted.top_k.max(1));
    for (id, _) in &hits {
      bm25_scores.insert(id.clone(), indexes.bm25.score(id, &query.tokens));
    }
    lists.push(hits.into_iter().map(|(id, _)| id).collect());
  }
  if config.l4_entity.enabled && !query.entity_filter.is_empty() {
    let hits = indexes.entity.query(&query.entity_filter, config.l4_entity.top_k.max(1));
    lists.push(hits.into_iter().map(|(id, _)| id).collect());
  }
  if config.l6_ngram.enabled {
    let hits = indexes.ngram.query(&query.text, config.l6_ngram.top_k.max(1));
    lists.push(hits.into_iter().map(|(id, _)| id).collect());
  }

  (fuse(&lists, config.rrf_k).into_iter().map(|(id, _)| id).collect(), bm25_scores)
}

/// Runs L7 (coarse vector search) then L8 (exact fine rerank over the
/// coarse candidates).
fn vector_arm(indexes: &IndexSet<'_>, query: &SearchQuery, config: &RetrievalConfig) -> Vec<Id> {
  if !config.l7_vector_coarse.enabled || query.embedding.is_empty() {
    return Vec::new();
  }
  let coarse = indexes.vector.query_coarse(&query.embedding, config.l7_vector_coarse.top_k.max(1));
  let coarse_ids: Vec<Id> = coarse.into_iter().map(|(id, _)| id).collect();
  if !config.l8_vector_fine.enabled || coarse_ids.is_empty() {
    return coarse_ids;
  }
  let fine = indexes.vector.rerank_fine(&coarse_ids, &query.embedding);
  fine.into_iter().map(|(id, _)| id).collect()
}

/// Runs L5 (graph traversal from the query's own entities, expanded one
/// hop, mapped back to memories mentioning the expanded entity set via
/// the entity index).
async fn graph_arm(indexes: &IndexSet<'_>, graph: &dyn GraphBackend, query: &SearchQuery, config: &RetrievalConfig) -> Vec<Id> {
  if !config.l5_graph.enabled || query.entity_filter.is_empty() {
    return Vec::new();
  }
  let expanded = graph_entity_expansion(graph, &query.entity_filter, 2).await;
  if expanded.is_empty() {
    return Vec::new();
  }
  let hits = indexes.entity.query(&expanded, config.l5_graph.top_k.max(1));
  hits.into_iter().map(|(id, _)| id).collect()
}

/// Runs the three parallel arms (keyword: L3+L4+L6, vector: L7+L8, graph:
/// L5) and fuses their outputs with RRF at the end. The arms are joined
/// with `tokio::join!`
/// rather than `tokio::spawn`, since they borrow the caller-owned
/// `IndexSet`/`GraphBackend` for the duration of the search instead of
/// taking `'static` ownership; the keyword and vector arms are CPU-bound
/// index lookups while the graph arm is the only one that actually
/// suspends on I/O, so this still overlaps the graph traversal with the
/// other two. Failures in the graph arm degrade gracefully (empty
/// contribution) rather than failing the whole search.
pub async fn run(indexes: &IndexSet<'_>, graph: &dyn GraphBackend, query: &SearchQuery, config: &RetrievalConfig) -> CandidateSet {
  let keyword_fut = async { keyword_arm(indexes, query, config) };
  let vector_fut = async { vector_arm(indexes, query, config) };
  let graph_fut = graph_arm(indexes, graph, query, config);
  let ((keyword_ids, bm25), vector_ids, graph_ids) = tokio::join!(keyword_fut, vector_fut, graph_fut);

  let fused = fuse(&[keyword_ids, vector_ids, graph_ids], config.rrf_k);
  let bloom_filtered: Vec<(Id, f64)> = if config.l1_bloom.enabled {
    fused.into_iter().filter(|(id, _)| indexes.bloom.might_contain(id)).collect()
  } else {
    fused
  };

  let filtered: Vec<Id> = if config.l2_temporal.enabled && (query.since.is_some() || query.until.is_some()) {
    let since = query.since.unwrap_or(i64::MIN);
    let until = query.until.unwrap_or(i64::MAX);
    let in_range: std::collections::HashSet<Id> = indexes.temporal.range(since, until, config.l2_temporal.top_k.max(1)).into_iter().collect();
    bloom_filtered.into_iter().filter(|(id, _)| in_range.contains(id)).map(|(id, _)| id).collect()
  } else {
    bloom_filtered.into_iter().map(|(id, _)| id).collect()
  };

  CandidateSet {
    ids: filtered,
    bm25,
    used_fallback: false,
  }
}

#[cfg(test)]
mod tests {
  use recall_entities::{EntityKey, EntityType};
  use recall_shared::RetrievalConfig;

  use super::*;

  struct NullGraph;

  #[async_trait::async_trait]
  impl GraphBackend for NullGraph {
    async fn upsert_entity(&mut self, entity: recall_entities::Entity) -> recall_shared::Result<EntityKey> {
      Ok(entity.key())
    }
    async fn upsert_fact(&mut self, _fact: recall_entities::Fact) -> recall_shared::Result<()> {
      Ok(())
    }
    async fn get_entity(&self, _key: &EntityKey) -> recall_shared::Result<Option<recall_entities::Entity>> {
      Ok(None)
    }
    async fn facts_for_triple(&self, _subject: &EntityKey, _predicate: &str) -> recall_shared::Result<Vec<recall_entities::Fact>> {
      Ok(Vec::new())
    }
    async fn traverse(
      &self,
      _start: &[EntityKey],
      _depth: usize,
      _direction: Direction,
      _predicate_filter: Option<&str>,
      _time_filter: Option<i64>,
    ) -> recall_shared::Result<Vec<recall_graph::TraversalHit>> {
      Ok(Vec::new())
    }
    async fn query_at_time(&self, _t: i64) -> recall_shared::Result<Vec<recall_entities::Fact>> {
      Ok(Vec::new())
    }
    async fn communities(&self, _algorithm: recall_graph::CommunityAlgorithm) -> recall_shared::Result<std::collections::HashMap<EntityKey, u64>> {
      Ok(std::collections::HashMap::new())
    }
    async fn save(&mut self) -> recall_shared::Result<()> {
      Ok(())
    }
  }

  #[tokio::test]
  async fn empty_query_against_empty_indexes_yields_no_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let bloom = BloomIndex::new(dir.path().join("bloom"), 100);
    let inverted = InvertedIndex::new(dir.path().join("inverted"));
    let bm25 = Bm25Index::new(dir.path().join("bm25"), 1.2, 0.75);
    let entity = EntityIndex::new(dir.path().join("entity"));
    let ngram = NgramIndex::new(dir.path().join("ngram"));
    let vector = VectorIndex::new(dir.path().join("vector"), 1000, recall_index::HnswParams::default());
    let temporal = TemporalIndex::new(dir.path().join("temporal"));

    let indexes = IndexSet {
      bloom: &bloom,
      temporal: &temporal,
      inverted: &inverted,
      bm25: &bm25,
      entity: &entity,
      ngram: &ngram,
      vector: &vector,
    };
    let graph = NullGraph;
    let query = SearchQuery {
      text: "hello".to_owned(),
      tokens: vec!["hello".to_owned()],
      ..Default::default()
    };
    let candidates = run(&indexes, &graph, &query, &RetrievalConfig::default()).await;
    assert!(candidates.ids.is_empty());
  }
}
