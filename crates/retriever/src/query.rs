use recall_entities::{EntityKey, Memory};
use recall_shared::Id;

/// Transport-neutral search request. The engine is responsible for
/// tokenizing `text` and embedding it before constructing this (the
/// retriever itself never calls the tokenizer or embedder so it stays a
/// pure ranking layer over whatever indexes it's handed).
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
  pub text: String,
  pub tokens: Vec<String>,
  pub embedding: Vec<f32>,
  pub entity_filter: Vec<EntityKey>,
  pub user_id: Option<String>,
  pub session_id: Option<String>,
  pub since: Option<i64>,
  pub until: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ScoredMemory {
  pub memory: Memory,
  pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
  pub hits: Vec<ScoredMemory>,
  pub warnings: Vec<String>,
  /// Set when no funnel stage returned candidates and the raw-text
  /// archive fallback produced the result set instead.
  pub used_fallback: bool,
}

/// The ranked candidate ids the L1-L8 stages produced, before L9-L11
/// rerank/filter (which need hydrated `Memory` records the retriever
/// doesn't own — the caller fetches those from the store and passes
/// them to `rerank`/`llm_filter`).
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
  pub ids: Vec<Id>,
  /// Per-id BM25 score, carried through from the keyword arm so L9 can
  /// reuse it without re-querying the inverted index.
  pub bm25: std::collections::HashMap<Id, f64>,
  pub used_fallback: bool,
}
