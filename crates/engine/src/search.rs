use recall_entities::EntityKey;
use recall_retriever::{build_context, fallback_scan, llm_filter, rerank, run_funnel, BuiltContext, ScoredMemory, SearchQuery};
use recall_shared::{now_ms, Id, Result};

use crate::engine::Engine;
use crate::types::{SearchFilters, SearchMatch, SearchOutcome};

impl Engine {
  async fn entity_filter_for(&self, text: &str) -> Vec<EntityKey> {
    let (_tokens, extracted) = self.tokenizer.tokenize(text);
    let graph = self.graph.read().await;
    let mut keys = Vec::new();
    for candidate in extracted {
      let key = EntityKey::new(&candidate.name, candidate.guessed_type);
      if graph.get_entity(&key).await.ok().flatten().is_some() {
        keys.push(key);
      }
    }
    keys
  }

  /// `Search(query, filters, limit) → seq<match>`. Runs the L1-L8
  /// funnel, falls back to the raw-text archive scan when it returns
  /// nothing, hydrates the survivors
  /// from the store, reranks (L9), then optionally cross-encoder/LLM
  /// filters (L10/L11) before applying `filters`/`limit`.
  pub async fn search(&self, query_text: &str, filters: &SearchFilters, limit: usize) -> Result<SearchOutcome> {
    let config = self.config().await;
    let (tokens, _) = self.tokenizer.tokenize(query_text);
    let embedding = self.embedder.embed(query_text).await.unwrap_or_default();
    let entity_filter = self.entity_filter_for(query_text).await;

    let query = SearchQuery {
      text: query_text.to_owned(),
      tokens,
      embedding: embedding.clone(),
      entity_filter: entity_filter.clone(),
      user_id: filters.user_id.clone(),
      session_id: filters.session_id.clone(),
      since: filters.since,
      until: filters.until,
    };

    let indexes = self.indexes.read().await;
    let graph = self.graph.read().await;
    let index_set = indexes.as_index_set();
    let candidates = run_funnel(&index_set, graph.as_ref(), &query, &config.retrieval).await;
    drop(graph);
    drop(indexes);

    let mut warnings = Vec::new();
    let mut used_fallback = false;

    let mut store = self.store.write().await;
    let mut hydrated = Vec::new();
    for id in &candidates.ids {
      if let Some(memory) = store.get(id)? {
        if !memory.is_deleted() {
          hydrated.push(memory);
        }
      }
    }

    if hydrated.is_empty() && config.retrieval.fallback_enabled {
      let archive = store.scan_archive()?;
      let scored = fallback_scan(archive, query_text, &config.retrieval).await;
      drop(store);
      used_fallback = true;
      warnings.push("fallback_used".to_owned());
      let matches: Vec<SearchMatch> = scored
        .into_iter()
        .filter(|s| filters.matches(&s.memory))
        .take(limit.max(1))
        .map(|s| SearchMatch { memory: s.memory, score: s.score })
        .collect();
      return Ok(SearchOutcome { matches, warnings, used_fallback });
    }
    drop(store);

    let memory_entities = self.memory_entities.read().await.clone();
    let retention = self.retention.read().await;
    let ranked: Vec<ScoredMemory> = rerank(hydrated, &candidates.bm25, &embedding, &entity_filter, &memory_entities, &retention, &config.retrieval);
    drop(retention);

    let mut ranked = ranked;
    if config.retrieval.l10_cross_encoder.enabled {
      if let Some(chat) = &self.chat {
        ranked = recall_retriever::cross_encoder_rerank(chat, query_text, ranked, &config.retrieval).await;
      }
    }
    if config.retrieval.l11_llm_filter.enabled {
      if let Some(chat) = &self.chat {
        match llm_filter(chat, query_text, ranked, &config.retrieval).await {
          Ok(filtered) => ranked = filtered,
          Err(err) => warnings.push(format!("stage L11 skipped: {err}")),
        }
      }
    }

    let now = now_ms();
    {
      let mut retention = self.retention.write().await;
      for scored in &ranked {
        let _ = retention.reinforce(&scored.memory.id, now);
      }
    }

    let matches: Vec<SearchMatch> = ranked
      .into_iter()
      .filter(|s| filters.matches(&s.memory))
      .take(limit.max(1))
      .map(|s| SearchMatch { memory: s.memory, score: s.score })
      .collect();

    Ok(SearchOutcome { matches, warnings, used_fallback })
  }

  /// `BuildContext(query, budget_tokens) → string`. Searches, then
  /// assembles the fixed-order context block.
  pub async fn build_context(&self, query_text: &str, filters: &SearchFilters, max_tokens: usize) -> Result<BuiltContext> {
    let outcome = self.search(query_text, filters, 50).await?;
    let scored: Vec<ScoredMemory> = outcome.matches.into_iter().map(|m| ScoredMemory { memory: m.memory, score: m.score }).collect();

    let core_settings = self.store.read().await.core_settings().clone();
    let persistent_context: Vec<recall_entities::PersistentContextItem> = match &filters.user_id {
      Some(user_id) => self.persistent_context.read().await.active_items(user_id).into_iter().cloned().collect(),
      None => Vec::new(),
    };
    // Foreshadowing is tracked per character, not per search filter; the
    // caller fetches it separately via `active_foreshadowing` and folds it
    // into a richer context build if it wants that section populated.
    let foreshadowing: Vec<recall_entities::Foreshadowing> = Vec::new();

    let recent_turns = if let (Some(user_id), Some(session_id)) = (&filters.user_id, &filters.session_id) {
      self.list(user_id, session_id, None, 20).await
    } else {
      Vec::new()
    };

    let mut built = build_context(&core_settings, &persistent_context, &foreshadowing, scored, recent_turns, max_tokens);
    built.warnings.extend(outcome.warnings);
    Ok(built)
  }

  /// Ids the raw-text fallback would also have found, used by the
  /// total-recall property test to assert recall independent of which
  /// funnel stage actually served the hit.
  pub async fn contains_via_any_stage(&self, id: &Id, query_text: &str) -> bool {
    self.search(query_text, &SearchFilters::default(), 10).await.map(|o| o.matches.iter().any(|m| &m.memory.id == id)).unwrap_or(false)
  }
}
