use std::sync::Arc;

use recall_ai::{ChatClient, ChatMessage};
use recall_shared::{RetrievalConfig, Result};
use tracing::warn;

use crate::query::ScoredMemory;

/// L10 cross-encoder rerank: both disabled by default.
/// No dedicated cross-encoder crate exists in this corpus, so this stage
/// is grounded on the same `ChatClient` contract the rest of the system
/// uses for LLM calls: a direct relevance prompt per candidate, treated
/// as a (slow, accurate) pairwise scorer rather than a bi-encoder. Only
/// worth the latency when `l10_cross_encoder.enabled`.
pub async fn cross_encoder_rerank(chat: &Arc<dyn ChatClient>, query_text: &str, candidates: Vec<ScoredMemory>, config: &RetrievalConfig) -> Vec<ScoredMemory> {
  if !config.l10_cross_encoder.enabled {
    return candidates;
  }
  let mut rescored = Vec::with_capacity(candidates.len());
  for mut candidate in candidates {
    let prompt = format!("Query: {query_text}\nCandidate: {}\nRate relevance 0-10, respond with just the number.", candidate.memory.content);
    match chat.chat(&[ChatMessage::user(prompt)]).await {
      Ok(reply) => {
        if let Some(score) = reply.trim().split_whitespace().next().and_then(|s| s.parse::<f64>().ok()) {
          candidate.score = score / 10.0;
        }
      }
      Err(err) => warn!(%err, "cross-encoder rescore failed, keeping L9 score"),
    }
    rescored.push(candidate);
  }
  rescored.sort_by(|a, b| b.score.total_cmp(&a.score));
  if config.l10_cross_encoder.top_k > 0 {
    rescored.truncate(config.l10_cross_encoder.top_k);
  }
  rescored
}

/// L11 LLM relevance filter: disabled by default. Asks the chat model to
/// drop candidates it judges irrelevant to the query, the last and most
/// expensive filter in the funnel.
pub async fn llm_filter(chat: &Arc<dyn ChatClient>, query_text: &str, candidates: Vec<ScoredMemory>, config: &RetrievalConfig) -> Result<Vec<ScoredMemory>> {
  if !config.l11_llm_filter.enabled || candidates.is_empty() {
    return Ok(candidates);
  }
  let listing: String = candidates.iter().enumerate().map(|(i, c)| format!("{i}: {}", c.memory.content)).collect::<Vec<_>>().join("\n");
  let prompt = format!("Query: {query_text}\nCandidates:\n{listing}\n\nReturn the indices (comma-separated) of candidates actually relevant to the query.");
  let reply = chat.chat(&[ChatMessage::user(prompt)]).await?;
  let keep: std::collections::HashSet<usize> = reply.split(|c: char| !c.is_ascii_digit()).filter_map(|tok| tok.parse().ok()).collect();
  if keep.is_empty() {
    return Ok(candidates);
  }
  let mut filtered: Vec<ScoredMemory> = candidates.into_iter().enumerate().filter(|(i, _)| keep.contains(i)).map(|(_, c)| c).collect();
  if config.l11_llm_filter.top_k > 0 {
    filtered.truncate(config.l11_llm_filter.top_k);
  }
  Ok(filtered)
}
