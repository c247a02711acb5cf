use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use recall_ai::{
  BudgetManager, BudgetedChatClient, CachedEmbedder, ChatClient, DeterministicEmbedder, Embedder, EmbeddingCache, OpenAiChatClient, OpenAiEmbedder,
};
use recall_shared::{Config, EmbeddingMode};

/// Builds the embedder the engine will hold for the lifetime of the
/// process, selecting a backend per `EmbeddingMode` and wrapping it with
/// the cache/rate-limit/circuit-breaker stack every provider gets
/// regardless of backend.
#[must_use]
pub fn build_embedder(config: &Config, data_root: &Path) -> Arc<dyn Embedder> {
  let cache = Arc::new(EmbeddingCache::new(data_root.join("cache").join("embeddings"), 10_000));
  let rate_limit = config.embedding.rate_limit;
  let rate_window = Duration::from_secs(config.embedding.rate_window_secs);

  let use_cloud = match config.embedding.mode {
    EmbeddingMode::Cloud => true,
    EmbeddingMode::Local | EmbeddingMode::Lite => false,
    EmbeddingMode::Auto => config.embedding.api_key.is_some(),
  };

  if use_cloud {
    if let Some(api_key) = &config.embedding.api_key {
      let api_base = config.embedding.api_base.as_deref().unwrap_or("https://api.openai.com/v1");
      let inner = OpenAiEmbedder::new(api_key, api_base, config.embedding.model.clone(), config.embedding.dimension);
      return Arc::new(CachedEmbedder::new(inner, cache, rate_limit, rate_window));
    }
  }

  let inner = DeterministicEmbedder::new(config.embedding.dimension);
  Arc::new(CachedEmbedder::new(inner, cache, rate_limit, rate_window))
}

/// Builds the chat client, when an LLM key is configured, wrapped with
/// the hourly/daily budget manager every analyzer shares. `None` when no key is present — every caller of
/// this is expected to treat that as "run in manual/rules-only mode".
#[must_use]
pub fn build_chat(config: &Config) -> Option<Arc<dyn ChatClient>> {
  let api_key = config.llm.api_key.as_ref()?;
  let api_base = config.llm.api_base.as_deref().unwrap_or("https://api.openai.com/v1");
  let inner = OpenAiChatClient::new(api_key, api_base, config.llm.model.clone());
  let budget = Arc::new(BudgetManager::new(config.llm.budget_hourly_limit, config.llm.budget_daily_limit));
  Some(Arc::new(BudgetedChatClient::new(inner, budget)))
}
