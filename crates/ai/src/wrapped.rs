use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use recall_shared::Result;
use tracing::warn;

use crate::budget::BudgetManager;
use crate::cache::EmbeddingCache;
use crate::circuit_breaker::CircuitBreaker;
use crate::contracts::{ChatClient, ChatMessage, Embedder};
use crate::rate_limit::SlidingWindowLimiter;
use crate::structured::SchemaSpec;

/// Wraps any `Embedder` with the cache, rate limiter, and circuit breaker
/// that act as process-wide shared resources. This is the type the engine
/// actually holds; `DeterministicEmbedder`/`OpenAiEmbedder` are the
/// pluggable backends underneath it.
pub struct CachedEmbedder<E: Embedder> {
  inner: E,
  cache: Arc<EmbeddingCache>,
  limiter: Arc<SlidingWindowLimiter>,
  breaker: Arc<CircuitBreaker>,
}

impl<E: Embedder> CachedEmbedder<E> {
  pub fn new(inner: E, cache: Arc<EmbeddingCache>, rate_limit: u32, rate_window: Duration) -> Self {
    Self {
      inner,
      cache,
      limiter: Arc::new(SlidingWindowLimiter::new(rate_limit, rate_window)),
      breaker: Arc::new(CircuitBreaker::new(5, 30)),
    }
  }
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    if let Some(cached) = self.cache.get(text, self.inner.model_name()) {
      return Ok(cached);
    }

    if self.breaker.is_open() {
      warn!("embedding circuit breaker open, skipping call");
      return Err(recall_shared::RecallError::backend_unavailable(anyhow::anyhow!(
        "embedding circuit breaker open"
      )));
    }

    if !self.limiter.acquire(Duration::from_secs(5)).await {
      return Err(recall_shared::RecallError::rate_limited("embedding rate limit exceeded"));
    }

    match self.inner.embed(text).await {
      Ok(vector) => {
        self.breaker.record_success();
        let _ = self.cache.put(text, self.inner.model_name(), vector.clone());
        Ok(vector)
      }
      Err(err) => {
        self.breaker.record_failure();
        Err(err)
      }
    }
  }

  fn model_name(&self) -> &str {
    self.inner.model_name()
  }

  fn dimension(&self) -> usize {
    self.inner.dimension()
  }
}

/// Wraps any `ChatClient` with the budget manager and circuit breaker.
pub struct BudgetedChatClient<C: ChatClient> {
  inner: C,
  budget: Arc<BudgetManager>,
  breaker: Arc<CircuitBreaker>,
}

impl<C: ChatClient> BudgetedChatClient<C> {
  pub fn new(inner: C, budget: Arc<BudgetManager>) -> Self {
    Self {
      inner,
      budget,
      breaker: Arc::new(CircuitBreaker::new(3, 30)),
    }
  }
}

#[async_trait]
impl<C: ChatClient> ChatClient for BudgetedChatClient<C> {
  async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
    if self.breaker.is_open() {
      return Err(recall_shared::RecallError::backend_unavailable(anyhow::anyhow!(
        "llm circuit breaker open"
      )));
    }
    if !self.budget.try_admit() {
      return Err(recall_shared::RecallError::budget_exceeded("LLM call budget exhausted"));
    }
    match self.inner.chat(messages).await {
      Ok(text) => {
        self.breaker.record_success();
        Ok(text)
      }
      Err(err) => {
        self.breaker.record_failure();
        Err(err)
      }
    }
  }

  /// Forwards to `inner.chat_structured` rather than falling through to
  /// the trait default, so wrapping a provider that implements native
  /// structured output (e.g. `OpenAiChatClient`) doesn't silently downgrade
  /// it to the prompt-based fallback.
  async fn chat_structured(&self, messages: &[ChatMessage], schema: &SchemaSpec) -> Result<String> {
    if self.breaker.is_open() {
      return Err(recall_shared::RecallError::backend_unavailable(anyhow::anyhow!(
        "llm circuit breaker open"
      )));
    }
    if !self.budget.try_admit() {
      return Err(recall_shared::RecallError::budget_exceeded("LLM call budget exhausted"));
    }
    match self.inner.chat_structured(messages, schema).await {
      Ok(text) => {
        self.breaker.record_success();
        Ok(text)
      }
      Err(err) => {
        self.breaker.record_failure();
        Err(err)
      }
    }
  }
}
