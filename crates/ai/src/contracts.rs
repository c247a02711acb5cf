use async_trait::async_trait;
use recall_shared::Result;

use crate::structured::SchemaSpec;

/// `Embed(text) -> vector` pluggable backend contract. Deterministic
/// for a given `(text, model)` pair so the disk+LRU cache can key on a hash
/// of the two.
#[async_trait]
pub trait Embedder: Send + Sync {
  async fn embed(&self, text: &str) -> Result<Vec<f32>>;

  /// Batched form; the default just calls `embed` sequentially, but a
  /// real backend overrides it to use a provider's batch endpoint.
  async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    for t in texts {
      out.push(self.embed(t).await?);
    }
    Ok(out)
  }

  fn model_name(&self) -> &str;

  fn dimension(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
  System,
  User,
  Assistant,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
  pub role: ChatRole,
  pub content: String,
}

impl ChatMessage {
  #[must_use]
  pub fn system(content: impl Into<String>) -> Self {
    Self {
      role: ChatRole::System,
      content: content.into(),
    }
  }

  #[must_use]
  pub fn user(content: impl Into<String>) -> Self {
    Self {
      role: ChatRole::User,
      content: content.into(),
    }
  }
}

/// `Chat(messages) -> text` pluggable backend contract.
#[async_trait]
pub trait ChatClient: Send + Sync {
  async fn chat(&self, messages: &[ChatMessage]) -> Result<String>;

  /// Structured variant: build a `SchemaSpec` from the type the caller
  /// expects back via `SchemaSpec::for_type`, then ask the backend to
  /// conform to it. The default implementation appends the schema as a
  /// system message and hopes the model complies; `OpenAiChatClient`
  /// overrides this to use the provider's native JSON-schema
  /// structured-output mode instead, which actually enforces it.
  async fn chat_structured(&self, messages: &[ChatMessage], schema: &SchemaSpec) -> Result<String> {
    let mut augmented = messages.to_vec();
    augmented.push(ChatMessage::system(format!("Respond with JSON only, matching this schema: {}", schema.schema)));
    self.chat(&augmented).await
  }
}
