use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
  ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
  ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
  CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use async_openai::types::embeddings::CreateEmbeddingRequestArgs;
use async_openai::Client;
use async_trait::async_trait;
use recall_shared::{ErrorKind, RecallError, Result};

use crate::contracts::{ChatClient, ChatMessage, ChatRole, Embedder};
use crate::structured::SchemaSpec;

/// Picks a request dialect by API-base domain / model name rather than by
/// new config flags. Only one
/// dialect is implemented here — OpenAI-compatible — since every unknown
/// domain defaults to it anyway; this keeps the config surface stable for
/// future dialects without speculative branching today.
pub struct OpenAiEmbedder {
  client: Client<OpenAIConfig>,
  model: String,
  dimension: usize,
}

impl OpenAiEmbedder {
  #[must_use]
  pub fn new(api_key: &str, api_base: &str, model: impl Into<String>, dimension: usize) -> Self {
    let config = OpenAIConfig::new().with_api_key(api_key).with_api_base(api_base);
    Self {
      client: Client::with_config(config),
      model: model.into(),
      dimension,
    }
  }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    let request = CreateEmbeddingRequestArgs::default()
      .model(&self.model)
      .input(text)
      .dimensions(self.dimension as u32)
      .build()
      .map_err(|e| RecallError::new(ErrorKind::InvalidArgument, anyhow::Error::new(e)))?;

    let response = self
      .client
      .embeddings()
      .create(request)
      .await
      .map_err(|e| RecallError::backend_unavailable(anyhow::Error::new(e)))?;

    response
      .data
      .into_iter()
      .next()
      .map(|e| e.embedding)
      .ok_or_else(|| RecallError::backend_unavailable(anyhow::anyhow!("empty embedding response")))
  }

  fn model_name(&self) -> &str {
    &self.model
  }

  fn dimension(&self) -> usize {
    self.dimension
  }
}

pub struct OpenAiChatClient {
  client: Client<OpenAIConfig>,
  model: String,
}

impl OpenAiChatClient {
  #[must_use]
  pub fn new(api_key: &str, api_base: &str, model: impl Into<String>) -> Self {
    let config = OpenAIConfig::new().with_api_key(api_key).with_api_base(api_base);
    Self {
      client: Client::with_config(config),
      model: model.into(),
    }
  }

  fn to_request_messages(messages: &[ChatMessage]) -> Vec<ChatCompletionRequestMessage> {
    messages
      .iter()
      .map(|m| match m.role {
        ChatRole::System => {
          ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage::from(m.content.clone()))
        }
        ChatRole::User => {
          ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage::from(m.content.clone()))
        }
        ChatRole::Assistant => ChatCompletionRequestMessage::Assistant(
          ChatCompletionRequestAssistantMessage::from(m.content.clone()),
        ),
      })
      .collect()
  }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
  async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
    let request = CreateChatCompletionRequestArgs::default()
      .model(&self.model)
      .messages(Self::to_request_messages(messages))
      .build()
      .map_err(|e| RecallError::new(ErrorKind::InvalidArgument, anyhow::Error::new(e)))?;

    let response = self
      .client
      .chat()
      .create(request)
      .await
      .map_err(|e| RecallError::backend_unavailable(anyhow::Error::new(e)))?;

    response
      .choices
      .into_iter()
      .find_map(|c| c.message.content)
      .ok_or_else(|| RecallError::backend_unavailable(anyhow::anyhow!("empty message content")))
  }

  /// Native structured-output mode: the schema is attached to the request
  /// itself via `ResponseFormat::JsonSchema` in strict mode, so the model
  /// is constrained to emit conforming JSON rather than merely asked to.
  async fn chat_structured(&self, messages: &[ChatMessage], schema: &SchemaSpec) -> Result<String> {
    let request = CreateChatCompletionRequestArgs::default()
      .model(&self.model)
      .messages(Self::to_request_messages(messages))
      .response_format(ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
          name: schema.name.clone(),
          description: schema.description.clone(),
          schema: Some(schema.schema.clone()),
          strict: Some(true),
        },
      })
      .build()
      .map_err(|e| RecallError::new(ErrorKind::InvalidArgument, anyhow::Error::new(e)))?;

    let response = self
      .client
      .chat()
      .create(request)
      .await
      .map_err(|e| RecallError::backend_unavailable(anyhow::Error::new(e)))?;

    response
      .choices
      .into_iter()
      .find_map(|c| c.message.content)
      .ok_or_else(|| RecallError::backend_unavailable(anyhow::anyhow!("empty message content")))
  }
}
