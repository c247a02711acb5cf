use recall_dedup::Decision;
use recall_entities::{Memory, MemoryRole};
use recall_shared::{now_ms, Id, RecallError, Result};
use tracing::debug;

use crate::engine::Engine;
use crate::types::{AddedTurn, TurnInput};

impl Engine {
  /// Runs one memory through tokenize → embed → dedup → store → index,
  /// filling in whatever the caller left blank. The store lock is
  /// acquired, then the index lock — never the graph lock, since plain
  /// ingest doesn't touch entities/facts (that's `extract_entities` /
  /// `upsert_relation`, called separately by the extraction jobs).
  async fn ingest(&self, mut memory: Memory) -> Result<Id> {
    if memory.tokens.is_empty() {
      let (tokens, _entities) = self.tokenizer.tokenize(&memory.content);
      memory.tokens = tokens;
    }
    if memory.embedding.is_empty() {
      memory.embedding = self.embedder.embed(&memory.content).await.unwrap_or_default();
    }

    let decision = {
      let dedup = self.dedup.read().await;
      let texts = self.dedup_texts.read().await;
      dedup.evaluate(&memory.tokens, &memory.embedding, &memory.content, &texts).await?
    };

    if let Decision::MergeInto(existing_id) = decision {
      debug!(memory_id = %memory.id, merged_into = %existing_id, "ingest deduplicated against an existing memory");
      return Ok(existing_id);
    }

    let id = memory.id.clone();
    let tokens = memory.tokens.clone();
    let text = memory.content.clone();
    let embedding = memory.embedding.clone();
    let created_at = memory.created_at;

    {
      let mut store = self.store.write().await;
      store.put(memory)?;
    }
    {
      let mut indexes = self.indexes.write().await;
      indexes.add(&id, &tokens, &text, &[], &embedding, created_at)?;
    }
    {
      let mut dedup = self.dedup.write().await;
      dedup.index(id.clone(), &tokens, embedding);
    }
    self.dedup_texts.write().await.insert(id.clone(), text);
    self.retention.write().await.initialize(id.clone(), 0.0, created_at)?;

    Ok(id)
  }

  /// `Add(memory) → id`. A second `Add` with identical
  /// content either returns the same id it deduplicated against, or a
  /// fresh one if the dedup pipeline judged it distinct — there is no
  /// third state, since `Memory` carries no `mention_count` of its own
  /// (that concept lives on `Entity`; see `DESIGN.md`).
  pub async fn add(&self, memory: Memory) -> Result<Id> {
    self.ingest(memory).await
  }

  /// `AddBatch(memories) → ids`. Each memory runs the same pipeline
  /// as `Add`; a failure partway through still returns the ids of the
  /// memories already committed; the failure itself is reported to the
  /// caller by returning an error without swallowing that progress.
  pub async fn add_batch(&self, memories: Vec<Memory>) -> Result<Vec<Id>> {
    let mut ids = Vec::with_capacity(memories.len());
    for memory in memories {
      ids.push(self.ingest(memory).await?);
    }
    Ok(ids)
  }

  /// `AddTurn(user_text, assistant_text, session) → (user_id, assistant_id)`.
  /// Mints strictly increasing `turn_seq` values for both halves of the
  /// turn.
  pub async fn add_turn(&self, turn: TurnInput) -> Result<AddedTurn> {
    if turn.user_text.is_empty() && turn.assistant_text.is_empty() {
      return Err(RecallError::invalid_argument("a turn must have at least one non-empty side"));
    }

    let user_seq = self.next_turn_seq(&turn.user_id, &turn.session_id).await;
    let mut user_builder = Memory::builder(turn.user_text, MemoryRole::User, turn.user_id.clone(), turn.session_id.clone()).turn_seq(user_seq);
    if let Some(character_id) = &turn.character_id {
      user_builder = user_builder.character_id(character_id.clone());
    }
    let user_memory_id = self.ingest(user_builder.build()).await?;

    let assistant_seq = self.next_turn_seq(&turn.user_id, &turn.session_id).await;
    let mut assistant_builder =
      Memory::builder(turn.assistant_text, MemoryRole::Assistant, turn.user_id, turn.session_id).turn_seq(assistant_seq);
    if let Some(character_id) = &turn.character_id {
      assistant_builder = assistant_builder.character_id(character_id.clone());
    }
    let assistant_memory_id = self.ingest(assistant_builder.build()).await?;

    Ok(AddedTurn { user_memory_id, assistant_memory_id })
  }

  /// `Delete(id, mode)`. Both modes purge `id` from every index —
  /// logical delete keeps the archive copy and historical record, but a
  /// tombstoned memory must stop being retrievable through the funnel the
  /// same as a physically deleted one.
  pub async fn delete(&self, id: &Id, mode: recall_store::DeleteMode) -> Result<()> {
    let mut store = self.store.write().await;
    store.delete(id, mode)?;
    drop(store);
    let mut indexes = self.indexes.write().await;
    indexes.remove(id)?;
    drop(indexes);
    if matches!(mode, recall_store::DeleteMode::Physical) {
      self.dedup.write().await.remove(id);
      self.dedup_texts.write().await.remove(id);
      self.memory_entities.write().await.remove(id);
    }
    Ok(())
  }

  /// `Get(id)` — O(1).
  pub async fn get(&self, id: &Id) -> Result<Option<Memory>> {
    self.store.write().await.get(id)
  }

  /// `List(filters, page) → seq<memory>`, restricted to one
  /// `(user, session)` scope the way `Store::list` is.
  pub async fn list(&self, user_id: &str, session_id: &str, since: Option<i64>, limit: usize) -> Vec<Memory> {
    self.store.read().await.list(user_id, session_id, since, limit)
  }

  pub async fn flush(&self) -> Result<()> {
    self.store.write().await.flush()?;
    self.indexes.write().await.snapshot()?;
    self.graph.write().await.save().await?;
    Ok(())
  }

  pub(crate) fn now(&self) -> i64 {
    now_ms()
  }
}
