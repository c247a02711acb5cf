use std::collections::HashSet;

use recall_entities::Memory;
use recall_shared::Id;

/// Filter set accepted by `Search`/`List`.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
  pub source: Option<String>,
  pub tags: HashSet<String>,
  pub category: Option<String>,
  pub content_type: Option<String>,
  pub user_id: Option<String>,
  pub session_id: Option<String>,
  pub since: Option<i64>,
  pub until: Option<i64>,
}

impl SearchFilters {
  #[must_use]
  pub fn matches(&self, memory: &Memory) -> bool {
    if let Some(source) = &self.source {
      if memory.source.as_deref() != Some(source.as_str()) {
        return false;
      }
    }
    if !self.tags.is_empty() && self.tags.is_disjoint(&memory.tags) {
      return false;
    }
    if let Some(category) = &self.category {
      if memory.category.as_deref() != Some(category.as_str()) {
        return false;
      }
    }
    if let Some(content_type) = &self.content_type {
      if memory.content_type.as_deref() != Some(content_type.as_str()) {
        return false;
      }
    }
    if let Some(user_id) = &self.user_id {
      if &memory.user_id != user_id {
        return false;
      }
    }
    if let Some(session_id) = &self.session_id {
      if &memory.session_id != session_id {
        return false;
      }
    }
    if let Some(since) = self.since {
      if memory.created_at < since {
        return false;
      }
    }
    if let Some(until) = self.until {
      if memory.created_at > until {
        return false;
      }
    }
    true
  }
}

#[derive(Debug, Clone)]
pub struct SearchMatch {
  pub memory: Memory,
  pub score: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
  pub matches: Vec<SearchMatch>,
  pub warnings: Vec<String>,
  pub used_fallback: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
  pub total_memories: u64,
  pub l2_resident: u64,
  pub l1_resident: u64,
  pub total_entities: u64,
  pub total_facts: u64,
  pub pending_contradictions: u64,
  pub active_foreshadowings: u64,
  pub active_persistent_context: u64,
}

/// One turn supplied to `AddTurn`, pairing role with content so the
/// caller doesn't have to build two `Memory` records by hand.
#[derive(Debug, Clone)]
pub struct TurnInput {
  pub user_id: String,
  pub session_id: String,
  pub character_id: Option<String>,
  pub user_text: String,
  pub assistant_text: String,
}

#[derive(Debug, Clone)]
pub struct AddedTurn {
  pub user_memory_id: Id,
  pub assistant_memory_id: Id,
}
