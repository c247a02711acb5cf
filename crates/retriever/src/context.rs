use recall_entities::{CoreSettings, Foreshadowing, Memory, PersistentContextItem, Priority};
use recall_shared::Id;

use crate::query::ScoredMemory;

/// One ordered block of the assembled prompt context. `tokens` is the section's own token-count estimate, reusing
/// the same `tokens.len()` proxy `Memory` itself carries rather than
/// calling back into the tokenizer for a second pass.
#[derive(Debug, Clone)]
pub struct ContextSection {
  pub label: &'static str,
  pub text: String,
  pub tokens: usize,
}

#[derive(Debug, Clone, Default)]
pub struct BuiltContext {
  pub sections: Vec<ContextSection>,
  pub warnings: Vec<String>,
}

impl BuiltContext {
  #[must_use]
  pub fn rendered(&self) -> String {
    self.sections.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join("\n\n")
  }

  #[must_use]
  pub fn total_tokens(&self) -> usize {
    self.sections.iter().map(|s| s.tokens).sum()
  }
}

fn word_count(text: &str) -> usize {
  text.split_whitespace().count().max(1)
}

/// Assembles the prompt context in the fixed order L0 core settings →
/// persistent context → foreshadowing → retrieved memories → recent
/// turns, then truncates to `max_tokens` by dropping the
/// lowest-scoring retrieved memory first, then the oldest recent turn,
/// and never touching L0 or any `Priority::Critical` memory.
#[must_use]
pub fn build(
  core_settings: &CoreSettings,
  persistent_context: &[PersistentContextItem],
  foreshadowing: &[Foreshadowing],
  mut retrieved: Vec<ScoredMemory>,
  mut recent_turns: Vec<Memory>,
  max_tokens: usize,
) -> BuiltContext {
  let mut sections = Vec::new();
  let mut warnings = Vec::new();

  if !core_settings.is_empty() {
    let mut lines = Vec::new();
    if let Some(card) = &core_settings.character_card {
      lines.push(card.clone());
    }
    if let Some(worldbook) = &core_settings.worldbook {
      lines.push(worldbook.clone());
    }
    if let Some(style) = &core_settings.writing_style {
      lines.push(style.clone());
    }
    for rule in &core_settings.absolute_rules {
      lines.push(format!("RULE: {rule}"));
    }
    if let Some(conventions) = &core_settings.coding_conventions {
      lines.push(conventions.clone());
    }
    let text = lines.join("\n");
    let tokens = word_count(&text);
    sections.push(ContextSection { label: "core_settings", text, tokens });
  }

  if !persistent_context.is_empty() {
    let text = persistent_context.iter().map(|item| format!("[{}] {}", item.context_type, item.content)).collect::<Vec<_>>().join("\n");
    let tokens = word_count(&text);
    sections.push(ContextSection { label: "persistent_context", text, tokens });
  }

  if !foreshadowing.is_empty() {
    let text = foreshadowing.iter().map(|f| format!("{} ({:?})", f.content, f.state)).collect::<Vec<_>>().join("\n");
    let tokens = word_count(&text);
    sections.push(ContextSection { label: "foreshadowing", text, tokens });
  }

  retrieved.sort_by(|a, b| b.score.total_cmp(&a.score));
  recent_turns.sort_by_key(|m| m.turn_seq);

  let mut used: usize = sections.iter().map(|s| s.tokens).sum();

  let mut retrieved_sections: Vec<(ContextSection, bool, f64)> = retrieved
    .iter()
    .map(|hit| {
      let text = format!("[{}] {}", hit.memory.role, hit.memory.content);
      let tokens = word_count(&text);
      let critical = hit.memory.priority == Priority::Critical;
      (ContextSection { label: "retrieved", text, tokens }, critical, hit.score)
    })
    .collect();

  let mut recent_sections: Vec<(ContextSection, bool, i64)> = recent_turns
    .iter()
    .map(|memory| {
      let text = format!("[{}] {}", memory.role, memory.content);
      let tokens = word_count(&text);
      let critical = memory.priority == Priority::Critical;
      (ContextSection { label: "recent_turn", text, tokens }, critical, memory.turn_seq)
    })
    .collect();

  used += retrieved_sections.iter().map(|(s, _, _)| s.tokens).sum::<usize>();
  used += recent_sections.iter().map(|(s, _, _)| s.tokens).sum::<usize>();

  // Drop lowest-scoring non-critical retrieved memories first.
  while used > max_tokens {
    let drop_idx = retrieved_sections
      .iter()
      .enumerate()
      .filter(|(_, (_, critical, _))| !critical)
      .min_by(|a, b| a.1 .2.total_cmp(&b.1 .2))
      .map(|(i, _)| i);
    let Some(idx) = drop_idx else { break };
    let (dropped, _, _) = retrieved_sections.remove(idx);
    used -= dropped.tokens;
    warnings.push("context_truncated_retrieved".to_owned());
  }

  // Then drop the oldest non-critical recent turns.
  while used > max_tokens {
    let drop_idx = recent_sections
      .iter()
      .enumerate()
      .filter(|(_, (_, critical, _))| !critical)
      .min_by_key(|(_, (_, _, turn_seq))| *turn_seq)
      .map(|(i, _)| i);
    let Some(idx) = drop_idx else { break };
    let (dropped, _, _) = recent_sections.remove(idx);
    used -= dropped.tokens;
    warnings.push("context_truncated_recent".to_owned());
  }

  if used > max_tokens {
    warnings.push("context_exceeds_budget_after_truncation".to_owned());
  }

  sections.extend(retrieved_sections.into_iter().map(|(s, _, _)| s));
  sections.extend(recent_sections.into_iter().map(|(s, _, _)| s));

  BuiltContext { sections, warnings }
}

/// Items whose owner hasn't re-observed them in at least `reminder_turns`
/// turns and whose confidence still clears `importance_threshold`
///. `turns_since_seen` is supplied
/// by the caller, which is the only place that tracks per-session turn
/// indices.
#[must_use]
pub fn reminder_candidates<'a>(items: &'a [PersistentContextItem], turns_since_seen: &std::collections::HashMap<Id, u32>, reminder_turns: u32, importance_threshold: f64) -> Vec<&'a PersistentContextItem> {
  items
    .iter()
    .filter(|item| {
      let elapsed = turns_since_seen.get(&item.id).copied().unwrap_or(0);
      elapsed >= reminder_turns && item.confidence >= importance_threshold
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use recall_entities::MemoryRole;

  use super::*;

  #[test]
  fn core_settings_and_retrieved_memories_appear_in_order() {
    let core = CoreSettings {
      character_card: Some("A helpful assistant".to_owned()),
      ..Default::default()
    };
    let memory = Memory::builder("hi there", MemoryRole::User, "u1", "s1").build();
    let hit = ScoredMemory { memory, score: 1.0 };
    let built = build(&core, &[], &[], vec![hit], vec![], 10_000);
    assert_eq!(built.sections[0].label, "core_settings");
    assert_eq!(built.sections[1].label, "retrieved");
  }

  #[test]
  fn truncation_drops_lowest_scoring_retrieved_memory_first() {
    let core = CoreSettings::default();
    let keep = Memory::builder("important fact that must survive truncation", MemoryRole::User, "u1", "s1").build();
    let drop = Memory::builder("filler", MemoryRole::User, "u1", "s1").build();
    let keep_text_len = word_count(&format!("[{}] {}", keep.role, keep.content));
    let hits = vec![ScoredMemory { memory: keep.clone(), score: 10.0 }, ScoredMemory { memory: drop, score: 0.1 }];
    let built = build(&core, &[], &[], hits, vec![], keep_text_len);
    assert!(built.sections.iter().any(|s| s.text.contains("important fact")));
    assert!(!built.sections.iter().any(|s| s.text.contains("filler")));
  }

  #[test]
  fn critical_priority_memory_survives_truncation() {
    let core = CoreSettings::default();
    let critical = Memory::builder("must never drop", MemoryRole::User, "u1", "s1").priority(Priority::Critical).build();
    let filler = Memory::builder("drop me", MemoryRole::User, "u1", "s1").build();
    let hits = vec![ScoredMemory { memory: critical.clone(), score: 0.1 }, ScoredMemory { memory: filler, score: 0.2 }];
    let built = build(&core, &[], &[], hits, vec![], 1);
    assert!(built.sections.iter().any(|s| s.text.contains("must never drop")));
  }
}
