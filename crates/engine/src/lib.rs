mod analyzers;
mod config;
mod contradictions;
mod engine;
mod episodes;
mod graph_ops;
mod indexes;
mod ingest;
mod jobs;
mod providers;
mod search;
mod stats;
mod types;

pub use engine::Engine;
pub use recall_graph::Outcome as RelationOutcome;
pub use stats::ModeReport;
pub use types::{AddedTurn, SearchFilters, SearchMatch, SearchOutcome, Stats, TurnInput};

#[cfg(test)]
mod tests {
  use recall_entities::{EntityType, Memory, MemoryRole};
  use recall_shared::Id;

  use super::*;

  async fn open_engine() -> (Engine, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::open(dir.path()).await.unwrap();
    (engine, dir)
  }

  /// A memory findable by exact substring is always returned by `search`,
  /// whether or not the funnel's structured stages happened to surface it,
  /// because the raw-text fallback guarantees total recall.
  #[tokio::test]
  async fn search_guarantees_recall_via_fallback() {
    let (engine, _dir) = open_engine().await;
    let memory = Memory::builder("金色蝴蝶在月光下飞舞", MemoryRole::User, "u1", "s1").build();
    let id = engine.add(memory).await.unwrap();

    let found = engine.contains_via_any_stage(&id, "月光蝴蝶").await;
    assert!(found, "exact-ish substring query must find the memory via fallback if nothing else");
  }

  /// turn_seq is strictly increasing per (user, session), even across
  /// separate `add_turn` calls.
  #[tokio::test]
  async fn turn_seq_strictly_increases_across_turns() {
    let (engine, _dir) = open_engine().await;
    let turn = TurnInput {
      user_id: "u1".to_owned(),
      session_id: "s1".to_owned(),
      character_id: None,
      user_text: "hello".to_owned(),
      assistant_text: "hi there".to_owned(),
    };
    engine.add_turn(turn.clone()).await.unwrap();
    engine.add_turn(turn).await.unwrap();

    let listed = engine.list("u1", "s1", None, 10).await;
    let mut seqs: Vec<i64> = listed.iter().map(|m| m.turn_seq).collect();
    seqs.sort_unstable();
    let mut expected = seqs.clone();
    expected.dedup();
    assert_eq!(seqs, expected, "turn_seq values must be unique per (user, session)");
  }

  /// An explicit override always wins over a mode-derived default.
  /// `RECALL_MODE=performance` would normally disable foreshadowing, but an
  /// explicit `FORESHADOWING_ENABLED=true` must still take effect.
  #[tokio::test]
  async fn explicit_override_beats_mode_derived_default() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("config")).unwrap();
    std::fs::write(
      dir.path().join("config").join("api_keys.env"),
      "RECALL_MODE=performance\nFORESHADOWING_ENABLED=true\n",
    )
    .unwrap();

    let engine = Engine::open(dir.path()).await.unwrap();
    let mode = engine.mode().await;
    assert!(mode.foreshadowing_enabled, "explicit override must survive a performance-mode default");
  }

  #[tokio::test]
  async fn add_then_get_roundtrips() {
    let (engine, _dir) = open_engine().await;
    let memory = Memory::builder("remember this", MemoryRole::User, "u1", "s1").build();
    let id = engine.add(memory).await.unwrap();
    let fetched = engine.get(&id).await.unwrap();
    assert_eq!(fetched.unwrap().content, "remember this");
  }

  #[tokio::test]
  async fn duplicate_add_deduplicates_to_the_same_id() {
    let (engine, _dir) = open_engine().await;
    let first = engine.add(Memory::builder("the sky is blue today", MemoryRole::User, "u1", "s1").build()).await.unwrap();
    let second = engine.add(Memory::builder("the sky is blue today", MemoryRole::User, "u1", "s1").build()).await.unwrap();
    assert_eq!(first, second, "identical content must deduplicate to the same id");
  }

  #[tokio::test]
  async fn stats_reflects_added_memories() {
    let (engine, _dir) = open_engine().await;
    engine.add(Memory::builder("one", MemoryRole::User, "u1", "s1").build()).await.unwrap();
    engine.add(Memory::builder("two", MemoryRole::User, "u1", "s1").build()).await.unwrap();
    let stats = engine.stats().await;
    assert_eq!(stats.total_memories, 2);
  }

  #[tokio::test]
  async fn extract_entities_populates_the_side_table() {
    let (engine, _dir) = open_engine().await;
    let id = engine.add(Memory::builder("Alice went to Paris", MemoryRole::User, "u1", "s1").build()).await.unwrap();
    let keys = engine.extract_entities(&id).await.unwrap();
    assert!(!keys.is_empty());
  }

  #[tokio::test]
  async fn plant_and_resolve_foreshadowing_roundtrips() {
    let (engine, _dir) = open_engine().await;
    let id = engine.plant_foreshadowing("char1", "a locked door appears", 0.8, "chapter 2").await;
    assert_eq!(engine.active_foreshadowing("char1").await.len(), 1);
    engine.resolve_foreshadowing(&id).await.unwrap();
    assert!(engine.active_foreshadowing("char1").await.is_empty());
  }

  #[tokio::test]
  async fn upsert_relation_inserts_then_merges_reaffirmation() {
    let (engine, _dir) = open_engine().await;
    let bob = EntityType::Person;
    let key = recall_entities::EntityKey::new("bob", bob);
    let outcome1 = engine.upsert_relation(key.clone(), "hair_color", recall_entities::FactObject::Literal("black".to_owned()), 0.9, None, None).await.unwrap();
    assert!(matches!(outcome1, RelationOutcome::Inserted));

    let outcome2 = engine.upsert_relation(key, "hair_color", recall_entities::FactObject::Literal("black".to_owned()), 0.9, None, None).await.unwrap();
    assert!(matches!(outcome2, RelationOutcome::Merged(_)));
  }

  #[tokio::test]
  async fn resident_id_not_found_returns_none() {
    let (engine, _dir) = open_engine().await;
    assert!(engine.get(&Id::new("mem")).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn upsert_relation_supersedes_the_prior_fact_on_conflict() {
    let (engine, _dir) = open_engine().await;
    let bob = recall_entities::EntityKey::new("bob", EntityType::Person);

    let jan = 1_704_067_200_000; // 2024-01-01
    let jun = 1_717_200_000_000; // 2024-06-01
    let mar = 1_709_251_200_000; // 2024-03-01, between the two

    engine
      .upsert_relation(bob.clone(), "hair_color", recall_entities::FactObject::Literal("black".to_owned()), 0.9, Some(jan), None)
      .await
      .unwrap();
    let outcome = engine
      .upsert_relation(bob.clone(), "hair_color", recall_entities::FactObject::Literal("golden".to_owned()), 0.9, Some(jun), None)
      .await
      .unwrap();
    assert!(matches!(outcome, RelationOutcome::Conflict(_)));

    let active = engine.facts_for_triple(&bob, "hair_color").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].object, recall_entities::FactObject::Literal("golden".to_owned()));

    let facts = engine.facts_at_time(mar).await.unwrap();
    let hair_color_at_mar = facts.iter().find(|f| f.subject == bob && f.predicate == "hair_color").unwrap();
    assert_eq!(hair_color_at_mar.object, recall_entities::FactObject::Literal("black".to_owned()));
  }

  #[tokio::test]
  async fn logical_delete_removes_memory_from_search() {
    let (engine, _dir) = open_engine().await;
    let id = engine.add(Memory::builder("a singularly unique mention of xylophones", MemoryRole::User, "u1", "s1").build()).await.unwrap();

    let before = engine.search("xylophones", &SearchFilters::default(), 10).await.unwrap();
    assert!(before.matches.iter().any(|m| m.memory.id == id));

    engine.delete(&id, recall_store::DeleteMode::Logical).await.unwrap();

    let after = engine.search("xylophones", &SearchFilters::default(), 10).await.unwrap();
    assert!(after.matches.iter().all(|m| m.memory.id != id));
  }
}
