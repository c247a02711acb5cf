use async_trait::async_trait;
use recall_entities::{Entity, EntityKey, Fact};
use recall_shared::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
  Out,
  In,
  Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunityAlgorithm {
  Louvain,
  LabelProp,
  Connected,
}

/// One hop reached during a traversal, carrying the path of predicates
/// that got there.
#[derive(Debug, Clone)]
pub struct TraversalHit {
  pub node: EntityKey,
  pub path: Vec<String>,
}

/// The knowledge graph's backend contract. `async-trait` mirrors the
/// contract style used for `Embedder`/`ChatClient` even though the
/// shipped backend is local-disk; it keeps the door open for a future
/// network-backed implementation without changing call sites.
#[async_trait]
pub trait GraphBackend: Send + Sync {
  async fn upsert_entity(&mut self, entity: Entity) -> Result<EntityKey>;

  /// Finds the `(subject, predicate, object)` triple. If an `ACTIVE` fact
  /// already occupies it the caller (the contradiction manager) decides
  /// what happens next; this method only performs the raw insert/replace.
  async fn upsert_fact(&mut self, fact: Fact) -> Result<()>;

  async fn get_entity(&self, key: &EntityKey) -> Result<Option<Entity>>;

  /// All facts currently stored for the triple, in insertion order, so the
  /// contradiction manager can find the active one (if any).
  async fn facts_for_triple(&self, subject: &EntityKey, predicate: &str) -> Result<Vec<Fact>>;

  async fn traverse(
    &self,
    start: &[EntityKey],
    depth: usize,
    direction: Direction,
    predicate_filter: Option<&str>,
    time_filter: Option<i64>,
  ) -> Result<Vec<TraversalHit>>;

  /// Facts whose `fact_time` interval contains `t`.
  /// Facts with `fact_time = None` are treated as always-valid.
  async fn query_at_time(&self, t: i64) -> Result<Vec<Fact>>;

  async fn communities(&self, algorithm: CommunityAlgorithm) -> Result<std::collections::HashMap<EntityKey, u64>>;

  async fn save(&mut self) -> Result<()>;

  /// `(entity count, fact count)` for the stats operation.
  fn counts(&self) -> (u64, u64);
}
