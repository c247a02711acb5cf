use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction as PetDirection;
use recall_entities::{Entity, EntityKey, Fact, FactObject, FactStatus};
use recall_shared::Result;
use serde::{Deserialize, Serialize};

use crate::backend::{CommunityAlgorithm, Direction, GraphBackend, TraversalHit};
use crate::communities::{connected_components, label_propagation, louvain};

#[derive(Default, Serialize, Deserialize)]
struct Snapshot {
  entities: Vec<Entity>,
  edge_facts: Vec<Fact>,
  literal_facts: Vec<Fact>,
}

/// Default, zero-dependency-beyond-serde graph backend: an in-memory
/// `petgraph` multigraph persisted as a single JSON file. Entity-to-entity facts become
/// edges; entity-to-literal facts (most attributes) have no graph target
/// and are kept in a side table keyed by `(subject, predicate)`.
pub struct FileGraphBackend {
  path: PathBuf,
  graph: DiGraph<EntityKey, Fact>,
  nodes: HashMap<EntityKey, NodeIndex>,
  entities: HashMap<EntityKey, Entity>,
  literal_facts: HashMap<(EntityKey, String), Vec<Fact>>,
  dirty: bool,
}

impl FileGraphBackend {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>) -> Self {
    Self {
      path: dir.as_ref().join("graph.json"),
      graph: DiGraph::new(),
      nodes: HashMap::new(),
      entities: HashMap::new(),
      literal_facts: HashMap::new(),
      dirty: true,
    }
  }

  pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
    let mut backend = Self::new(dir);
    if !backend.path.exists() {
      return Ok(backend);
    }
    let bytes = fs::read(&backend.path)?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    for entity in snapshot.entities {
      let key = entity.key();
      let idx = backend.ensure_node(&key);
      backend.entities.insert(key, entity);
      let _ = idx;
    }
    for fact in snapshot.edge_facts {
      if let FactObject::Entity(object_key) = fact.object.clone() {
        let from = backend.ensure_node(&fact.subject);
        let to = backend.ensure_node(&object_key);
        backend.graph.add_edge(from, to, fact);
      }
    }
    for fact in snapshot.literal_facts {
      backend
        .literal_facts
        .entry((fact.subject.clone(), fact.predicate.clone()))
        .or_default()
        .push(fact);
    }
    Ok(backend)
  }

  fn ensure_node(&mut self, key: &EntityKey) -> NodeIndex {
    if let Some(idx) = self.nodes.get(key) {
      return *idx;
    }
    let idx = self.graph.add_node(key.clone());
    self.nodes.insert(key.clone(), idx);
    idx
  }
}

#[async_trait]
impl GraphBackend for FileGraphBackend {
  async fn upsert_entity(&mut self, mut entity: Entity) -> Result<EntityKey> {
    let key = entity.key();
    self.ensure_node(&key);
    if let Some(existing) = self.entities.get_mut(&key) {
      existing.aliases.extend(entity.aliases.drain());
      existing.attributes.extend(entity.attributes.drain());
      if entity.summary.is_some() {
        existing.summary = entity.summary;
      }
      existing.touch();
    } else {
      self.entities.insert(key.clone(), entity);
    }
    self.dirty = true;
    Ok(key)
  }

  async fn upsert_fact(&mut self, fact: Fact) -> Result<()> {
    match fact.object.clone() {
      FactObject::Entity(object_key) => {
        let from = self.ensure_node(&fact.subject);
        let to = self.ensure_node(&object_key);
        // Replace an existing edge for this exact fact id if present,
        // otherwise append a new one (the graph is a multigraph: distinct
        // fact ids for the same pair are normal, e.g. superseded history).
        if let Some(edge) = self.graph.edges_connecting(from, to).find(|e| e.weight().id == fact.id).map(|e| e.id()) {
          if let Some(weight) = self.graph.edge_weight_mut(edge) {
            *weight = fact;
          }
        } else {
          self.graph.add_edge(from, to, fact);
        }
      }
      FactObject::Literal(_) => {
        let bucket = self.literal_facts.entry((fact.subject.clone(), fact.predicate.clone())).or_default();
        if let Some(slot) = bucket.iter_mut().find(|f| f.id == fact.id) {
          *slot = fact;
        } else {
          bucket.push(fact);
        }
      }
    }
    self.dirty = true;
    Ok(())
  }

  async fn get_entity(&self, key: &EntityKey) -> Result<Option<Entity>> {
    Ok(self.entities.get(key).cloned())
  }

  async fn facts_for_triple(&self, subject: &EntityKey, predicate: &str) -> Result<Vec<Fact>> {
    let mut out = Vec::new();
    if let Some(facts) = self.literal_facts.get(&(subject.clone(), predicate.to_owned())) {
      out.extend(facts.iter().filter(|f| f.is_active()).cloned());
    }
    if let Some(&idx) = self.nodes.get(subject) {
      out.extend(
        self
          .graph
          .edges_directed(idx, PetDirection::Outgoing)
          .map(|e| e.weight())
          .filter(|f| f.predicate == predicate && f.is_active())
          .cloned(),
      );
    }
    Ok(out)
  }

  async fn traverse(
    &self,
    start: &[EntityKey],
    depth: usize,
    direction: Direction,
    predicate_filter: Option<&str>,
    time_filter: Option<i64>,
  ) -> Result<Vec<TraversalHit>> {
    let mut visited = std::collections::HashSet::new();
    let mut frontier: Vec<(NodeIndex, Vec<String>)> = start.iter().filter_map(|k| self.nodes.get(k).map(|&idx| (idx, Vec::new()))).collect();
    let mut hits = Vec::new();

    for key in start {
      visited.insert(key.clone());
    }

    for _ in 0..depth {
      let mut next_frontier = Vec::new();
      for (idx, path) in &frontier {
        let directions: &[PetDirection] = match direction {
          Direction::Out => &[PetDirection::Outgoing],
          Direction::In => &[PetDirection::Incoming],
          Direction::Both => &[PetDirection::Outgoing, PetDirection::Incoming],
        };
        for &pet_dir in directions {
          for edge in self.graph.edges_directed(*idx, pet_dir) {
            let fact = edge.weight();
            if let Some(filter) = predicate_filter {
              if fact.predicate != filter {
                continue;
              }
            }
            if let Some(t) = time_filter {
              if !fact.fact_time.is_none_or(|ft| ft == t) {
                continue;
              }
            }
            let neighbor = if pet_dir == PetDirection::Outgoing { edge.target() } else { edge.source() };
            let neighbor_key = self.graph[neighbor].clone();
            if visited.insert(neighbor_key.clone()) {
              let mut new_path = path.clone();
              new_path.push(fact.predicate.clone());
              hits.push(TraversalHit {
                node: neighbor_key.clone(),
                path: new_path.clone(),
              });
              next_frontier.push((neighbor, new_path));
            }
          }
        }
      }
      if next_frontier.is_empty() {
        break;
      }
      frontier = next_frontier;
    }
    Ok(hits)
  }

  /// For each `(subject, predicate)`, the fact that was true at `t`: the
  /// one with the latest `fact_time <= t` (facts with no `fact_time` are
  /// always eligible, since they carry no temporal claim to supersede or
  /// be superseded by). A fact whose `fact_time` is after `t` hasn't
  /// happened yet as of `t`, so the previous value in its group still
  /// holds — this is what makes a superseded fact reappear for a `t`
  /// before its successor's `fact_time`.
  async fn query_at_time(&self, t: i64) -> Result<Vec<Fact>> {
    let candidates = self
      .graph
      .edge_weights()
      .chain(self.literal_facts.values().flatten())
      .filter(|f| f.status != FactStatus::Rejected)
      .filter(|f| f.fact_time.is_none_or(|ft| ft <= t));

    let mut latest: HashMap<(EntityKey, String), &Fact> = HashMap::new();
    for fact in candidates {
      let key = (fact.subject.clone(), fact.predicate.clone());
      match latest.get(&key) {
        Some(current) if current.fact_time.unwrap_or(i64::MIN) >= fact.fact_time.unwrap_or(i64::MIN) => {}
        _ => {
          latest.insert(key, fact);
        }
      }
    }
    Ok(latest.into_values().cloned().collect())
  }

  async fn communities(&self, algorithm: CommunityAlgorithm) -> Result<HashMap<EntityKey, u64>> {
    match algorithm {
      CommunityAlgorithm::Connected => Ok(connected_components(&self.graph)),
      CommunityAlgorithm::LabelProp => Ok(label_propagation(&self.graph)),
      CommunityAlgorithm::Louvain => Ok(louvain(&self.graph)),
    }
  }

  async fn save(&mut self) -> Result<()> {
    if !self.dirty {
      return Ok(());
    }
    let snapshot = Snapshot {
      entities: self.entities.values().cloned().collect(),
      edge_facts: self.graph.edge_weights().cloned().collect(),
      literal_facts: self.literal_facts.values().flatten().cloned().collect(),
    };
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(&self.path, serde_json::to_vec(&snapshot)?)?;
    self.dirty = false;
    Ok(())
  }

  fn counts(&self) -> (u64, u64) {
    let fact_count = self.graph.edge_count() + self.literal_facts.values().map(Vec::len).sum::<usize>();
    (self.entities.len() as u64, fact_count as u64)
  }
}

#[cfg(test)]
mod tests {
  use recall_entities::EntityType;

  use super::*;

  fn key(name: &str) -> EntityKey {
    EntityKey::new(name, EntityType::Person)
  }

  #[tokio::test]
  async fn upsert_entity_merges_aliases() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FileGraphBackend::new(dir.path());
    let mut bob = Entity::new("Bob", recall_entities::EntityType::Person);
    bob.aliases.insert("Bobby".to_owned());
    backend.upsert_entity(bob).await.unwrap();
    let mut bob_again = Entity::new("Bob", recall_entities::EntityType::Person);
    bob_again.aliases.insert("Robert".to_owned());
    backend.upsert_entity(bob_again).await.unwrap();
    let stored = backend.get_entity(&key("Bob")).await.unwrap().unwrap();
    assert!(stored.aliases.contains("Bobby"));
    assert!(stored.aliases.contains("Robert"));
  }

  #[tokio::test]
  async fn entity_fact_becomes_traversable_edge() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FileGraphBackend::new(dir.path());
    backend.upsert_entity(Entity::new("Bob", recall_entities::EntityType::Person)).await.unwrap();
    backend.upsert_entity(Entity::new("Alice", recall_entities::EntityType::Person)).await.unwrap();
    let fact = Fact::new(key("Bob"), "knows", FactObject::Entity(key("Alice")), 0.9);
    backend.upsert_fact(fact).await.unwrap();
    let hits = backend.traverse(&[key("Bob")], 1, Direction::Out, None, None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].node, key("Alice"));
  }

  #[tokio::test]
  async fn literal_fact_is_queryable_by_triple() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FileGraphBackend::new(dir.path());
    let fact = Fact::new(key("Bob"), "hair_color", FactObject::Literal("black".to_owned()), 0.9);
    backend.upsert_fact(fact).await.unwrap();
    let facts = backend.facts_for_triple(&key("Bob"), "hair_color").await.unwrap();
    assert_eq!(facts.len(), 1);
  }

  #[tokio::test]
  async fn query_at_time_resolves_the_value_active_before_the_next_change() {
    let dir = tempfile::tempdir().unwrap();
    let mut backend = FileGraphBackend::new(dir.path());
    let mut black = Fact::new(key("Bob"), "hair_color", FactObject::Literal("black".to_owned()), 0.9);
    black.fact_time = Some(1_704_067_200_000); // 2024-01-01
    black.status = FactStatus::Superseded;
    let mut golden = Fact::new(key("Bob"), "hair_color", FactObject::Literal("golden".to_owned()), 0.9);
    golden.fact_time = Some(1_717_200_000_000); // 2024-06-01
    golden.superseded_by = None;
    black.superseded_by = Some(golden.id.clone());
    backend.upsert_fact(black).await.unwrap();
    backend.upsert_fact(golden).await.unwrap();

    let before_change = 1_709_251_200_000; // 2024-03-01, before golden's fact_time
    let facts = backend.query_at_time(before_change).await.unwrap();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].object, FactObject::Literal("black".to_owned()));

    let after_change = 1_719_792_000_000; // 2024-07-01
    let facts = backend.query_at_time(after_change).await.unwrap();
    assert_eq!(facts[0].object, FactObject::Literal("golden".to_owned()));
  }

  #[tokio::test]
  async fn save_and_reload_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    {
      let mut backend = FileGraphBackend::new(dir.path());
      backend.upsert_entity(Entity::new("Bob", recall_entities::EntityType::Person)).await.unwrap();
      let fact = Fact::new(key("Bob"), "hair_color", FactObject::Literal("black".to_owned()), 0.9);
      backend.upsert_fact(fact).await.unwrap();
      backend.save().await.unwrap();
    }
    let reloaded = FileGraphBackend::load(dir.path()).unwrap();
    assert!(reloaded.get_entity(&key("Bob")).await.unwrap().is_some());
    let facts = reloaded.facts_for_triple(&key("Bob"), "hair_color").await.unwrap();
    assert_eq!(facts.len(), 1);
  }
}
