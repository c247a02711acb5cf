use recall_entities::{Entity, EntityKey, Fact, FactObject, FactStatus, ResolutionStrategy};
use recall_graph::{CommunityAlgorithm, Direction, Outcome, TraversalHit};
use recall_shared::{Id, RecallError, Result};
use tracing::debug;

use crate::engine::Engine;

impl Engine {
  /// Runs the tokenizer's cheap entity-candidate extraction over a
  /// memory already in the store, upserts each candidate into the graph
  /// (touching mention counts for repeats), and records the memory →
  /// entity-key linkage the retriever's L4/L5 arms and L9 rerank both
  /// need. The background `EntityExtraction` task calls this.
  pub async fn extract_entities(&self, memory_id: &Id) -> Result<Vec<EntityKey>> {
    let memory = self.get(memory_id).await?.ok_or_else(|| RecallError::not_found(format!("memory {memory_id} not found")))?;
    let (_tokens, extracted) = self.tokenizer.tokenize(&memory.content);

    let mut keys = Vec::with_capacity(extracted.len());
    {
      let mut graph = self.graph.write().await;
      for candidate in extracted {
        let mut entity = Entity::new(&candidate.name, candidate.guessed_type);
        if let Some(existing) = graph.get_entity(&entity.key()).await? {
          entity = existing;
          entity.touch();
        }
        let key = graph.upsert_entity(entity).await?;
        keys.push(key);
      }
    }

    {
      let mut indexes = self.indexes.write().await;
      indexes.entity.add(memory_id, &keys)?;
    }
    self.memory_entities.write().await.insert(memory_id.clone(), keys.clone());
    Ok(keys)
  }

  #[must_use]
  pub async fn entity(&self, key: &EntityKey) -> Result<Option<Entity>> {
    self.graph.read().await.get_entity(key).await
  }

  /// Every fact whose `fact_time` interval contains `t`.
  pub async fn facts_at_time(&self, t: i64) -> Result<Vec<Fact>> {
    self.graph.read().await.query_at_time(t).await
  }

  pub async fn traverse(&self, start: &[EntityKey], depth: usize, direction: Direction, predicate_filter: Option<&str>, time_filter: Option<i64>) -> Result<Vec<TraversalHit>> {
    self.graph.read().await.traverse(start, depth, direction, predicate_filter, time_filter).await
  }

  pub async fn communities(&self, algorithm: CommunityAlgorithm) -> Result<std::collections::HashMap<EntityKey, u64>> {
    self.graph.read().await.communities(algorithm).await
  }

  /// Inserts or reconciles one `(subject, predicate, object)` triple,
  /// running it through the contradiction manager before it ever reaches
  /// the graph. Acquires the graph lock only — callers that
  /// also need the store lock for the same request must take it first
  ///.
  pub async fn upsert_relation(&self, subject: EntityKey, predicate: impl Into<String>, object: FactObject, confidence: f64, fact_time: Option<i64>, source_memory_id: Option<Id>) -> Result<Outcome> {
    let predicate = predicate.into();
    let mut fact = Fact::new(subject.clone(), predicate.clone(), object, confidence);
    fact.fact_time = fact_time;
    if let Some(source) = source_memory_id {
      fact.source_memory_ids.insert(source);
    }

    let mut graph = self.graph.write().await;
    let existing = graph.facts_for_triple(&subject, &predicate).await?;
    let existing_active: Vec<Fact> = existing.into_iter().filter(Fact::is_active).collect();

    let mut contradictions = self.contradictions.write().await;
    let outcome = contradictions.process(fact.clone(), existing_active.clone()).await?;

    match &outcome {
      Outcome::Inserted => {
        graph.upsert_fact(fact).await?;
      }
      Outcome::Merged(_) => {
        debug!(subject = %subject.name, %predicate, "relation reaffirmed, merged into existing fact");
      }
      Outcome::Conflict(contradiction) => match contradiction.strategy {
        ResolutionStrategy::Supersede => {
          if let Some(mut prior) = existing_active.into_iter().find(|f| f.id == contradiction.fact_a) {
            prior.status = FactStatus::Superseded;
            prior.superseded_by = Some(fact.id.clone());
            graph.upsert_fact(prior).await?;
          }
          graph.upsert_fact(fact).await?;
        }
        ResolutionStrategy::Reject => {
          debug!(subject = %subject.name, %predicate, contradiction_id = %contradiction.id, "new relation rejected, existing fact kept active");
        }
        ResolutionStrategy::Manual => {
          return Err(RecallError::conflict(format!("relation conflicts with an existing fact, pending review as {}", contradiction.id)));
        }
        ResolutionStrategy::Coexist => {
          graph.upsert_fact(fact).await?;
        }
      },
    }

    Ok(outcome)
  }

  pub async fn facts_for_triple(&self, subject: &EntityKey, predicate: &str) -> Result<Vec<Fact>> {
    self.graph.read().await.facts_for_triple(subject, predicate).await
  }
}
