use std::collections::HashMap;
use std::sync::Arc;

use recall_ai::{ChatClient, ChatMessage, SchemaSpec};
use recall_entities::{Contradiction, ContradictionKind, Fact, FactObject, ResolutionStrategy};
use recall_shared::{Id, RecallError, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, warn};

/// The LLM's yes/no verdict on whether two facts genuinely contradict.
#[derive(Debug, Deserialize, JsonSchema)]
struct ContradictionVerdict {
  contradicting: bool,
}

/// Which detection strategy the contradiction manager runs. Distinct from
/// `recall_entities::ResolutionStrategy`, which is the *outcome* applied
/// once a conflict is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionStrategy {
  Rule,
  Llm,
  Mixed,
  Auto,
}

/// Predicates where multiple simultaneously-`ACTIVE` facts are normal —
/// "knows Bob" and "knows Alice" don't contradict each other. Everything
/// else is treated as single-valued: a new object for the same
/// `(subject, predicate)` supersedes, coexists, or is rejected.
const MULTI_VALUE_PREDICATES: &[&str] = &["knows", "likes", "dislikes", "visited", "owns", "friend_of", "mentioned", "met"];

/// Predicates whose value toggling (e.g. alive ↔ dead) is always a
/// meaningful, deliberate contradiction rather than noise.
const LIFE_DEATH_PREDICATES: &[&str] = &["alive_status", "vital_status", "is_alive"];

enum Verdict {
  NotConflicting,
  Conflicting,
  Ambiguous,
}

pub enum Outcome {
  /// No prior active fact for this `(subject, predicate)` — inserted
  /// directly.
  Inserted,
  /// Same object reaffirmed; the existing fact's confidence/sources were
  /// updated instead of creating a new row.
  Merged(Id),
  /// A genuine conflict was found; `Contradiction::resolved` tells the
  /// caller whether it still needs manual attention.
  Conflict(Contradiction),
}

fn kind_for_predicate(predicate: &str) -> ContradictionKind {
  if LIFE_DEATH_PREDICATES.contains(&predicate) {
    ContradictionKind::State
  } else if predicate.contains("relation") || MULTI_VALUE_PREDICATES.contains(&predicate) {
    ContradictionKind::Relationship
  } else if predicate.contains("time") || predicate.contains("order") {
    ContradictionKind::Timeline
  } else {
    ContradictionKind::Attribute
  }
}

fn rule_verdict(old: &Fact, new: &Fact) -> Verdict {
  if MULTI_VALUE_PREDICATES.contains(&new.predicate.as_str()) {
    return Verdict::NotConflicting;
  }
  if old.object == new.object {
    return Verdict::NotConflicting;
  }
  if LIFE_DEATH_PREDICATES.contains(&new.predicate.as_str()) {
    return Verdict::Conflicting;
  }
  if let (Some(a), Some(b)) = (old.object.as_literal(), new.object.as_literal()) {
    if let (Ok(a), Ok(b)) = (a.parse::<f64>(), b.parse::<f64>()) {
      let tolerance = (a.abs().max(b.abs()) * 0.05).max(0.01);
      return if (a - b).abs() <= tolerance { Verdict::NotConflicting } else { Verdict::Conflicting };
    }
  }
  if let (Some(old_ft), Some(new_ft)) = (old.fact_time, new.fact_time) {
    if new_ft < old_ft {
      return Verdict::Ambiguous;
    }
  }
  Verdict::Conflicting
}

fn fact_time_overlaps(a: &Fact, b: &Fact) -> bool {
  matches!((a.fact_time, b.fact_time), (Some(x), Some(y)) if x == y)
}

/// Runs RULE/LLM/MIXED/AUTO conflict detection and applies the resulting
/// resolution, holding genuinely undecided pairs in a pending queue until
/// `resolve_contradiction` is called.
pub struct ContradictionManager {
  strategy: DetectionStrategy,
  chat: Option<Arc<dyn ChatClient>>,
  pending: HashMap<Id, (Fact, Fact)>,
}

impl ContradictionManager {
  #[must_use]
  pub fn new(strategy: DetectionStrategy, chat: Option<Arc<dyn ChatClient>>) -> Self {
    Self {
      strategy,
      chat,
      pending: HashMap::new(),
    }
  }

  async fn llm_verdict(&self, old: &Fact, new: &Fact) -> Result<Verdict> {
    let Some(chat) = &self.chat else {
      return Ok(Verdict::Ambiguous);
    };
    let prompt = format!(
      "Fact A: {} {} {:?}\nFact B: {} {} {:?}\nAre these genuinely contradictory about the same subject?",
      old.subject.name, old.predicate, old.object, new.subject.name, new.predicate, new.object
    );
    let schema = SchemaSpec::for_type::<ContradictionVerdict>("contradiction_verdict", Some("whether two facts about the same subject genuinely contradict"));
    let reply = chat.chat_structured(&[ChatMessage::user(prompt)], &schema).await?;
    Ok(match serde_json::from_str::<ContradictionVerdict>(&reply) {
      Ok(verdict) if verdict.contradicting => Verdict::Conflicting,
      Ok(_) => Verdict::NotConflicting,
      Err(err) => {
        warn!(%err, "contradiction verdict returned unparseable JSON");
        Verdict::Ambiguous
      }
    })
  }

  async fn verdict(&self, old: &Fact, new: &Fact) -> Result<Verdict> {
    match self.strategy {
      DetectionStrategy::Rule => Ok(rule_verdict(old, new)),
      DetectionStrategy::Llm => self.llm_verdict(old, new).await,
      DetectionStrategy::Mixed | DetectionStrategy::Auto => match rule_verdict(old, new) {
        Verdict::Ambiguous => self.llm_verdict(old, new).await,
        decisive => Ok(decisive),
      },
    }
  }

  /// Given the facts already active for `new_fact`'s `(subject, predicate)`
  /// (at most one expected normally; more than one is tolerated as a
  /// not-yet-consolidated multi-value predicate), decides the outcome.
  pub async fn process(&mut self, new_fact: Fact, existing_active: Vec<Fact>) -> Result<Outcome> {
    let Some(existing) = existing_active.into_iter().find(|f| f.object != new_fact.object) else {
      return Ok(Outcome::Inserted);
    };

    if existing.object == new_fact.object {
      return Ok(Outcome::Merged(existing.id));
    }

    let verdict = self.verdict(&existing, &new_fact).await?;
    let kind = kind_for_predicate(&new_fact.predicate);

    match verdict {
      Verdict::NotConflicting => Ok(Outcome::Inserted),
      Verdict::Ambiguous => {
        let record = Contradiction::new(existing.id.clone(), new_fact.id.clone(), kind, ResolutionStrategy::Manual);
        info!(contradiction_id = %record.id, "contradiction pending manual review (ambiguous verdict)");
        self.pending.insert(record.id.clone(), (existing, new_fact));
        Ok(Outcome::Conflict(record))
      }
      Verdict::Conflicting => {
        if fact_time_overlaps(&existing, &new_fact) {
          let record = Contradiction::new(existing.id.clone(), new_fact.id.clone(), kind, ResolutionStrategy::Manual);
          warn!(contradiction_id = %record.id, "overlapping fact_time, forcing manual review per policy");
          self.pending.insert(record.id.clone(), (existing, new_fact));
          return Ok(Outcome::Conflict(record));
        }
        if new_fact.confidence < existing.confidence * 0.5 {
          let record = Contradiction::new(existing.id.clone(), new_fact.id.clone(), kind, ResolutionStrategy::Reject);
          Ok(Outcome::Conflict(record))
        } else {
          let record = Contradiction::new(existing.id.clone(), new_fact.id.clone(), kind, ResolutionStrategy::Supersede);
          Ok(Outcome::Conflict(record))
        }
      }
    }
  }

  /// Finalizes a pending (ambiguous or overlapping) contradiction with a
  /// caller-supplied decision. Returns the two facts with `status` already
  /// updated for the caller to persist via the graph backend.
  pub fn resolve_contradiction(&mut self, contradiction_id: &Id, decision: ResolutionStrategy, coexist_label: Option<String>) -> Result<(Fact, Option<Fact>)> {
    let (mut existing, mut new_fact) = self
      .pending
      .remove(contradiction_id)
      .ok_or_else(|| RecallError::not_found(format!("no pending contradiction {contradiction_id}")))?;

    match decision {
      ResolutionStrategy::Supersede => {
        existing.status = recall_entities::FactStatus::Superseded;
        existing.superseded_by = Some(new_fact.id.clone());
        Ok((existing, Some(new_fact)))
      }
      ResolutionStrategy::Coexist => {
        existing.coexist_label = coexist_label.clone();
        new_fact.coexist_label = coexist_label;
        Ok((existing, Some(new_fact)))
      }
      ResolutionStrategy::Reject => Ok((existing, None)),
      ResolutionStrategy::Manual => Err(RecallError::invalid_argument("cannot resolve a contradiction to MANUAL")),
    }
  }

  #[must_use]
  pub fn pending_count(&self) -> usize {
    self.pending.len()
  }

  /// Lists every contradiction still awaiting `resolve_contradiction`, for surfacing to whatever reviews them.
  #[must_use]
  pub fn list_pending(&self) -> Vec<(Id, Fact, Fact)> {
    self.pending.iter().map(|(id, (old, new))| (id.clone(), old.clone(), new.clone())).collect()
  }
}

#[cfg(test)]
mod tests {
  use recall_entities::{EntityKey, EntityType};

  use super::*;

  fn fact(subject: &str, predicate: &str, object: &str) -> Fact {
    Fact::new(EntityKey::new(subject, EntityType::Person), predicate, FactObject::Literal(object.to_owned()), 0.9)
  }

  #[tokio::test]
  async fn no_existing_active_inserts_directly() {
    let mut mgr = ContradictionManager::new(DetectionStrategy::Rule, None);
    let outcome = mgr.process(fact("bob", "hair_color", "black"), vec![]).await.unwrap();
    assert!(matches!(outcome, Outcome::Inserted));
  }

  #[tokio::test]
  async fn same_object_reaffirmation_merges() {
    let mut mgr = ContradictionManager::new(DetectionStrategy::Rule, None);
    let existing = fact("bob", "hair_color", "black");
    let new_fact = fact("bob", "hair_color", "black");
    let outcome = mgr.process(new_fact, vec![existing]).await.unwrap();
    assert!(matches!(outcome, Outcome::Merged(_)));
  }

  #[tokio::test]
  async fn differing_value_supersedes_when_no_overlap() {
    let mut mgr = ContradictionManager::new(DetectionStrategy::Rule, None);
    let existing = fact("bob", "hair_color", "black");
    let new_fact = fact("bob", "hair_color", "brown");
    let outcome = mgr.process(new_fact, vec![existing]).await.unwrap();
    match outcome {
      Outcome::Conflict(c) => assert_eq!(c.strategy, ResolutionStrategy::Supersede),
      _ => panic!("expected conflict"),
    }
  }

  #[tokio::test]
  async fn multi_value_predicate_never_conflicts() {
    let mut mgr = ContradictionManager::new(DetectionStrategy::Rule, None);
    let existing = fact("bob", "knows", "alice");
    let new_fact = fact("bob", "knows", "carol");
    let outcome = mgr.process(new_fact, vec![existing]).await.unwrap();
    assert!(matches!(outcome, Outcome::Inserted));
  }

  #[tokio::test]
  async fn overlapping_fact_time_forces_manual() {
    let mut mgr = ContradictionManager::new(DetectionStrategy::Rule, None);
    let mut existing = fact("bob", "location", "paris");
    existing.fact_time = Some(1000);
    let mut new_fact = fact("bob", "location", "berlin");
    new_fact.fact_time = Some(1000);
    let outcome = mgr.process(new_fact, vec![existing]).await.unwrap();
    match outcome {
      Outcome::Conflict(c) => {
        assert_eq!(c.strategy, ResolutionStrategy::Manual);
        assert!(!c.resolved);
      }
      _ => panic!("expected conflict"),
    }
  }

  #[tokio::test]
  async fn resolve_contradiction_applies_supersede() {
    let mut mgr = ContradictionManager::new(DetectionStrategy::Rule, None);
    let mut existing = fact("bob", "location", "paris");
    existing.fact_time = Some(1000);
    let mut new_fact = fact("bob", "location", "berlin");
    new_fact.fact_time = Some(1000);
    let outcome = mgr.process(new_fact, vec![existing]).await.unwrap();
    let Outcome::Conflict(record) = outcome else { panic!("expected conflict") };
    let (old, new) = mgr.resolve_contradiction(&record.id, ResolutionStrategy::Supersede, None).unwrap();
    assert_eq!(old.status, recall_entities::FactStatus::Superseded);
    assert!(new.is_some());
  }
}
