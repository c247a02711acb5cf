use recall_entities::{Fact, ResolutionStrategy};
use recall_shared::{Id, Result};

use crate::engine::Engine;

impl Engine {
  /// `contradictions list`: every `(subject, predicate)` pair still
  /// waiting on a human or automated decision, with both competing facts.
  pub async fn pending_contradictions(&self) -> Vec<(Id, Fact, Fact)> {
    self.contradictions.read().await.list_pending()
  }

  pub async fn pending_contradiction_count(&self) -> usize {
    self.contradictions.read().await.pending_count()
  }

  /// `contradictions resolve`. Applies `decision` to the pending pair,
  /// then persists the resulting fact status(es) to the graph — callers
  /// never see a contradiction id that wasn't already pending.
  pub async fn resolve_contradiction(&self, contradiction_id: &Id, decision: ResolutionStrategy, coexist_label: Option<String>) -> Result<()> {
    let (old, new) = {
      let mut contradictions = self.contradictions.write().await;
      contradictions.resolve_contradiction(contradiction_id, decision, coexist_label)?
    };

    let mut graph = self.graph.write().await;
    graph.upsert_fact(old).await?;
    if let Some(new_fact) = new {
      graph.upsert_fact(new_fact).await?;
    }
    Ok(())
  }
}
