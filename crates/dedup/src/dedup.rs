use std::collections::HashMap;
use std::sync::Arc;

use recall_ai::{cosine_similarity, ChatClient, ChatMessage, SchemaSpec};
use recall_shared::{DedupConfig, Id, Result};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::debug;

/// The LLM's yes/no verdict on whether a candidate memory restates an
/// existing one.
#[derive(Debug, Deserialize, JsonSchema)]
struct RestatementVerdict {
  is_restatement: bool,
}

use crate::lsh::LshIndex;
use crate::minhash::{exact_jaccard, token_shingles, Signature};

struct Record {
  shingles: std::collections::HashSet<u64>,
  signature: Signature,
  embedding: Vec<f32>,
}

/// Outcome of evaluating a candidate memory against the corpus already
/// indexed by this deduplicator.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
  Accept,
  /// Merge into the existing memory at this id; the caller is responsible
  /// for bumping its mention/confidence bookkeeping and for discarding
  /// (or aliasing) the candidate's own id.
  MergeInto(Id),
}

/// Three-stage deduplicator: MinHash+LSH, then semantic cosine, then an
/// optional LLM tiebreak for the narrow grey band between the semantic
/// thresholds.
pub struct Deduplicator {
  config: DedupConfig,
  chat: Option<Arc<dyn ChatClient>>,
  lsh: LshIndex,
  records: HashMap<Id, Record>,
}

impl Deduplicator {
  #[must_use]
  pub fn new(config: DedupConfig, chat: Option<Arc<dyn ChatClient>>) -> Self {
    Self {
      config,
      chat,
      lsh: LshIndex::new(),
      records: HashMap::new(),
    }
  }

  /// Registers an accepted memory so future candidates can be compared
  /// against it. Call this only after `evaluate` returns `Accept`.
  pub fn index(&mut self, id: Id, tokens: &[String], embedding: Vec<f32>) {
    let shingles = token_shingles(tokens);
    let signature = Signature::compute(&shingles);
    self.lsh.insert(id.clone(), &signature);
    self.records.insert(id, Record { shingles, signature, embedding });
  }

  pub fn remove(&mut self, id: &Id) {
    if let Some(record) = self.records.remove(id) {
      self.lsh.remove(id, &record.signature);
    }
  }

  async fn llm_confirms_restatement(&self, candidate_text: &str, existing_text: &str) -> Result<bool> {
    let Some(chat) = &self.chat else {
      return Ok(false);
    };
    let prompt = format!("Is B a restatement of A?\nA: {existing_text}\nB: {candidate_text}");
    let schema = SchemaSpec::for_type::<RestatementVerdict>("restatement_verdict", Some("whether memory B restates memory A"));
    let reply = chat.chat_structured(&[ChatMessage::user(prompt)], &schema).await?;
    Ok(serde_json::from_str::<RestatementVerdict>(&reply).map(|v| v.is_restatement).unwrap_or(false))
  }

  /// Runs the three stages in order, short-circuiting on the first
  /// decisive outcome. `existing_texts` supplies the raw content needed
  /// only if the LLM stage is reached, keyed by the same ids as the
  /// records this deduplicator was given via `index`.
  pub async fn evaluate(&self, tokens: &[String], embedding: &[f32], candidate_text: &str, existing_texts: &HashMap<Id, String>) -> Result<Decision> {
    let shingles = token_shingles(tokens);
    let signature = Signature::compute(&shingles);

    let lsh_candidates = self.lsh.candidates(&signature);
    let mut best_jaccard: Option<(Id, f64)> = None;
    for id in &lsh_candidates {
      if let Some(record) = self.records.get(id) {
        let jaccard = exact_jaccard(&shingles, &record.shingles);
        if best_jaccard.as_ref().is_none_or(|(_, best)| jaccard > *best) {
          best_jaccard = Some((id.clone(), jaccard));
        }
      }
    }
    if let Some((id, jaccard)) = &best_jaccard {
      if *jaccard >= self.config.jaccard_hi {
        debug!(memory_id = %id, jaccard, "stage 1 MinHash+LSH merge");
        return Ok(Decision::MergeInto(id.clone()));
      }
    }

    let mut best_semantic: Option<(Id, f64)> = None;
    for (id, record) in &self.records {
      if record.embedding.is_empty() || embedding.is_empty() {
        continue;
      }
      let sim = cosine_similarity(embedding, &record.embedding);
      if best_semantic.as_ref().is_none_or(|(_, best)| sim > *best) {
        best_semantic = Some((id.clone(), sim));
      }
    }

    let Some((best_id, similarity)) = best_semantic else {
      return Ok(Decision::Accept);
    };

    if similarity >= self.config.semantic_hi {
      debug!(memory_id = %best_id, similarity, "stage 2 semantic merge");
      return Ok(Decision::MergeInto(best_id));
    }
    if similarity < self.config.semantic_lo {
      return Ok(Decision::Accept);
    }

    if self.config.llm_enabled {
      if let Some(existing_text) = existing_texts.get(&best_id) {
        if self.llm_confirms_restatement(candidate_text, existing_text).await? {
          debug!(memory_id = %best_id, similarity, "stage 3 LLM merge");
          return Ok(Decision::MergeInto(best_id));
        }
      }
    }
    Ok(Decision::Accept)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_owned).collect()
  }

  #[tokio::test]
  async fn near_duplicate_text_merges_at_stage_one() {
    let mut dedup = Deduplicator::new(DedupConfig::default(), None);
    let existing_id = Id::new("mem");
    dedup.index(existing_id.clone(), &tokens("i went to the store today"), vec![]);
    let decision = dedup.evaluate(&tokens("i went to the store today"), &[], "i went to the store today", &HashMap::new()).await.unwrap();
    assert_eq!(decision, Decision::MergeInto(existing_id));
  }

  #[tokio::test]
  async fn unrelated_text_is_accepted() {
    let dedup = Deduplicator::new(DedupConfig::default(), None);
    let decision = dedup.evaluate(&tokens("completely unrelated content here"), &[], "completely unrelated content here", &HashMap::new()).await.unwrap();
    assert_eq!(decision, Decision::Accept);
  }

  #[tokio::test]
  async fn high_semantic_similarity_merges_without_lsh_hit() {
    let mut dedup = Deduplicator::new(DedupConfig::default(), None);
    let existing_id = Id::new("mem");
    dedup.index(existing_id.clone(), &tokens("zzz unrelated tokens here"), vec![1.0, 0.0, 0.0]);
    let decision = dedup.evaluate(&tokens("totally different wording"), &[0.99, 0.01, 0.0], "totally different wording", &HashMap::new()).await.unwrap();
    assert_eq!(decision, Decision::MergeInto(existing_id));
  }

  #[tokio::test]
  async fn mid_band_similarity_without_llm_defaults_to_accept() {
    let mut dedup = Deduplicator::new(DedupConfig { llm_enabled: false, ..DedupConfig::default() }, None);
    let existing_id = Id::new("mem");
    dedup.index(existing_id, &tokens("zzz unrelated tokens here"), vec![1.0, 0.0, 0.0]);
    // cosine(~0.85) sits between semantic_lo (0.80) and semantic_hi (0.90)
    let decision = dedup.evaluate(&tokens("some other phrase"), &[0.85, 0.527, 0.0], "some other phrase", &HashMap::new()).await.unwrap();
    assert_eq!(decision, Decision::Accept);
  }
}
