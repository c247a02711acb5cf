//! `Tokenize(text) -> (tokens, entities)` contract. The concrete NLP
//! implementation is an external, pluggable collaborator; this crate ships
//! the trait plus one rule-based reference implementation so the rest of
//! the workspace is runnable without a network model.

use std::collections::HashSet;

use recall_entities::EntityType;

/// A candidate entity mention surfaced by the tokenizer, before it is
/// merged into the knowledge graph by `recall-graph`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedEntity {
  pub name: String,
  pub guessed_type: EntityType,
}

/// `Tokenize(text) -> (tokens, entities)`.
pub trait Tokenizer: Send + Sync {
  fn tokenize(&self, text: &str) -> (Vec<String>, Vec<ExtractedEntity>);
}

/// Rule-based reference tokenizer: splits on Unicode whitespace/punctuation
/// for keyword tokens, and treats capitalized words not at sentence start
/// as entity candidates (a common cheap heuristic, not a substitute for a
/// real NER model).
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleTokenizer;

const STOPWORDS: &[&str] = &[
  "the", "a", "an", "is", "are", "was", "were", "be", "been", "to", "of", "in", "on", "at", "and",
  "or", "but", "for", "with", "this", "that", "it", "as",
];

impl RuleTokenizer {
  fn split_words(text: &str) -> Vec<&str> {
    text
      .split(|c: char| !c.is_alphanumeric() && c != '_' && c != '-')
      .filter(|s| !s.is_empty())
      .collect()
  }
}

impl Tokenizer for RuleTokenizer {
  fn tokenize(&self, text: &str) -> (Vec<String>, Vec<ExtractedEntity>) {
    let words = Self::split_words(text);

    let tokens: Vec<String> = words
      .iter()
      .map(|w| w.to_lowercase())
      .filter(|w| !STOPWORDS.contains(&w.as_str()) && w.len() > 1)
      .collect();

    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    let mut sentence_start = true;

    for word in &words {
      let is_capitalized = word
        .chars()
        .next()
        .is_some_and(char::is_uppercase);

      if is_capitalized && !sentence_start && word.len() > 1 {
        let normalized = word.to_lowercase();
        if seen.insert(normalized) {
          entities.push(ExtractedEntity {
            name: (*word).to_owned(),
            guessed_type: EntityType::Custom,
          });
        }
      }

      sentence_start = word.ends_with(['.', '!', '?']);
    }

    (tokens, entities)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokenizes_and_strips_stopwords() {
    let (tokens, _) = RuleTokenizer.tokenize("The cat sat on the mat");
    assert!(!tokens.contains(&"the".to_owned()));
    assert!(tokens.contains(&"cat".to_owned()));
  }

  #[test]
  fn extracts_mid_sentence_capitalized_words() {
    let (_, entities) = RuleTokenizer.tokenize("I talked to Alice about Bob");
    let names: Vec<_> = entities.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"Alice"));
    assert!(names.contains(&"Bob"));
  }
}
