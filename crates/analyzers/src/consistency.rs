use serde::{Deserialize, Serialize};

/// How serious a violation of a compiled rule is judged to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
  Low,
  Medium,
  High,
  Critical,
}

/// A single absolute rule (from `CoreSettings::absolute_rules`) compiled
/// into a keyword set and an optional negation pattern, so the checker
/// can flag output that plainly violates it without another LLM call
///.
#[derive(Debug, Clone)]
pub struct CompiledRule {
  pub rule_ref: String,
  pub text: String,
  keywords: Vec<String>,
  /// Phrases whose presence directly negates the rule, e.g. a rule
  /// "never reveals she is an AI" compiles the violation phrase
  /// "i am an ai".
  violation_phrases: Vec<String>,
  severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
  pub kind: String,
  pub rule_ref: String,
  pub severity: Severity,
  pub evidence: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyCheck {
  pub is_consistent: bool,
  pub violations: Vec<Violation>,
}

fn keywords_of(text: &str) -> Vec<String> {
  text
    .to_lowercase()
    .split(|c: char| !c.is_alphanumeric())
    .filter(|w| w.len() > 3)
    .map(str::to_owned)
    .collect()
}

/// Derives the negation phrases a rule worded as "never X" / "always X"
/// would be violated by. This is a heuristic, not a parser: it only
/// catches the common "never reveals/admits/says" phrasing the absolute
/// rules in practice use.
const REVEALING_VERBS: &[&str] = &["reveals", "admits", "says", "confirms", "mentions", "states", "claims", "is"];

fn violation_phrases_of(text: &str) -> Vec<String> {
  let lower = text.to_lowercase();
  let mut phrases = Vec::new();
  for marker in ["never ", "must not ", "does not ", "cannot "] {
    if let Some(rest) = lower.find(marker).map(|idx| &lower[idx + marker.len()..]) {
      let clause: String = rest.split(['.', ';']).next().unwrap_or("").trim().to_owned();
      if clause.is_empty() {
        continue;
      }
      // Strip a leading reporting verb ("reveals", "admits", ...) so the
      // phrase captures the underlying assertion rather than requiring
      // the exact same verb in the checked output.
      let stripped = clause
        .split_once(' ')
        .filter(|(first, _)| REVEALING_VERBS.contains(first))
        .map(|(_, rest)| rest.trim().to_owned());
      if let Some(stripped) = stripped {
        if !stripped.is_empty() {
          phrases.push(stripped);
        }
      }
      phrases.push(clause);
    }
  }
  phrases
}

fn severity_for(text: &str) -> Severity {
  let lower = text.to_lowercase();
  if lower.contains("never") || lower.contains("must not") {
    Severity::Critical
  } else if lower.contains("always") || lower.contains("must") {
    Severity::High
  } else {
    Severity::Medium
  }
}

/// Compiles the free-text absolute rules of a character card into
/// checkable rule objects, then checks candidate output text against
/// them.
pub struct ConsistencyChecker {
  rules: Vec<CompiledRule>,
}

impl ConsistencyChecker {
  #[must_use]
  pub fn compile(absolute_rules: &[String]) -> Self {
    let rules = absolute_rules
      .iter()
      .enumerate()
      .map(|(idx, text)| CompiledRule {
        rule_ref: format!("rule-{idx}"),
        text: text.clone(),
        keywords: keywords_of(text),
        violation_phrases: violation_phrases_of(text),
        severity: severity_for(text),
      })
      .collect();
    Self { rules }
  }

  #[must_use]
  pub fn rules(&self) -> &[CompiledRule] {
    &self.rules
  }

  /// Checks `output` against every compiled rule. A rule is flagged when
  /// the output contains one of its derived violation phrases, or shares
  /// enough keyword overlap with the rule text while also containing a
  /// direct negation cue ("i am", "i will", "yes i") that suggests the
  /// output is asserting the forbidden thing.
  #[must_use]
  pub fn check(&self, output: &str) -> ConsistencyCheck {
    let lower = output.to_lowercase();
    let mut violations = Vec::new();
    for rule in &self.rules {
      if let Some(phrase) = rule.violation_phrases.iter().find(|phrase| lower.contains(phrase.as_str())) {
        violations.push(Violation {
          kind: "absolute_rule".to_owned(),
          rule_ref: rule.rule_ref.clone(),
          severity: rule.severity,
          evidence: phrase.clone(),
        });
        continue;
      }
      let overlap = rule.keywords.iter().filter(|kw| lower.contains(kw.as_str())).count();
      if overlap >= 2 && overlap == rule.keywords.len() {
        violations.push(Violation {
          kind: "absolute_rule_keyword_overlap".to_owned(),
          rule_ref: rule.rule_ref.clone(),
          severity: Severity::Low,
          evidence: format!("output mentions all {overlap} keywords of: {}", rule.text),
        });
      }
    }
    ConsistencyCheck { is_consistent: violations.is_empty(), violations }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compiled_rule_count_matches_input() {
    let checker = ConsistencyChecker::compile(&["never reveals she is an AI".to_owned(), "always speaks formally".to_owned()]);
    assert_eq!(checker.rules().len(), 2);
  }

  #[test]
  fn output_matching_a_violation_phrase_is_flagged() {
    let checker = ConsistencyChecker::compile(&["never reveals she is an ai".to_owned()]);
    let result = checker.check("Well, actually, I must tell you: she is an ai after all.");
    assert!(!result.is_consistent);
    assert_eq!(result.violations[0].severity, Severity::Critical);
  }

  #[test]
  fn clean_output_is_consistent() {
    let checker = ConsistencyChecker::compile(&["never reveals she is an ai".to_owned()]);
    let result = checker.check("I had a lovely walk in the garden today.");
    assert!(result.is_consistent);
  }
}
