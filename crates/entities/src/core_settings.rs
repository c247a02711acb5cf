use serde::{Deserialize, Serialize};

/// L0: static overrides loaded once per session, read-only during a
/// request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreSettings {
  pub character_card: Option<String>,
  pub worldbook: Option<String>,
  pub writing_style: Option<String>,
  pub absolute_rules: Vec<String>,
  pub coding_conventions: Option<String>,
}

impl CoreSettings {
  #[must_use]
  pub fn is_empty(&self) -> bool {
    self.character_card.is_none()
      && self.worldbook.is_none()
      && self.writing_style.is_none()
      && self.absolute_rules.is_empty()
      && self.coding_conventions.is_none()
  }
}
