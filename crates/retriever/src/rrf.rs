use std::collections::HashMap;

use recall_shared::Id;

/// Reciprocal Rank Fusion: each input list is already sorted best-first;
/// a hit at rank `r` (0-based) contributes `1 / (k + r + 1)`. Scores from
/// every list are summed per id, and the result is sorted descending
///.
#[must_use]
pub fn fuse(lists: &[Vec<Id>], k: f64) -> Vec<(Id, f64)> {
  let mut scores: HashMap<Id, f64> = HashMap::new();
  for list in lists {
    for (rank, id) in list.iter().enumerate() {
      *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k + rank as f64 + 1.0);
    }
  }
  let mut fused: Vec<(Id, f64)> = scores.into_iter().collect();
  fused.sort_by(|a, b| b.1.total_cmp(&a.1));
  fused
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn id_present_in_every_list_outranks_one_present_in_a_single_list() {
    let a = Id::new("mem");
    let b = Id::new("mem");
    let lists = vec![vec![a.clone(), b.clone()], vec![b.clone(), a.clone()], vec![a.clone()]];
    let fused = fuse(&lists, 60.0);
    assert_eq!(fused[0].0, a);
  }

  #[test]
  fn empty_lists_fuse_to_nothing() {
    let fused: Vec<(Id, f64)> = fuse(&[], 60.0);
    assert!(fused.is_empty());
  }
}
