use std::collections::{HashMap, HashSet};

use recall_shared::Id;

use crate::minhash::{Signature, NUM_HASHES};

const BANDS: usize = 8;
const ROWS_PER_BAND: usize = NUM_HASHES / BANDS;

/// Banded LSH index over MinHash signatures: two documents become
/// candidates if any band of `ROWS_PER_BAND` hash values matches exactly
///.
#[derive(Default)]
pub struct LshIndex {
  bands: Vec<HashMap<u64, Vec<Id>>>,
}

fn band_key(signature: &Signature, band: usize) -> u64 {
  let start = band * ROWS_PER_BAND;
  let mut acc = 0xcbf29ce484222325u64;
  for value in &signature.0[start..start + ROWS_PER_BAND] {
    acc = (acc ^ value).wrapping_mul(0x100000001b3);
  }
  acc
}

impl LshIndex {
  #[must_use]
  pub fn new() -> Self {
    Self {
      bands: (0..BANDS).map(|_| HashMap::new()).collect(),
    }
  }

  pub fn insert(&mut self, id: Id, signature: &Signature) {
    for (band, table) in self.bands.iter_mut().enumerate() {
      table.entry(band_key(signature, band)).or_default().push(id.clone());
    }
  }

  pub fn remove(&mut self, id: &Id, signature: &Signature) {
    for (band, table) in self.bands.iter_mut().enumerate() {
      if let Some(bucket) = table.get_mut(&band_key(signature, band)) {
        bucket.retain(|existing| existing != id);
      }
    }
  }

  #[must_use]
  pub fn candidates(&self, signature: &Signature) -> HashSet<Id> {
    let mut out = HashSet::new();
    for (band, table) in self.bands.iter().enumerate() {
      if let Some(bucket) = table.get(&band_key(signature, band)) {
        out.extend(bucket.iter().cloned());
      }
    }
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::minhash::token_shingles;

  #[test]
  fn near_duplicate_signatures_share_a_bucket() {
    let mut index = LshIndex::new();
    let tokens_a: Vec<String> = "i went to the store today".split_whitespace().map(str::to_owned).collect();
    let tokens_b: Vec<String> = "i went to the store yesterday".split_whitespace().map(str::to_owned).collect();
    let sig_a = Signature::compute(&token_shingles(&tokens_a));
    let sig_b = Signature::compute(&token_shingles(&tokens_b));
    let id_a = Id::new("mem");
    index.insert(id_a.clone(), &sig_a);
    assert!(index.candidates(&sig_b).contains(&id_a));
  }

  #[test]
  fn unrelated_signatures_rarely_collide() {
    let mut index = LshIndex::new();
    let tokens_a: Vec<String> = "apples and oranges are fruit".split_whitespace().map(str::to_owned).collect();
    let tokens_b: Vec<String> = "quantum physics lecture notes today".split_whitespace().map(str::to_owned).collect();
    let sig_a = Signature::compute(&token_shingles(&tokens_a));
    let sig_b = Signature::compute(&token_shingles(&tokens_b));
    index.insert(Id::new("mem"), &sig_a);
    assert!(index.candidates(&sig_b).is_empty());
  }
}
