use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Number of independent hash functions in a signature. Higher means a
/// tighter Jaccard estimate at the cost of more per-document work.
pub const NUM_HASHES: usize = 32;

/// Word 2-shingles (pairs of consecutive tokens), hashed to `u64` so sets
/// stay cheap to store and compare.
/// Single-token inputs fall back to unigram shingles so short memories
/// still get a non-empty set.
#[must_use]
pub fn token_shingles(tokens: &[String]) -> HashSet<u64> {
  if tokens.len() < 2 {
    return tokens.iter().map(|t| hash_str(t)).collect();
  }
  tokens.windows(2).map(|w| hash_str(&format!("{}_{}", w[0], w[1]))).collect()
}

fn hash_str(s: &str) -> u64 {
  let mut hasher = DefaultHasher::new();
  s.hash(&mut hasher);
  hasher.finish()
}

/// A document's MinHash signature: the minimum hash value seen under each
/// of `NUM_HASHES` independent permutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(pub [u64; NUM_HASHES]);

impl Signature {
  #[must_use]
  pub fn compute(shingles: &HashSet<u64>) -> Self {
    let mut mins = [u64::MAX; NUM_HASHES];
    for &shingle in shingles {
      for (i, slot) in mins.iter_mut().enumerate() {
        let permuted = permute(shingle, i as u64);
        if permuted < *slot {
          *slot = permuted;
        }
      }
    }
    Self(mins)
  }

  /// Fraction of matching positions — an unbiased estimator of the true
  /// Jaccard similarity between the two shingle sets.
  #[must_use]
  pub fn estimate_jaccard(&self, other: &Self) -> f64 {
    let matches = self.0.iter().zip(other.0.iter()).filter(|(a, b)| a == b).count();
    matches as f64 / NUM_HASHES as f64
  }
}

/// A simple affine permutation `(a * x + b) mod PRIME`, seeded by `seed`
/// so each of the `NUM_HASHES` hash functions is independent.
fn permute(x: u64, seed: u64) -> u64 {
  const PRIME: u128 = 0xFFFF_FFFF_FFFF_FFC5; // largest 64-bit prime below 2^64
  let a = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
  let b = seed.wrapping_mul(0x9E37_79B9).wrapping_add(12345);
  (((a as u128).wrapping_mul(x as u128).wrapping_add(b as u128)) % PRIME) as u64
}

#[must_use]
pub fn exact_jaccard(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
  if a.is_empty() && b.is_empty() {
    return 1.0;
  }
  let intersection = a.intersection(b).count() as f64;
  let union = a.union(b).count() as f64;
  if union == 0.0 {
    0.0
  } else {
    intersection / union
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tokens(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_owned).collect()
  }

  #[test]
  fn identical_text_has_jaccard_one() {
    let shingles = token_shingles(&tokens("the quick brown fox"));
    assert!((exact_jaccard(&shingles, &shingles) - 1.0).abs() < 1e-9);
  }

  #[test]
  fn disjoint_text_has_low_estimate() {
    let a = Signature::compute(&token_shingles(&tokens("apples and oranges today")));
    let b = Signature::compute(&token_shingles(&tokens("quantum physics lecture notes")));
    assert!(a.estimate_jaccard(&b) < 0.3);
  }

  #[test]
  fn near_duplicate_has_high_estimate() {
    let a = Signature::compute(&token_shingles(&tokens("i went to the store today")));
    let b = Signature::compute(&token_shingles(&tokens("i went to the store yesterday")));
    assert!(a.estimate_jaccard(&b) > 0.5);
  }
}
