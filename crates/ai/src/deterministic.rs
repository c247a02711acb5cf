use async_trait::async_trait;
use recall_shared::Result;

use crate::contracts::Embedder;

/// Deterministic `text -> float32[d]` backend with no network dependency
///. Used as the default when no
/// API key is configured, and in tests, so the rest of the pipeline is
/// exercisable without a live provider.
pub struct DeterministicEmbedder {
  dimension: usize,
}

impl DeterministicEmbedder {
  #[must_use]
  pub const fn new(dimension: usize) -> Self {
    Self { dimension }
  }
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    // A bag-of-characters hash projected into `dimension` buckets. Not a
    // semantic embedding, but stable and cosine-comparable, which is all
    // the retriever's vector arm requires in tests/offline mode.
    let mut v = vec![0.0_f32; self.dimension];
    for (i, byte) in text.bytes().enumerate() {
      let bucket = (usize::from(byte) + i) % self.dimension;
      v[bucket] += 1.0;
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
      for x in &mut v {
        *x /= norm;
      }
    }
    Ok(v)
  }

  fn model_name(&self) -> &str {
    "deterministic-bag-of-chars"
  }

  fn dimension(&self) -> usize {
    self.dimension
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn same_text_same_vector() {
    let e = DeterministicEmbedder::new(32);
    let a = e.embed("hello world").await.unwrap();
    let b = e.embed("hello world").await.unwrap();
    assert_eq!(a, b);
  }

  #[tokio::test]
  async fn different_text_different_vector() {
    let e = DeterministicEmbedder::new(32);
    let a = e.embed("hello world").await.unwrap();
    let b = e.embed("goodbye moon").await.unwrap();
    assert_ne!(a, b);
  }
}
