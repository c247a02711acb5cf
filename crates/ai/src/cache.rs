use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use recall_shared::Result;

/// `hash(text, model) -> key`, used both as the in-memory LRU key and the
/// on-disk filename stem.
#[must_use]
pub fn cache_key(text: &str, model: &str) -> String {
  let mut hasher = std::collections::hash_map::DefaultHasher::new();
  text.hash(&mut hasher);
  model.hash(&mut hasher);
  format!("{:016x}", hasher.finish())
}

struct Inner {
  map: HashMap<String, Vec<f32>>,
  order: VecDeque<String>,
  capacity: usize,
}

impl Inner {
  fn touch(&mut self, key: &str) {
    if let Some(pos) = self.order.iter().position(|k| k == key) {
      self.order.remove(pos);
    }
    self.order.push_back(key.to_owned());
  }

  fn insert(&mut self, key: String, value: Vec<f32>) {
    if !self.map.contains_key(&key) && self.map.len() >= self.capacity {
      if let Some(evicted) = self.order.pop_front() {
        self.map.remove(&evicted);
      }
    }
    self.map.insert(key.clone(), value);
    self.touch(&key);
  }
}

/// Disk-backed LRU cache for embedding vectors. The in-memory LRU bounds
/// RAM; the disk directory is unbounded and durable across restarts —
/// a warm process still hits memory first, a cold one falls through to
/// disk before ever calling the embedding backend.
pub struct EmbeddingCache {
  inner: Mutex<Inner>,
  dir: PathBuf,
}

impl EmbeddingCache {
  #[must_use]
  pub fn new(dir: impl Into<PathBuf>, capacity: usize) -> Self {
    let dir = dir.into();
    let _ = std::fs::create_dir_all(&dir);
    Self {
      inner: Mutex::new(Inner {
        map: HashMap::new(),
        order: VecDeque::new(),
        capacity,
      }),
      dir,
    }
  }

  fn disk_path(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{key}.bin"))
  }

  fn read_disk(path: &Path) -> Option<Vec<f32>> {
    let bytes = std::fs::read(path).ok()?;
    if bytes.len() % 4 != 0 {
      return None;
    }
    Some(
      bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect(),
    )
  }

  fn write_disk(&self, key: &str, value: &[f32]) -> Result<()> {
    let mut bytes = Vec::with_capacity(value.len() * 4);
    for v in value {
      bytes.extend_from_slice(&v.to_le_bytes());
    }
    std::fs::write(self.disk_path(key), bytes)?;
    Ok(())
  }

  /// Returns the cached vector for `(text, model)`, checking memory then
  /// disk, or `None` on a cold cache miss.
  #[must_use]
  pub fn get(&self, text: &str, model: &str) -> Option<Vec<f32>> {
    let key = cache_key(text, model);
    {
      let mut inner = self.inner.lock().expect("cache lock poisoned");
      if let Some(v) = inner.map.get(&key).cloned() {
        inner.touch(&key);
        return Some(v);
      }
    }
    let from_disk = Self::read_disk(&self.disk_path(&key))?;
    let mut inner = self.inner.lock().expect("cache lock poisoned");
    inner.insert(key, from_disk.clone());
    Some(from_disk)
  }

  pub fn put(&self, text: &str, model: &str, value: Vec<f32>) -> Result<()> {
    let key = cache_key(text, model);
    self.write_disk(&key, &value)?;
    let mut inner = self.inner.lock().expect("cache lock poisoned");
    inner.insert(key, value);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let cache = EmbeddingCache::new(dir.path(), 10);
    cache.put("hello", "m1", vec![1.0, 2.0, 3.0]).unwrap();

    let fresh = EmbeddingCache::new(dir.path(), 10);
    assert_eq!(fresh.get("hello", "m1"), Some(vec![1.0, 2.0, 3.0]));
  }

  #[test]
  fn distinct_models_have_distinct_keys() {
    assert_ne!(cache_key("hi", "m1"), cache_key("hi", "m2"));
  }

  #[test]
  fn lru_evicts_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let cache = EmbeddingCache::new(dir.path(), 2);
    cache.put("a", "m", vec![1.0]).unwrap();
    cache.put("b", "m", vec![2.0]).unwrap();
    cache.put("c", "m", vec![3.0]).unwrap();
    // "a" evicted from memory, but disk copy is still readable.
    assert_eq!(cache.get("a", "m"), Some(vec![1.0]));
  }
}
