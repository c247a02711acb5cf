use std::fs;
use std::path::PathBuf;

use recall_entities::{CoreSettings, Memory};
use recall_shared::{now_ms, Id, RecallError, Result, StoreConfig};
use tracing::{debug, info};

use crate::l1::ConsolidatedStore;
use crate::l2::WorkingSet;
use crate::volume::VolumeManager;

/// Deletion semantics for `Store::delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
  /// Sets a tombstone; the archive copy and historical record survive.
  Logical,
  /// Removes the memory everywhere it's stored. Callers outside a reset
  /// flow should prefer `Logical`.
  Physical,
}

/// Owns the canonical memory corpus across all three tiers plus the L0
/// settings and the volume-addressed archive. Index and graph
/// upkeep is the controller's job; `Store` only guarantees archive/L1/L2
/// consistency.
pub struct Store {
  data_root: PathBuf,
  config: StoreConfig,
  volumes: VolumeManager,
  l2: WorkingSet,
  l1: ConsolidatedStore,
  core_settings: CoreSettings,
}

impl Store {
  pub fn open(config: StoreConfig) -> Result<Self> {
    let data_root = config.data_root.clone();
    let volumes = VolumeManager::open(&data_root, config.volume_max_bytes)?;
    let l2 = WorkingSet::load(data_root.join("data").join("L2_working"), config.l2_capacity)?;
    let l1 = ConsolidatedStore::load(data_root.join("data").join("L1_consolidated"), config.l1_shard_capacity)?;
    let core_settings = Self::load_core_settings(&data_root)?;

    info!(data_root = %data_root.display(), "store opened");
    Ok(Self {
      data_root,
      config,
      volumes,
      l2,
      l1,
      core_settings,
    })
  }

  fn core_settings_path(data_root: &std::path::Path) -> PathBuf {
    data_root.join("config").join("core_settings.json")
  }

  fn load_core_settings(data_root: &std::path::Path) -> Result<CoreSettings> {
    let path = Self::core_settings_path(data_root);
    if !path.exists() {
      return Ok(CoreSettings::default());
    }
    let bytes = fs::read(&path)?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  #[must_use]
  pub fn core_settings(&self) -> &CoreSettings {
    &self.core_settings
  }

  /// L0 is read-only during a request; this is the session-boundary
  /// reload path.
  pub fn set_core_settings(&mut self, settings: CoreSettings) -> Result<()> {
    let path = Self::core_settings_path(&self.data_root);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(&path, serde_json::to_vec(&settings)?)?;
    self.core_settings = settings;
    Ok(())
  }

  /// Appends to the archive, then inserts into L2. If the archive append
  /// fails the call returns before touching L2.
  pub fn put(&mut self, memory: Memory) -> Result<Id> {
    let id = memory.id.clone();
    self.volumes.append(&memory)?;
    if let Some(evicted) = self.l2.put(memory) {
      debug!(memory_id = %evicted.id, "L2 evicted entry, migrating to L1");
      self.l1.migrate(vec![evicted])?;
    }
    Ok(id)
  }

  /// O(1) via the address index; resident memories are served straight
  /// from L2/L1 without touching the archive.
  pub fn get(&mut self, id: &Id) -> Result<Option<Memory>> {
    if let Some(memory) = self.l2.get(id) {
      return Ok(Some(memory.clone()));
    }
    if let Some(memory) = self.l1.get(id) {
      return Ok(Some(memory.clone()));
    }
    let Some(address) = self.volumes.address_of(id) else {
      return Ok(None);
    };
    Ok(Some(self.volumes.read_at(address)?))
  }

  /// Ordered by `turn_seq` descending. Scans L2 and L1 only
  /// — the archive is scanned separately by the raw-text fallback path.
  #[must_use]
  pub fn list(&self, user_id: &str, session_id: &str, since: Option<i64>, limit: usize) -> Vec<Memory> {
    let mut matches: Vec<Memory> = self
      .l2
      .iter()
      .chain(self.l1.iter())
      .filter(|m| m.user_id == user_id && m.session_id == session_id && !m.is_deleted())
      .filter(|m| since.is_none_or(|since| m.created_at >= since))
      .cloned()
      .collect();
    matches.sort_by(|a, b| b.turn_seq.cmp(&a.turn_seq));
    matches.truncate(limit);
    matches
  }

  /// Memories tagged with `character_id`, newest first, scanning L2 and L1
  /// only. Used by the foreshadowing
  /// analyzer, which keys on character rather than `(user, session)`.
  #[must_use]
  pub fn list_by_character(&self, character_id: &str, limit: usize) -> Vec<Memory> {
    let mut matches: Vec<Memory> = self
      .l2
      .iter()
      .chain(self.l1.iter())
      .filter(|m| m.character_id.as_deref() == Some(character_id) && !m.is_deleted())
      .cloned()
      .collect();
    matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    matches.truncate(limit);
    matches
  }

  /// Logical delete tombstones in place; physical delete removes the
  /// memory from L2/L1/address-index entirely. The archive copy is never
  /// rewritten — it is append-only.
  pub fn delete(&mut self, id: &Id, mode: DeleteMode) -> Result<()> {
    match mode {
      DeleteMode::Logical => {
        if let Some(memory) = self.l2.get(id) {
          let mut memory = memory.clone();
          memory.deleted_at = Some(now_ms());
          self.l2.put(memory);
          self.volumes.tombstone(id);
          return Ok(());
        }
        if let Some(memory) = self.l1.get(id) {
          let mut memory = memory.clone();
          memory.deleted_at = Some(now_ms());
          self.l1.remove(id)?;
          self.l1.migrate(vec![memory])?;
          self.volumes.tombstone(id);
          return Ok(());
        }
        Err(RecallError::not_found(format!("memory {id} not found for logical delete")))
      }
      DeleteMode::Physical => {
        let removed_l2 = self.l2.remove(id).is_some();
        let removed_l1 = self.l1.remove(id)?.is_some();
        self.volumes.remove_from_index(id);
        self.volumes.tombstone(id);
        if !removed_l2 && !removed_l1 {
          return Err(RecallError::not_found(format!("memory {id} not found for physical delete")));
        }
        Ok(())
      }
    }
  }

  /// Explicitly drains `batch_size` least-recently-used L2 entries into L1,
  /// for the consolidation background job rather than ad-hoc eviction on
  /// `put`.
  pub fn migrate_batch_to_l1(&mut self) -> Result<usize> {
    let mut batch = Vec::new();
    let ids: Vec<Id> = self.l2.iter().map(|m| m.id.clone()).take(self.config.batch_size).collect();
    for id in ids {
      if let Some(memory) = self.l2.remove(&id) {
        batch.push(memory);
      }
    }
    let migrated = batch.len();
    self.l1.migrate(batch)?;
    Ok(migrated)
  }

  pub fn flush(&mut self) -> Result<()> {
    self.l2.flush()?;
    self.volumes.flush_address_snapshot()?;
    Ok(())
  }

  /// Raw-text fallback scan over the whole archive.
  pub fn scan_archive(&self) -> Result<Vec<Memory>> {
    self.volumes.scan_all()
  }

  /// `(L2 resident, L1 resident)` counts for the stats operation.
  #[must_use]
  pub fn resident_counts(&self) -> (u64, u64) {
    (self.l2.iter().count() as u64, self.l1.iter().count() as u64)
  }

  /// Rewrites a resident memory's retrieval-only boundary annotation in
  /// place, without touching the append-only archive.
  /// Returns `false` if the memory isn't resident in L2 or L1.
  pub fn update_boundary(&mut self, id: &Id, boundary_kind: Option<recall_entities::BoundaryKind>, surprise: f64) -> Result<bool> {
    if let Some(memory) = self.l2.get(id) {
      let mut memory = memory.clone();
      memory.boundary_kind = boundary_kind;
      memory.surprise = surprise;
      self.l2.put(memory);
      return Ok(true);
    }
    if let Some(memory) = self.l1.get(id) {
      let mut memory = memory.clone();
      memory.boundary_kind = boundary_kind;
      memory.surprise = surprise;
      self.l1.remove(id)?;
      self.l1.migrate(vec![memory])?;
      return Ok(true);
    }
    Ok(false)
  }
}

#[cfg(test)]
mod tests {
  use recall_entities::MemoryRole;

  use super::*;

  fn config(dir: &std::path::Path) -> StoreConfig {
    StoreConfig {
      data_root: dir.to_path_buf(),
      l2_capacity: 2,
      l1_shard_capacity: 10,
      volume_max_bytes: 1024 * 1024,
      batch_size: 10,
    }
  }

  #[test]
  fn put_then_get_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(config(dir.path())).unwrap();
    let memory = Memory::builder("hello", MemoryRole::User, "u1", "s1").build();
    let id = store.put(memory).unwrap();
    let fetched = store.get(&id).unwrap().unwrap();
    assert_eq!(fetched.content, "hello");
  }

  #[test]
  fn eviction_from_l2_lands_in_l1() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(config(dir.path())).unwrap();
    let mut ids = Vec::new();
    for i in 0..5 {
      let memory = Memory::builder(format!("m{i}"), MemoryRole::User, "u1", "s1").build();
      ids.push(store.put(memory).unwrap());
    }
    // capacity is 2, so the earliest puts should have spilled into L1 but
    // still be reachable through `get`.
    let first = store.get(&ids[0]).unwrap();
    assert!(first.is_some());
  }

  #[test]
  fn logical_delete_tombstones_without_losing_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(config(dir.path())).unwrap();
    let memory = Memory::builder("hello", MemoryRole::User, "u1", "s1").build();
    let id = store.put(memory).unwrap();
    store.delete(&id, DeleteMode::Logical).unwrap();
    let fetched = store.get(&id).unwrap().unwrap();
    assert!(fetched.is_deleted());
  }

  #[test]
  fn logical_delete_keeps_the_memory_out_of_the_archive_scan() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(config(dir.path())).unwrap();
    let memory = Memory::builder("the only memory mentioning xylophone", MemoryRole::User, "u1", "s1").build();
    let id = store.put(memory).unwrap();
    store.delete(&id, DeleteMode::Logical).unwrap();
    let archive = store.scan_archive().unwrap();
    assert!(archive.iter().all(|m| m.id != id));
  }

  #[test]
  fn physical_delete_removes_from_working_tiers() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(config(dir.path())).unwrap();
    let memory = Memory::builder("hello", MemoryRole::User, "u1", "s1").build();
    let id = store.put(memory).unwrap();
    store.delete(&id, DeleteMode::Physical).unwrap();
    assert!(store.volumes.address_of(&id).is_none());
  }

  #[test]
  fn list_orders_by_turn_seq_descending() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = Store::open(config(dir.path())).unwrap();
    for i in 0..3 {
      let memory = Memory::builder(format!("m{i}"), MemoryRole::User, "u1", "s1")
        .turn_seq(i)
        .build();
      store.put(memory).unwrap();
    }
    let listed = store.list("u1", "s1", None, 10);
    assert_eq!(listed[0].turn_seq, 2);
    assert_eq!(listed.last().unwrap().turn_seq, 0);
  }
}
