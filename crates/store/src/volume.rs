use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use recall_entities::Memory;
use recall_shared::{Id, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// `(volume filename, byte offset)` address of one memory inside the
/// archive, found in O(1) via address index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
  pub volume_seq: u32,
  pub offset: u64,
}

#[derive(Default, Serialize, Deserialize)]
struct AddressSnapshot {
  entries: Vec<(Id, Address)>,
  volume_seq: u32,
  #[serde(default)]
  tombstones: Vec<Id>,
}

/// Append-only, volume-rotated archive of every memory ever written. The archive is the system of
/// record the fallback n-gram scan reads from; L1/L2 are caches over it.
pub struct VolumeManager {
  archive_dir: PathBuf,
  index_dir: PathBuf,
  max_bytes: u64,
  volume_seq: u32,
  current_file: File,
  current_size: u64,
  address_index: HashMap<Id, Address>,
  tombstones: HashSet<Id>,
}

fn active_path(archive_dir: &Path, seq: u32) -> PathBuf {
  archive_dir.join(format!("vol-{seq:04}.active"))
}

fn sealed_path(archive_dir: &Path, seq: u32) -> PathBuf {
  archive_dir.join(format!("vol-{seq:04}.sealed"))
}

impl VolumeManager {
  /// Opens (or creates) the archive under `data_root/archive`, replaying
  /// `index/address.snap` and then re-scanning the active volume's tail to
  /// pick up anything written since the last snapshot. A truncated final
  /// line in the active volume is trimmed and logged.
  pub fn open(data_root: impl AsRef<Path>, max_bytes: u64) -> Result<Self> {
    let data_root = data_root.as_ref();
    let archive_dir = data_root.join("data").join("archive");
    let index_dir = data_root.join("index");
    fs::create_dir_all(&archive_dir)?;
    fs::create_dir_all(&index_dir)?;

    let snapshot_path = index_dir.join("address.snap");
    let snapshot: AddressSnapshot = if snapshot_path.exists() {
      let bytes = fs::read(&snapshot_path)?;
      serde_json::from_slice(&bytes).unwrap_or_default()
    } else {
      AddressSnapshot::default()
    };

    let mut address_index: HashMap<Id, Address> = snapshot.entries.into_iter().collect();
    let tombstones: HashSet<Id> = snapshot.tombstones.into_iter().collect();
    let mut volume_seq = snapshot.volume_seq;

    // Find the highest-numbered `.active` volume, creating vol-0000 if none
    // exist yet.
    let mut found_active = false;
    if let Ok(entries) = fs::read_dir(&archive_dir) {
      for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(seq_str) = name.strip_prefix("vol-").and_then(|s| s.strip_suffix(".active")) {
          if let Ok(seq) = seq_str.parse::<u32>() {
            if seq >= volume_seq {
              volume_seq = seq;
              found_active = true;
            }
          }
        }
      }
    }
    if !found_active {
      File::create(active_path(&archive_dir, volume_seq))?;
    }

    let path = active_path(&archive_dir, volume_seq);
    let current_size = Self::validate_and_trim(&path, &mut address_index, volume_seq)?;

    let current_file = OpenOptions::new().create(true).append(true).read(true).open(&path)?;

    Ok(Self {
      archive_dir,
      index_dir,
      max_bytes,
      volume_seq,
      current_file,
      current_size,
      address_index,
      tombstones,
    })
  }

  /// Re-derives `address_index` entries for any line beyond what the
  /// snapshot already recorded, and trims a truncated final line.
  fn validate_and_trim(path: &Path, address_index: &mut HashMap<Id, Address>, volume_seq: u32) -> Result<u64> {
    let Ok(file) = File::open(path) else {
      return Ok(0);
    };
    let reader = BufReader::new(file);
    let mut offset: u64 = 0;
    let mut valid_end: u64 = 0;

    for line in reader.lines() {
      let line = match line {
        Ok(l) => l,
        Err(_) => break,
      };
      let line_len = line.len() as u64 + 1; // + newline
      match serde_json::from_str::<Memory>(&line) {
        Ok(memory) => {
          address_index.entry(memory.id).or_insert(Address { volume_seq, offset });
          offset += line_len;
          valid_end = offset;
        }
        Err(_) => {
          warn!("truncated archive tail detected in {}, trimming", path.display());
          break;
        }
      }
    }

    if valid_end < fs::metadata(path).map(|m| m.len()).unwrap_or(0) {
      let file = OpenOptions::new().write(true).open(path)?;
      file.set_len(valid_end)?;
    }

    Ok(valid_end)
  }

  /// Appends `memory` to the current volume, rotating to a fresh one first
  /// if the append would exceed `max_bytes`.
  /// Returns the `Address` to record in L1/L2/indexes.
  pub fn append(&mut self, memory: &Memory) -> Result<Address> {
    let mut line = serde_json::to_string(memory)?;
    line.push('\n');
    let line_len = line.len() as u64;

    if self.current_size + line_len > self.max_bytes && self.current_size > 0 {
      self.rotate()?;
    }

    let offset = self.current_size;
    self.current_file.write_all(line.as_bytes())?;
    self.current_file.sync_data()?;
    self.current_size += line_len;

    let address = Address {
      volume_seq: self.volume_seq,
      offset,
    };
    self.address_index.insert(memory.id.clone(), address);
    Ok(address)
  }

  fn rotate(&mut self) -> Result<()> {
    let old_active = active_path(&self.archive_dir, self.volume_seq);
    let old_sealed = sealed_path(&self.archive_dir, self.volume_seq);
    fs::rename(&old_active, &old_sealed)?;

    self.volume_seq += 1;
    let new_path = active_path(&self.archive_dir, self.volume_seq);
    self.current_file = OpenOptions::new().create(true).append(true).read(true).open(&new_path)?;
    self.current_size = 0;
    self.flush_address_snapshot()
  }

  fn volume_path(&self, seq: u32) -> PathBuf {
    let active = active_path(&self.archive_dir, seq);
    if active.exists() {
      active
    } else {
      sealed_path(&self.archive_dir, seq)
    }
  }

  /// Reads one memory back from the archive by address, O(1) via a single
  /// seek.
  pub fn read_at(&self, address: Address) -> Result<Memory> {
    let path = self.volume_path(address.volume_seq);
    let mut file = File::open(&path)?;
    file.seek(SeekFrom::Start(address.offset))?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    reader.read_line_buf(&mut line)?;
    Ok(serde_json::from_str(&line)?)
  }

  #[must_use]
  pub fn address_of(&self, id: &Id) -> Option<Address> {
    self.address_index.get(id).copied()
  }

  /// Linear scan over every sealed and active volume, for the fallback
  /// raw-text recall path. Skips tombstoned ids — the archive line itself
  /// is append-only and never rewritten, so the tombstone set is the only
  /// thing keeping a deleted memory out of this scan.
  pub fn scan_all(&self) -> Result<Vec<Memory>> {
    let mut out = Vec::new();
    let mut entries: Vec<(u32, PathBuf)> = Vec::new();
    if let Ok(dir) = fs::read_dir(&self.archive_dir) {
      for entry in dir.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let seq = name
          .strip_prefix("vol-")
          .and_then(|s| s.split('.').next())
          .and_then(|s| s.parse::<u32>().ok());
        if let Some(seq) = seq {
          entries.push((seq, entry.path()));
        }
      }
    }
    entries.sort_by_key(|(seq, _)| *seq);
    for (_, path) in entries {
      let Ok(file) = File::open(&path) else { continue };
      for line in BufReader::new(file).lines().map_while(std::result::Result::ok) {
        if let Ok(memory) = serde_json::from_str::<Memory>(&line) {
          if !self.tombstones.contains(&memory.id) {
            out.push(memory);
          }
        }
      }
    }
    Ok(out)
  }

  pub fn flush_address_snapshot(&self) -> Result<()> {
    let snapshot = AddressSnapshot {
      entries: self.address_index.iter().map(|(k, v)| (k.clone(), *v)).collect(),
      volume_seq: self.volume_seq,
      tombstones: self.tombstones.iter().cloned().collect(),
    };
    let bytes = serde_json::to_vec(&snapshot)?;
    fs::write(self.index_dir.join("address.snap"), bytes)?;
    Ok(())
  }

  pub fn remove_from_index(&mut self, id: &Id) {
    self.address_index.remove(id);
  }

  /// Marks `id` so `scan_all` will never surface it again, regardless of
  /// delete mode — the archive entry itself outlives both.
  pub fn tombstone(&mut self, id: &Id) {
    self.tombstones.insert(id.clone());
  }
}

/// Small helper trait so `read_at` can reuse `BufReader::read_line` without
/// importing `std::io::BufRead` awkwardly at the call site.
trait ReadLineBuf {
  fn read_line_buf(&mut self, buf: &mut String) -> std::io::Result<usize>;
}

impl<R: BufRead> ReadLineBuf for R {
  fn read_line_buf(&mut self, buf: &mut String) -> std::io::Result<usize> {
    self.read_line(buf)
  }
}

#[cfg(test)]
mod tests {
  use recall_entities::MemoryRole;

  use super::*;

  #[test]
  fn append_then_read_roundtrips() {
    let dir = tempfile::tempdir().unwrap();
    let mut vm = VolumeManager::open(dir.path(), 1024 * 1024).unwrap();
    let memory = Memory::builder("hello", MemoryRole::User, "u1", "s1").build();
    let id = memory.id.clone();
    let addr = vm.append(&memory).unwrap();
    let read_back = vm.read_at(addr).unwrap();
    assert_eq!(read_back.id, id);
    assert_eq!(vm.address_of(&id), Some(addr));
  }

  #[test]
  fn rotates_when_volume_exceeds_max_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let mut vm = VolumeManager::open(dir.path(), 200).unwrap();
    for _ in 0..10 {
      let memory = Memory::builder("x".repeat(50), MemoryRole::User, "u1", "s1").build();
      vm.append(&memory).unwrap();
    }
    assert!(vm.volume_seq > 0, "expected at least one rotation");
  }

  #[test]
  fn scan_all_finds_everything_across_volumes() {
    let dir = tempfile::tempdir().unwrap();
    let mut vm = VolumeManager::open(dir.path(), 200).unwrap();
    let mut ids = Vec::new();
    for _ in 0..10 {
      let memory = Memory::builder("x".repeat(50), MemoryRole::User, "u1", "s1").build();
      ids.push(memory.id.clone());
      vm.append(&memory).unwrap();
    }
    let scanned = vm.scan_all().unwrap();
    assert_eq!(scanned.len(), ids.len());
  }

  #[test]
  fn reopen_rebuilds_address_index() {
    let dir = tempfile::tempdir().unwrap();
    let id;
    let addr;
    {
      let mut vm = VolumeManager::open(dir.path(), 1024 * 1024).unwrap();
      let memory = Memory::builder("hello", MemoryRole::User, "u1", "s1").build();
      id = memory.id.clone();
      addr = vm.append(&memory).unwrap();
      vm.flush_address_snapshot().unwrap();
    }
    let vm2 = VolumeManager::open(dir.path(), 1024 * 1024).unwrap();
    assert_eq!(vm2.address_of(&id), Some(addr));
  }
}
