use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use recall_shared::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Append-only WAL plus periodic full snapshot, shared by every index in
/// this crate.
///
/// `snapshot_path` holds the last full state as one JSON document.
/// `wal_path` holds one JSON-encoded operation per line, appended since the
/// last snapshot. `load` replays `wal_path` onto whatever `snapshot_path`
/// deserializes to (or the type's `Default` if no snapshot exists yet).
pub struct WalSnapshot {
  snapshot_path: PathBuf,
  wal_path: PathBuf,
  wal_file: Option<File>,
}

impl WalSnapshot {
  #[must_use]
  pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
    let dir = dir.as_ref();
    let _ = fs::create_dir_all(dir);
    Self {
      snapshot_path: dir.join(format!("{name}.snap")),
      wal_path: dir.join(format!("{name}.wal")),
      wal_file: None,
    }
  }

  fn wal_writer(&mut self) -> Result<&mut File> {
    if self.wal_file.is_none() {
      let f = OpenOptions::new().create(true).append(true).open(&self.wal_path)?;
      self.wal_file = Some(f);
    }
    Ok(self.wal_file.as_mut().expect("just initialized"))
  }

  /// Appends one operation to the WAL. Called on every mutating index
  /// call; the index itself decides when to compact via `snapshot`.
  pub fn append<Op: Serialize>(&mut self, op: &Op) -> Result<()> {
    let line = serde_json::to_string(op)?;
    let f = self.wal_writer()?;
    writeln!(f, "{line}")?;
    f.flush()?;
    Ok(())
  }

  /// Writes a full snapshot and truncates the WAL, since every recorded
  /// operation is now folded into `state`.
  pub fn snapshot<State: Serialize>(&mut self, state: &State) -> Result<()> {
    let bytes = serde_json::to_vec(state)?;
    fs::write(&self.snapshot_path, bytes)?;
    self.wal_file = None;
    fs::write(&self.wal_path, b"")?;
    Ok(())
  }

  /// Loads the last snapshot (or `State::default()`), then replays the WAL
  /// tail by calling `apply` for each recorded operation in order.
  pub fn load<State, Op>(&self, mut apply: impl FnMut(&mut State, Op)) -> Result<State>
  where
    State: DeserializeOwned + Default,
    Op: DeserializeOwned,
  {
    let mut state = if self.snapshot_path.exists() {
      let bytes = fs::read(&self.snapshot_path)?;
      serde_json::from_slice(&bytes)?
    } else {
      State::default()
    };

    if self.wal_path.exists() {
      let file = File::open(&self.wal_path)?;
      for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
          continue;
        }
        match serde_json::from_str::<Op>(&line) {
          Ok(op) => apply(&mut state, op),
          Err(e) => {
            tracing::warn!("skipping malformed WAL line: {e}");
          }
        }
      }
    }

    Ok(state)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use serde::Deserialize;

  use super::*;

  #[derive(Default, Serialize, Deserialize)]
  struct Counts(HashMap<String, i64>);

  #[derive(Serialize, Deserialize)]
  enum Op {
    Add(String, i64),
  }

  #[test]
  fn replays_wal_onto_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let mut ws = WalSnapshot::new(dir.path(), "counts");

    ws.append(&Op::Add("a".into(), 1)).unwrap();
    ws.append(&Op::Add("a".into(), 2)).unwrap();

    let state: Counts = ws
      .load(|s: &mut Counts, op| match op {
        Op::Add(k, v) => *s.0.entry(k).or_insert(0) += v,
      })
      .unwrap();
    assert_eq!(state.0["a"], 3);

    ws.snapshot(&state).unwrap();
    ws.append(&Op::Add("a".into(), 5)).unwrap();

    let reloaded: Counts = ws
      .load(|s: &mut Counts, op| match op {
        Op::Add(k, v) => *s.0.entry(k).or_insert(0) += v,
      })
      .unwrap();
    assert_eq!(reloaded.0["a"], 8);
  }
}
