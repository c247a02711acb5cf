use recall_entities::BoundaryKind;
use recall_shared::Result;

use crate::engine::Engine;

/// Gap between consecutive turns in the same session past which a new
/// episode is considered to have started.
const TEMPORAL_GAP_MS: i64 = 30 * 60 * 1000;

impl Engine {
  /// Re-segments one session's archive into episode boundaries, annotating
  /// the first turn after each time gap with `BoundaryKind::TemporalGap`
  /// and a surprise score proportional to the gap's size. Returns the
  /// count of memories whose annotation changed.
  pub async fn segment_episode(&self, session_id: &str) -> Result<usize> {
    let mut memories = self.store.read().await.scan_archive()?;
    memories.retain(|m| m.session_id == session_id && !m.is_deleted());
    memories.sort_by_key(|m| m.created_at);

    let mut store = self.store.write().await;
    let mut changed = 0;
    for window in memories.windows(2) {
      let [prev, current] = window else { continue };
      let gap = current.created_at - prev.created_at;
      if gap < TEMPORAL_GAP_MS {
        continue;
      }
      let surprise = (gap as f64 / TEMPORAL_GAP_MS as f64).min(3.0) / 3.0;
      if current.boundary_kind == Some(BoundaryKind::TemporalGap) && (current.surprise - surprise).abs() < f64::EPSILON {
        continue;
      }
      if store.update_boundary(&current.id, Some(BoundaryKind::TemporalGap), surprise)? {
        changed += 1;
      }
    }
    Ok(changed)
  }
}
