use chrono::Utc;

/// Current time as epoch milliseconds, the unit `created_at`/`system_time`
/// are stored in throughout the data model.
#[must_use]
pub fn now_ms() -> i64 {
  Utc::now().timestamp_millis()
}
