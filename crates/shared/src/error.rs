use std::fmt;

/// Abstract error kinds from the error-handling design. These are
/// surfaced to callers alongside a human message; they never encode a
/// concrete Rust type so that transport layers (out of scope here) can
/// map them to whatever status scheme they like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Caller error: bad ids, out-of-range enums. No retry.
  InvalidArgument,
  /// Memory, entity, foreshadowing, or shard missing.
  NotFound,
  /// Contradiction detected and the resolution strategy forbids auto-merge.
  Conflict,
  /// Archive append or shard write failed; operation aborted atomically.
  Storage,
  /// WAL/snapshot mismatch; index was rebuilt from the archive.
  IndexCorrupted,
  /// Embedding or LLM call failed after retries and circuit-break.
  BackendUnavailable,
  /// LLM budget exhausted for the current window.
  BudgetExceeded,
  /// Deadline elapsed before the operation completed.
  Timeout,
  /// Internal throttle; caller should back off.
  RateLimited,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      ErrorKind::InvalidArgument => "invalid_argument",
      ErrorKind::NotFound => "not_found",
      ErrorKind::Conflict => "conflict",
      ErrorKind::Storage => "storage",
      ErrorKind::IndexCorrupted => "index_corrupted",
      ErrorKind::BackendUnavailable => "backend_unavailable",
      ErrorKind::BudgetExceeded => "budget_exceeded",
      ErrorKind::Timeout => "timeout",
      ErrorKind::RateLimited => "rate_limited",
    };
    f.write_str(s)
  }
}

/// The engine's single error type. Every fallible operation in every
/// crate returns `Result<T, RecallError>`.
#[derive(Debug)]
pub struct RecallError {
  kind: ErrorKind,
  err: anyhow::Error,
}

impl RecallError {
  pub fn new<E: Into<anyhow::Error>>(kind: ErrorKind, err: E) -> Self {
    Self {
      kind,
      err: err.into(),
    }
  }

  pub fn invalid_argument(msg: impl fmt::Display) -> Self {
    Self::new(ErrorKind::InvalidArgument, anyhow::anyhow!("{msg}"))
  }

  pub fn not_found(msg: impl fmt::Display) -> Self {
    Self::new(ErrorKind::NotFound, anyhow::anyhow!("{msg}"))
  }

  pub fn conflict(msg: impl fmt::Display) -> Self {
    Self::new(ErrorKind::Conflict, anyhow::anyhow!("{msg}"))
  }

  pub fn storage(err: impl Into<anyhow::Error>) -> Self {
    Self::new(ErrorKind::Storage, err)
  }

  pub fn index_corrupted(msg: impl fmt::Display) -> Self {
    Self::new(ErrorKind::IndexCorrupted, anyhow::anyhow!("{msg}"))
  }

  pub fn backend_unavailable(err: impl Into<anyhow::Error>) -> Self {
    Self::new(ErrorKind::BackendUnavailable, err)
  }

  pub fn budget_exceeded(msg: impl fmt::Display) -> Self {
    Self::new(ErrorKind::BudgetExceeded, anyhow::anyhow!("{msg}"))
  }

  pub fn timeout(msg: impl fmt::Display) -> Self {
    Self::new(ErrorKind::Timeout, anyhow::anyhow!("{msg}"))
  }

  pub fn rate_limited(msg: impl fmt::Display) -> Self {
    Self::new(ErrorKind::RateLimited, anyhow::anyhow!("{msg}"))
  }

  #[must_use]
  pub const fn kind(&self) -> ErrorKind {
    self.kind
  }

  /// Human-readable message, independent of `kind`.
  #[must_use]
  pub fn message(&self) -> String {
    self.err.to_string()
  }
}

impl fmt::Display for RecallError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}] {}", self.kind, self.err)
  }
}

impl std::error::Error for RecallError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    self.err.source()
  }
}

impl From<anyhow::Error> for RecallError {
  fn from(err: anyhow::Error) -> Self {
    Self::new(ErrorKind::Storage, err)
  }
}

impl From<std::io::Error> for RecallError {
  fn from(err: std::io::Error) -> Self {
    Self::new(ErrorKind::Storage, anyhow::Error::new(err))
  }
}

impl From<serde_json::Error> for RecallError {
  fn from(err: serde_json::Error) -> Self {
    Self::new(ErrorKind::InvalidArgument, anyhow::Error::new(err))
  }
}

pub type Result<T> = std::result::Result<T, RecallError>;
