use std::sync::Arc;

use recall_shared::Config;
use tokio::sync::RwLock;
use tracing::info;

/// Hot-reloadable configuration cell. Readers clone the `Arc` once per request and keep
/// using that snapshot for the request's duration; a reload never mutates
/// a snapshot already handed out.
pub struct ConfigHandle {
  inner: RwLock<Arc<Config>>,
}

impl ConfigHandle {
  #[must_use]
  pub fn new(config: Config) -> Self {
    Self { inner: RwLock::new(Arc::new(config)) }
  }

  pub async fn snapshot(&self) -> Arc<Config> {
    self.inner.read().await.clone()
  }

  /// Reloads from `data_root`'s `config/api_keys.env` and environment,
  /// replacing the current snapshot. In-flight requests already holding
  /// the old `Arc` are unaffected.
  pub async fn reload(&self, data_root: impl Into<std::path::PathBuf>) {
    let config = Config::load(data_root);
    for warning in &config.warnings {
      tracing::warn!(%warning, "config warning on reload");
    }
    *self.inner.write().await = Arc::new(config);
    info!("configuration reloaded");
  }
}
