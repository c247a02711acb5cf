use std::collections::HashMap;
use std::sync::Arc;

use recall_ai::{ChatClient, Embedder};
use recall_analyzers::{ConsistencyChecker, ForeshadowingTracker, PersistentContextTracker};
use recall_dedup::Deduplicator;
use recall_entities::EntityKey;
use recall_graph::{ContradictionManager, DetectionStrategy, FileGraphBackend, GraphBackend};
use recall_retriever::RetentionTracker;
use recall_shared::{Config, Id, Result, StoreConfig};
use recall_store::Store;
use recall_tokenizer::{RuleTokenizer, Tokenizer};
use recall_worker::TaskManager;
use tokio::sync::RwLock;

use crate::config::ConfigHandle;
use crate::indexes::IndexBundle;
use crate::providers;

/// The controller: the only crate with a consistent view across the
/// store, the graph, every index, and every analyzer. Owns the fixed
/// store → graph lock acquisition order and the index batch
/// lock that keeps a single ingest's six index updates atomic.
pub struct Engine {
  pub(crate) data_root: std::path::PathBuf,
  pub(crate) config: ConfigHandle,
  pub(crate) store: RwLock<Store>,
  pub(crate) graph: RwLock<Box<dyn GraphBackend>>,
  pub(crate) indexes: RwLock<IndexBundle>,
  pub(crate) dedup: RwLock<Deduplicator>,
  pub(crate) dedup_texts: RwLock<HashMap<Id, String>>,
  pub(crate) contradictions: RwLock<ContradictionManager>,
  pub(crate) foreshadowing: RwLock<ForeshadowingTracker>,
  pub(crate) persistent_context: RwLock<PersistentContextTracker>,
  pub(crate) consistency: RwLock<ConsistencyChecker>,
  pub(crate) retention: RwLock<RetentionTracker>,
  pub(crate) memory_entities: RwLock<HashMap<Id, Vec<EntityKey>>>,
  pub(crate) turn_seq: RwLock<HashMap<(String, String), i64>>,
  pub(crate) embedder: Arc<dyn Embedder>,
  pub(crate) chat: Option<Arc<dyn ChatClient>>,
  pub(crate) tokenizer: Arc<dyn Tokenizer>,
  pub(crate) tasks: TaskManager,
}

impl Engine {
  /// Opens (or creates) the engine rooted at `data_root`, loading
  /// configuration, the store, the graph backend, every index, and every
  /// analyzer's persisted state in that order.
  pub async fn open(data_root: impl Into<std::path::PathBuf>) -> Result<Self> {
    let data_root = data_root.into();
    let config = Config::load(&data_root);
    for warning in &config.warnings {
      tracing::warn!(%warning, "config warning on open");
    }

    let store_config = StoreConfig {
      data_root: data_root.clone(),
      ..config.store.clone()
    };
    let store = Store::open(store_config)?;

    let graph: Box<dyn GraphBackend> = Box::new(FileGraphBackend::load(data_root.join("data").join("graph"))?);

    let indexes = IndexBundle::open(&data_root.join("data").join("index"), &config.retrieval, 100_000)?;

    let embedder = providers::build_embedder(&config, &data_root);
    let chat = providers::build_chat(&config);

    let dedup = Deduplicator::new(config.dedup.clone(), chat.clone());
    let contradictions = ContradictionManager::new(DetectionStrategy::Auto, chat.clone());
    let foreshadowing = ForeshadowingTracker::new(config.foreshadowing.clone(), chat.clone(), Some(embedder.clone()));
    let persistent_context = PersistentContextTracker::new(config.persistent_context.clone());
    let consistency = ConsistencyChecker::compile(&store.core_settings().absolute_rules);
    let retention = RetentionTracker::new()?;

    Ok(Self {
      data_root,
      config: ConfigHandle::new(config),
      store: RwLock::new(store),
      graph: RwLock::new(graph),
      indexes: RwLock::new(indexes),
      dedup: RwLock::new(dedup),
      dedup_texts: RwLock::new(HashMap::new()),
      contradictions: RwLock::new(contradictions),
      foreshadowing: RwLock::new(foreshadowing),
      persistent_context: RwLock::new(persistent_context),
      consistency: RwLock::new(consistency),
      retention: RwLock::new(retention),
      memory_entities: RwLock::new(HashMap::new()),
      turn_seq: RwLock::new(HashMap::new()),
      embedder,
      chat,
      tokenizer: Arc::new(RuleTokenizer),
      tasks: TaskManager::new(),
    })
  }

  #[must_use]
  pub fn tasks(&self) -> &TaskManager {
    &self.tasks
  }

  pub async fn config(&self) -> Arc<Config> {
    self.config.snapshot().await
  }

  /// Reloads configuration from `<data_root>/config/api_keys.env` and the
  /// process environment.
  pub async fn reload_config(&self) {
    self.config.reload(self.data_root.clone()).await;
  }

  /// Next `turn_seq` for `(user_id, session_id)`, strictly increasing.
  /// Held behind its own lock since it's consulted on every ingest but
  /// never touches the store/graph locks.
  pub(crate) async fn next_turn_seq(&self, user_id: &str, session_id: &str) -> i64 {
    let mut map = self.turn_seq.write().await;
    let key = (user_id.to_owned(), session_id.to_owned());
    let seq = map.entry(key).or_insert(-1);
    *seq += 1;
    *seq
  }
}
