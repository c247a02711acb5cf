use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `RECALL_MODE` selects the default bundle of sub-switches. Any sub-switch
/// may still be overridden explicitly — explicit values always win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecallMode {
  Roleplay,
  General,
  KnowledgeBase,
}

impl RecallMode {
  fn parse(s: &str) -> Option<Self> {
    match s {
      "roleplay" => Some(Self::Roleplay),
      "general" => Some(Self::General),
      "knowledge_base" => Some(Self::KnowledgeBase),
      _ => None,
    }
  }

  /// Mode-derived default for `FORESHADOWING_ENABLED` et al., before any
  /// explicit override is applied.
  const fn default_foreshadowing(self) -> bool {
    matches!(self, Self::Roleplay)
  }

  const fn default_character_dimension(self) -> bool {
    matches!(self, Self::Roleplay)
  }

  const fn default_rp_consistency(self) -> bool {
    matches!(self, Self::Roleplay)
  }
}

/// `TEMPORAL_GRAPH_BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackendKind {
  File,
  Embedded,
}

/// `RECALL_EMBEDDING_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
  Auto,
  Lite,
  Local,
  Cloud,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
  pub enabled: bool,
  pub top_k: usize,
}

impl StageConfig {
  const fn new(enabled: bool, top_k: usize) -> Self {
        Self { enabled, top_k }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
  pub l1_bloom: StageConfig,
  pub l2_temporal: StageConfig,
  pub l3_inverted: StageConfig,
  pub l4_entity: StageConfig,
  pub l5_graph: StageConfig,
  pub l6_ngram: StageConfig,
  pub l7_vector_coarse: StageConfig,
  pub l8_vector_fine: StageConfig,
  pub l9_rerank: StageConfig,
  pub l10_cross_encoder: StageConfig,
  pub l11_llm_filter: StageConfig,
  pub fallback_enabled: bool,
  pub fallback_parallel: bool,
  pub fallback_workers: usize,
  pub fallback_top_k: usize,
  pub rrf_k: f64,
  pub weight_vector: f64,
  pub weight_keyword: f64,
  pub weight_entity: f64,
  pub weight_recency: f64,
  pub final_top_k: usize,
  pub hnsw_m: usize,
  pub hnsw_ef_construction: usize,
  pub hnsw_ef_search: usize,
}

impl Default for RetrievalConfig {
  fn default() -> Self {
    Self {
      l1_bloom: StageConfig::new(true, 0),
      l2_temporal: StageConfig::new(true, 500),
      l3_inverted: StageConfig::new(true, 100),
      l4_entity: StageConfig::new(true, 50),
      l5_graph: StageConfig::new(true, 100),
      l6_ngram: StageConfig::new(true, 30),
      l7_vector_coarse: StageConfig::new(true, 200),
      l8_vector_fine: StageConfig::new(true, 0),
      l9_rerank: StageConfig::new(true, 100),
      l10_cross_encoder: StageConfig::new(false, 50),
      l11_llm_filter: StageConfig::new(false, 20),
      fallback_enabled: true,
      fallback_parallel: true,
      fallback_workers: 4,
      fallback_top_k: 50,
      rrf_k: 60.0,
      weight_vector: 0.5,
      weight_keyword: 0.3,
      weight_entity: 0.15,
      weight_recency: 0.05,
      final_top_k: 20,
      hnsw_m: 16,
      hnsw_ef_construction: 200,
      hnsw_ef_search: 64,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
  pub jaccard_hi: f64,
  pub semantic_hi: f64,
  pub semantic_lo: f64,
  pub llm_enabled: bool,
}

impl Default for DedupConfig {
  fn default() -> Self {
    Self {
      jaccard_hi: 0.85,
      semantic_hi: 0.90,
      semantic_lo: 0.80,
      llm_enabled: true,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeshadowingConfig {
  pub enabled: bool,
  pub trigger_interval: u32,
  pub max_context_turns: u32,
  pub auto_plant: bool,
  pub auto_resolve: bool,
  pub max_return: usize,
  pub dedup_cosine_threshold: f64,
}

impl Default for ForeshadowingConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      trigger_interval: 5,
      max_context_turns: 20,
      auto_plant: false,
      auto_resolve: false,
      max_return: 5,
      dedup_cosine_threshold: 0.85,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentContextConfig {
  pub max_per_type: usize,
  pub max_total: usize,
  pub decay_days: i64,
  pub min_confidence: f64,
  pub reminder_turns: u32,
  pub reminder_importance_threshold: f64,
}

impl Default for PersistentContextConfig {
  fn default() -> Self {
    Self {
      max_per_type: 5,
      max_total: 30,
      decay_days: 14,
      min_confidence: 0.2,
      reminder_turns: 30,
      reminder_importance_threshold: 0.7,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
  pub data_root: PathBuf,
  pub l2_capacity: usize,
  pub l1_shard_capacity: usize,
  pub volume_max_bytes: u64,
  pub batch_size: usize,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      data_root: PathBuf::from("./data"),
      l2_capacity: 200,
      l1_shard_capacity: 1000,
      volume_max_bytes: 50 * 1024 * 1024,
      batch_size: 50,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
  pub api_key: Option<String>,
  pub api_base: Option<String>,
  pub model: String,
  pub dimension: usize,
  pub rate_limit: u32,
  pub rate_window_secs: u64,
  pub mode: EmbeddingMode,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      api_base: None,
      model: "text-embedding-3-small".to_owned(),
      dimension: 1536,
      rate_limit: 60,
      rate_window_secs: 60,
      mode: EmbeddingMode::Auto,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
  pub api_key: Option<String>,
  pub api_base: Option<String>,
  pub model: String,
  pub timeout_secs: u64,
  pub budget_hourly_limit: Option<u32>,
  pub budget_daily_limit: Option<u32>,
}

impl Default for LlmConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      api_base: None,
      model: "gpt-4o-mini".to_owned(),
      timeout_secs: 30,
      budget_hourly_limit: None,
      budget_daily_limit: None,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
  pub backend: GraphBackendKind,
  pub decay_rate: f64,
  pub max_history: usize,
}

impl Default for GraphConfig {
  fn default() -> Self {
    Self {
      backend: GraphBackendKind::File,
      decay_rate: 0.01,
      max_history: 100,
    }
  }
}

/// Immutable per-request configuration snapshot. The engine holds this
/// behind `RwLock<Arc<Config>>`; a hot reload swaps the `Arc`, and
/// in-flight requests keep using the snapshot they cloned at entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
  pub mode: RecallMode,
  pub foreshadowing: ForeshadowingConfig,
  pub character_dimension_enabled: bool,
  pub rp_consistency_enabled: bool,
  pub rp_relation_types: Vec<String>,
  pub rp_context_types: Vec<String>,
  pub embedding: EmbeddingConfig,
  pub llm: LlmConfig,
  pub graph: GraphConfig,
  pub retrieval: RetrievalConfig,
  pub dedup: DedupConfig,
  pub persistent_context: PersistentContextConfig,
  pub store: StoreConfig,
  pub build_context_max_tokens: usize,
  pub include_recent: usize,
  /// Keys present in the environment that were not recognized; loader
  /// logs a warning for each and otherwise ignores them.
  pub warnings: Vec<String>,
}

/// The full set of recognised environment keys (flat groups collapsed),
/// used only to detect unknown keys. Kept as a function rather than a
/// `const` `HashSet` since `HashSet::from` isn't const.
fn known_keys() -> HashSet<&'static str> {
  [
    "RECALL_MODE",
    "FORESHADOWING_ENABLED",
    "CHARACTER_DIMENSION_ENABLED",
    "RP_CONSISTENCY_ENABLED",
    "RP_RELATION_TYPES",
    "RP_CONTEXT_TYPES",
    "EMBEDDING_API_KEY",
    "EMBEDDING_API_BASE",
    "EMBEDDING_MODEL",
    "EMBEDDING_DIMENSION",
    "EMBEDDING_RATE_LIMIT",
    "EMBEDDING_RATE_WINDOW",
    "RECALL_EMBEDDING_MODE",
    "LLM_API_KEY",
    "LLM_API_BASE",
    "LLM_MODEL",
    "LLM_TIMEOUT",
    "BUDGET_HOURLY_LIMIT",
    "BUDGET_DAILY_LIMIT",
    "TEMPORAL_GRAPH_BACKEND",
    "TEMPORAL_DECAY_RATE",
    "TEMPORAL_MAX_HISTORY",
    "TRIPLE_RECALL_RRF_K",
    "TRIPLE_RECALL_ENABLED",
    "FALLBACK_ENABLED",
    "FALLBACK_PARALLEL",
    "FALLBACK_WORKERS",
    "FINAL_TOP_K",
    "FINE_RANK_THRESHOLD",
    "DEDUP_JACCARD_THRESHOLD",
    "DEDUP_SEMANTIC_HI_THRESHOLD",
    "DEDUP_SEMANTIC_LO_THRESHOLD",
    "DEDUP_LLM_ENABLED",
    "FORESHADOWING_TRIGGER_INTERVAL",
    "FORESHADOWING_MAX_CONTEXT_TURNS",
    "FORESHADOWING_AUTO_PLANT",
    "FORESHADOWING_AUTO_RESOLVE",
    "FORESHADOWING_MAX_RETURN",
    "PERSISTENT_CONTEXT_DECAY_DAYS",
    "PERSISTENT_CONTEXT_MIN_CONFIDENCE",
    "REMINDER_TURNS",
    "DATA_ROOT",
    "L2_CAPACITY",
    "L1_SHARD_CAPACITY",
    "VOLUME_MAX_BYTES",
    "BATCH_SIZE",
    "BUILD_CONTEXT_MAX_TOKENS",
    "INCLUDE_RECENT",
    "HNSW_M",
    "HNSW_EF_CONSTRUCTION",
    "HNSW_EF_SEARCH",
  ]
  .into_iter()
  .collect()
}

fn env_bool(key: &str, default: bool) -> bool {
  env::var(key)
    .ok()
    .and_then(|v| match v.to_lowercase().as_str() {
      "true" | "1" | "yes" => Some(true),
      "false" | "0" | "no" => Some(false),
      _ => None,
    })
    .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
  env::var(key)
    .ok()
    .and_then(|v| v.parse().ok())
    .unwrap_or(default)
}

fn env_string(key: &str) -> Option<String> {
  env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
  env::var(key).ok().map_or_else(
    || default.iter().map(|s| (*s).to_owned()).collect(),
    |v| v.split(',').map(|s| s.trim().to_owned()).collect(),
  )
}

impl Config {
  /// Loads `config/api_keys.env` (if present) into the process environment
  /// via `dotenvy`, then resolves the full configuration surface. Unknown
  /// keys found in the env file are recorded in `warnings`, not rejected.
  /// Invalid enum values fall back to the mode default with a warning.
  pub fn load(data_root: impl Into<PathBuf>) -> Self {
    let data_root = data_root.into();
    let env_file = data_root.join("config").join("api_keys.env");
    let mut warnings = Vec::new();

    if env_file.exists() {
      if let Ok(iter) = dotenvy::from_path_iter(&env_file) {
        let known = known_keys();
        for item in iter.flatten() {
          let (key, _) = item;
          if !known.contains(key.as_str()) {
            warnings.push(format!("unknown config key ignored: {key}"));
          }
        }
      }
      let _ = dotenvy::from_path(&env_file);
    }

    let mode = env::var("RECALL_MODE")
      .ok()
      .and_then(|v| RecallMode::parse(&v))
      .unwrap_or_else(|| {
        if env::var("RECALL_MODE").is_ok() {
          warnings.push("invalid RECALL_MODE value, falling back to `general`".to_owned());
        }
        RecallMode::General
      });

    let foreshadowing_enabled =
      env::var("FORESHADOWING_ENABLED").ok().and_then(|v| match v.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
      }).unwrap_or_else(|| mode.default_foreshadowing());

    let mut store = StoreConfig::default();
    store.data_root = data_root.clone();
    store.l2_capacity = env_parse("L2_CAPACITY", store.l2_capacity);
    store.l1_shard_capacity = env_parse("L1_SHARD_CAPACITY", store.l1_shard_capacity);
    store.volume_max_bytes = env_parse("VOLUME_MAX_BYTES", store.volume_max_bytes);
    store.batch_size = env_parse("BATCH_SIZE", store.batch_size);

    let mut retrieval = RetrievalConfig::default();
    retrieval.fallback_enabled = env_bool("FALLBACK_ENABLED", retrieval.fallback_enabled);
    retrieval.fallback_parallel = env_bool("FALLBACK_PARALLEL", retrieval.fallback_parallel);
    retrieval.fallback_workers = env_parse("FALLBACK_WORKERS", retrieval.fallback_workers);
    retrieval.rrf_k = env_parse("TRIPLE_RECALL_RRF_K", retrieval.rrf_k);
    retrieval.final_top_k = env_parse("FINAL_TOP_K", retrieval.final_top_k);
    retrieval.l9_rerank.top_k = env_parse("FINE_RANK_THRESHOLD", retrieval.l9_rerank.top_k);
    retrieval.hnsw_m = env_parse("HNSW_M", retrieval.hnsw_m);
    retrieval.hnsw_ef_construction =
      env_parse("HNSW_EF_CONSTRUCTION", retrieval.hnsw_ef_construction);
    retrieval.hnsw_ef_search = env_parse("HNSW_EF_SEARCH", retrieval.hnsw_ef_search);

    let mut dedup = DedupConfig::default();
    dedup.jaccard_hi = env_parse("DEDUP_JACCARD_THRESHOLD", dedup.jaccard_hi);
    dedup.semantic_hi = env_parse("DEDUP_SEMANTIC_HI_THRESHOLD", dedup.semantic_hi);
    dedup.semantic_lo = env_parse("DEDUP_SEMANTIC_LO_THRESHOLD", dedup.semantic_lo);
    dedup.llm_enabled = env_bool("DEDUP_LLM_ENABLED", dedup.llm_enabled);

    let mut foreshadowing = ForeshadowingConfig {
      enabled: foreshadowing_enabled,
      ..ForeshadowingConfig::default()
    };
    foreshadowing.trigger_interval =
      env_parse("FORESHADOWING_TRIGGER_INTERVAL", foreshadowing.trigger_interval);
    foreshadowing.max_context_turns =
      env_parse("FORESHADOWING_MAX_CONTEXT_TURNS", foreshadowing.max_context_turns);
    foreshadowing.auto_plant = env_bool("FORESHADOWING_AUTO_PLANT", foreshadowing.auto_plant);
    foreshadowing.auto_resolve = env_bool("FORESHADOWING_AUTO_RESOLVE", foreshadowing.auto_resolve);
    foreshadowing.max_return = env_parse("FORESHADOWING_MAX_RETURN", foreshadowing.max_return);

    let mut persistent_context = PersistentContextConfig::default();
    persistent_context.decay_days =
      env_parse("PERSISTENT_CONTEXT_DECAY_DAYS", persistent_context.decay_days);
    persistent_context.min_confidence =
      env_parse("PERSISTENT_CONTEXT_MIN_CONFIDENCE", persistent_context.min_confidence);
    persistent_context.reminder_turns = env_parse("REMINDER_TURNS", persistent_context.reminder_turns);

    let mut embedding = EmbeddingConfig::default();
    embedding.api_key = env_string("EMBEDDING_API_KEY");
    embedding.api_base = env_string("EMBEDDING_API_BASE");
    embedding.model = env::var("EMBEDDING_MODEL").unwrap_or(embedding.model);
    embedding.dimension = env_parse("EMBEDDING_DIMENSION", embedding.dimension);
    embedding.rate_limit = env_parse("EMBEDDING_RATE_LIMIT", embedding.rate_limit);
    embedding.rate_window_secs = env_parse("EMBEDDING_RATE_WINDOW", embedding.rate_window_secs);

    let mut llm = LlmConfig::default();
    llm.api_key = env_string("LLM_API_KEY");
    llm.api_base = env_string("LLM_API_BASE");
    llm.model = env::var("LLM_MODEL").unwrap_or(llm.model);
    llm.timeout_secs = env_parse("LLM_TIMEOUT", llm.timeout_secs);
    llm.budget_hourly_limit = env::var("BUDGET_HOURLY_LIMIT").ok().and_then(|v| v.parse().ok());
    llm.budget_daily_limit = env::var("BUDGET_DAILY_LIMIT").ok().and_then(|v| v.parse().ok());

    let mut graph = GraphConfig::default();
    graph.decay_rate = env_parse("TEMPORAL_DECAY_RATE", graph.decay_rate);
    graph.max_history = env_parse("TEMPORAL_MAX_HISTORY", graph.max_history);

    Self {
      mode,
      character_dimension_enabled: env_bool(
        "CHARACTER_DIMENSION_ENABLED",
        mode.default_character_dimension(),
      ),
      rp_consistency_enabled: env_bool("RP_CONSISTENCY_ENABLED", mode.default_rp_consistency()),
      rp_relation_types: env_list(
        "RP_RELATION_TYPES",
        &["friend_of", "family_of", "lives_in", "works_at"],
      ),
      rp_context_types: env_list(
        "RP_CONTEXT_TYPES",
        &["user-identity", "user-goal", "user-preference"],
      ),
      foreshadowing,
      embedding,
      llm,
      graph,
      retrieval,
      dedup,
      persistent_context,
      store,
      build_context_max_tokens: env_parse("BUILD_CONTEXT_MAX_TOKENS", 4096usize),
      include_recent: env_parse("INCLUDE_RECENT", 10usize),
      warnings,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn override_precedence_i8() {
    // SAFETY: tests run single-threaded within this module via serial env mutation.
    unsafe {
      env::set_var("RECALL_MODE", "general");
      env::set_var("FORESHADOWING_ENABLED", "true");
    }
    let cfg = Config::load(std::env::temp_dir().join("recall-cfg-test-i8"));
    assert_eq!(cfg.mode, RecallMode::General);
    assert!(cfg.foreshadowing.enabled);
    unsafe {
      env::remove_var("RECALL_MODE");
      env::remove_var("FORESHADOWING_ENABLED");
    }
  }

  #[test]
  fn mode_default_without_override() {
    unsafe {
      env::set_var("RECALL_MODE", "roleplay");
      env::remove_var("FORESHADOWING_ENABLED");
    }
    let cfg = Config::load(std::env::temp_dir().join("recall-cfg-test-mode"));
    assert!(cfg.foreshadowing.enabled);
    unsafe {
      env::remove_var("RECALL_MODE");
    }
  }
}
