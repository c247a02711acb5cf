mod config;
mod error;
mod ids;
mod time;

pub use config::{
  Config, DedupConfig, EmbeddingConfig, EmbeddingMode, ForeshadowingConfig, GraphBackendKind,
  GraphConfig, LlmConfig, PersistentContextConfig, RecallMode, RetrievalConfig, StageConfig,
  StoreConfig,
};
pub use error::{ErrorKind, RecallError, Result};
pub use ids::Id;
pub use time::now_ms;
