mod context;
mod fallback;
mod filter;
mod fsrs_rank;
mod funnel;
mod query;
mod rerank;
mod rrf;

pub use context::{build as build_context, reminder_candidates, BuiltContext, ContextSection};
pub use fallback::scan as fallback_scan;
pub use filter::{cross_encoder_rerank, llm_filter};
pub use fsrs_rank::RetentionTracker;
pub use funnel::{run as run_funnel, IndexSet};
pub use query::{CandidateSet, ScoredMemory, SearchQuery, SearchResult};
pub use rerank::rerank;
pub use rrf::fuse as rrf_fuse;
