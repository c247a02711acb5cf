mod consistency;
mod foreshadowing;
mod persistent_context;

pub use consistency::{CompiledRule, ConsistencyCheck, ConsistencyChecker, Severity, Violation};
pub use foreshadowing::{AnalysisReport, ForeshadowingTracker};
pub use persistent_context::PersistentContextTracker;
