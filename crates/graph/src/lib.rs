mod backend;
mod communities;
mod contradiction;
mod file_backend;

pub use backend::{CommunityAlgorithm, Direction, GraphBackend, TraversalHit};
pub use contradiction::{ContradictionManager, DetectionStrategy, Outcome};
pub use file_backend::FileGraphBackend;
