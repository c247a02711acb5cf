mod contradiction;
mod core_settings;
mod entity;
mod foreshadowing;
mod memory;
mod persistent_context;
mod relation;

pub use contradiction::{Contradiction, ContradictionKind, ResolutionStrategy};
pub use core_settings::CoreSettings;
pub use entity::{Entity, EntityKey, EntityType, normalize_name};
pub use foreshadowing::{Foreshadowing, ForeshadowingState};
pub use memory::{BoundaryKind, Memory, MemoryBuilder, MemoryRole, Priority};
pub use persistent_context::{ContextType, PersistentContextItem};
pub use relation::{Fact, FactObject, FactStatus};
