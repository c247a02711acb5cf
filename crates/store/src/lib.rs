mod l1;
mod l2;
mod store;
mod volume;

pub use l1::ConsolidatedStore;
pub use l2::WorkingSet;
pub use store::{DeleteMode, Store};
pub use volume::{Address, VolumeManager};
