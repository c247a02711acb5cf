mod bloom;
mod bm25;
mod entity_index;
mod inverted;
mod ngram;
mod persist;
mod temporal;
mod vector;

pub use bloom::BloomIndex;
pub use bm25::Bm25Index;
pub use entity_index::EntityIndex;
pub use inverted::InvertedIndex;
pub use ngram::{shingles, NgramIndex};
pub use temporal::TemporalIndex;
pub use vector::{FlatVectorIndex, HnswParams, HnswVectorIndex, VectorIndex};
