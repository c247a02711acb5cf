mod dedup;
mod lsh;
mod minhash;

pub use dedup::{Decision, Deduplicator};
pub use minhash::{exact_jaccard, token_shingles, Signature};
