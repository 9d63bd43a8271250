//! Analysis modules.
//!
//! Noise-aware comparison, trend tagging and ranking of the scanned
//! measurements.

pub mod aggregator;
pub mod comparator;
pub mod tagger;

pub use aggregator::{rank, RankFilter, RankSummary};
pub use comparator::NoiseThreshold;
pub use tagger::{tag, TAGGED_COMPARISONS};
