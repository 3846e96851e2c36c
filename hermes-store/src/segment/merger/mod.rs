//! Merging document stores

mod matching;
mod store;

pub use matching::MatchingReaders;
pub use store::{LiveDocs, MergeSource, MergeStats, StoreMerger};
