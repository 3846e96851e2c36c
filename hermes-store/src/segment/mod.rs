pub mod merger;
pub mod store;

pub use merger::{LiveDocs, MatchingReaders, MergeSource, MergeStats, StoreMerger};
pub use store::{
    BlockStats, ChunkIterator, ChunkLocation, RawDocument, StoreConfig, StoreFinish,
    StoreIndexReader, StoreIndexWriter, StoreMeta, StoreReader, StoreWriter,
};

#[cfg(test)]
mod tests;
