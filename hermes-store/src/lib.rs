//! Hermes Store - compressed, chunked document storage
//!
//! This library provides:
//! - Stored-field documents serialized per field and buffered into chunks
//! - Three chunk codecs: LZ4 (fast), raw Deflate (high compression) and
//!   Zstd (fast decompression)
//! - A block index of chunk doc bases and start pointers, packed as
//!   zigzag deltas from per-block averages
//! - Random-access reads that decode one chunk per lookup
//! - Merges that copy compressed chunks verbatim when field numbering matches
//! - Directory abstraction over memory and memory-mapped files

pub mod compression;
pub mod directories;
pub mod dsl;
pub mod error;
pub mod segment;
pub mod structures;

/// Document id within one store
pub type DocId = u32;

// Re-exports from dsl
pub use dsl::{Document, Field, FieldInfo, FieldInfos, FieldValue};

// Re-exports from compression
pub use compression::{CompressionMode, Compressor, Decompressor};

// Re-exports from directories
#[cfg(feature = "native")]
pub use directories::MmapDirectory;
pub use directories::{Directory, DirectoryWriter, OwnedBytes, RamDirectory, StreamingWriter};

// Re-exports from segment
pub use segment::{
    LiveDocs, MatchingReaders, MergeSource, MergeStats, StoreConfig, StoreMerger, StoreMeta,
    StoreReader, StoreWriter,
};

pub use error::{Error, Result};
