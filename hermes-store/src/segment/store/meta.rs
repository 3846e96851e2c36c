//! Store metadata sidecar (`<segment>.store.json`)
//!
//! The data file names its compression mode in the header but the reader
//! has to be told which mode to expect; this file records it together with
//! the rest of the writer configuration and the final counts.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::StoreConfig;
use crate::compression::CompressionMode;
use crate::directories::{Directory, DirectoryWriter};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMeta {
    pub compression: CompressionMode,
    pub chunk_size: usize,
    pub max_docs_per_chunk: usize,
    pub block_size: usize,
    pub num_docs: u32,
    pub num_chunks: u64,
}

impl StoreMeta {
    pub(crate) fn file_name(segment: &str) -> PathBuf {
        PathBuf::from(format!("{}.store.json", segment))
    }

    /// Writer configuration this store was built with
    pub fn config(&self) -> StoreConfig {
        StoreConfig {
            compression: self.compression,
            chunk_size: self.chunk_size,
            max_docs_per_chunk: self.max_docs_per_chunk,
            block_size: self.block_size,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Internal(format!("store meta serialization: {}", e)))
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::corruption(format!("invalid store meta: {}", e)))
    }

    pub fn save<D: DirectoryWriter + ?Sized>(&self, dir: &D, segment: &str) -> Result<()> {
        dir.write(&Self::file_name(segment), &self.serialize()?)?;
        Ok(())
    }

    pub fn load<D: Directory + ?Sized>(dir: &D, segment: &str) -> Result<Self> {
        let bytes = dir.open_read(&Self::file_name(segment))?;
        Self::deserialize(&bytes)
    }
}
