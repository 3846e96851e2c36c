//! Document store reader
//!
//! The block index is loaded into memory once. A lookup decodes the whole
//! chunk holding the document and copies out that document's bytes.

use std::path::Path;
use std::sync::Arc;

use log::debug;

use super::{
    STORE_VERSION, StoreConfig, StoreIndexReader, StoreMeta, data_codec, data_file, index_file,
    read_ints,
};
use crate::DocId;
use crate::compression::{CompressionMode, Decompressor};
use crate::directories::io::{FOOTER_LEN, check_footer, check_header};
use crate::directories::{DataInput, Directory, IndexInput, OwnedBytes};
use crate::dsl::{Document, deserialize_document};
use crate::error::{Error, Result};

/// Serialized form of one stored document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub num_stored_fields: u32,
}

/// Random-access reader over a finished store
///
/// Cloning is cheap: the data and index are shared, while the clone gets
/// its own decompressor and scratch buffers.
pub struct StoreReader {
    /// Data file without its footer
    data: OwnedBytes,
    index: Arc<StoreIndexReader>,
    mode: CompressionMode,
    chunk_size: u32,
    num_docs: DocId,
    decompressor: Decompressor,
    num_stored_fields: Vec<u32>,
    lengths: Vec<u32>,
}

impl StoreReader {
    /// Validate both files and load the block index.
    ///
    /// `config.compression` must match the mode named in the data header.
    pub fn open(data: OwnedBytes, index: OwnedBytes, config: &StoreConfig) -> Result<Self> {
        check_footer(&data)?;
        let data = data.slice(0..data.len() - FOOTER_LEN);
        let mode = config.compression;

        let mut input = IndexInput::new(data.clone());
        check_header(&mut input, &data_codec(mode), STORE_VERSION, STORE_VERSION)?;
        let chunk_size = input.read_vint()?;
        let header_end = input.file_pointer();

        let index = StoreIndexReader::open(index)?;
        if index.max_pointer() < header_end {
            return Err(Error::corruption(format!(
                "max pointer {} inside data header",
                index.max_pointer()
            )));
        }
        input.seek(index.max_pointer())?;
        let num_docs = input.read_vint()?;
        let num_chunks = input.read_vlong()?;
        if input.file_pointer() != input.len() {
            return Err(Error::corruption("trailing bytes after store trailer"));
        }
        if num_chunks != index.num_chunks() {
            return Err(Error::corruption(format!(
                "data file has {} chunks, index has {}",
                num_chunks,
                index.num_chunks()
            )));
        }
        if let Some(last) = index.chunks().last().filter(|last| last.doc_base >= num_docs) {
            return Err(Error::corruption(format!(
                "last chunk starts at doc {} but store has {} docs",
                last.doc_base, num_docs
            )));
        }

        debug!(
            "store opened: mode={} docs={} chunks={} blocks={}",
            mode,
            num_docs,
            num_chunks,
            index.num_blocks()
        );
        Ok(Self {
            data,
            index: Arc::new(index),
            mode,
            chunk_size,
            num_docs,
            decompressor: mode.new_decompressor(),
            num_stored_fields: Vec::new(),
            lengths: Vec::new(),
        })
    }

    /// Open `<segment>.store` with the configuration recorded in its
    /// metadata sidecar.
    pub fn open_in<D: Directory + ?Sized>(dir: &D, segment: &str) -> Result<Self> {
        let meta = StoreMeta::load(dir, segment)?;
        let data = dir.open_read(Path::new(&data_file(segment)))?;
        let index = dir.open_read(Path::new(&index_file(segment)))?;
        let reader = Self::open(data, index, &meta.config())?;
        if reader.num_docs != meta.num_docs {
            return Err(Error::corruption(format!(
                "store has {} docs, metadata says {}",
                reader.num_docs, meta.num_docs
            )));
        }
        Ok(reader)
    }

    pub fn num_docs(&self) -> DocId {
        self.num_docs
    }

    pub fn compression(&self) -> CompressionMode {
        self.mode
    }

    /// Chunk size the store was written with
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    pub fn index(&self) -> &StoreIndexReader {
        &self.index
    }

    pub fn document(&mut self, doc: DocId) -> Result<Document> {
        let raw = self.raw_document(doc)?;
        deserialize_document(&raw.bytes, raw.num_stored_fields)
    }

    /// Serialized bytes of `doc`. Its whole chunk is decoded into the
    /// decompressor's scratch buffer.
    pub fn raw_document(&mut self, doc: DocId) -> Result<RawDocument> {
        if doc >= self.num_docs {
            return Err(Error::DocumentNotFound(doc));
        }
        let loc = self.index.locate(doc)?;
        let mut input = IndexInput::new(self.data.clone());
        input.seek(loc.start_pointer)?;

        let doc_base = input.read_vint()?;
        if doc_base != loc.doc_base {
            return Err(Error::corruption(format!(
                "chunk at {} has doc base {}, index says {}",
                loc.start_pointer, doc_base, loc.doc_base
            )));
        }
        let chunk_docs = input.read_vint()?;
        let index_in_chunk = (doc - doc_base) as usize;
        if index_in_chunk >= chunk_docs as usize {
            return Err(Error::corruption(format!(
                "doc {} not in chunk [{}, {})",
                doc,
                doc_base,
                doc_base as u64 + chunk_docs as u64
            )));
        }
        read_ints(&mut input, chunk_docs as usize, &mut self.num_stored_fields)?;
        read_ints(&mut input, chunk_docs as usize, &mut self.lengths)?;

        let offset = to_len(self.lengths[..index_in_chunk].iter().map(|&l| l as u64).sum())?;
        let total = to_len(self.lengths.iter().map(|&l| l as u64).sum())?;
        let length = self.lengths[index_in_chunk] as usize;

        let mut bytes = Vec::with_capacity(length);
        self.decompressor
            .decompress(&mut input, total, offset, length, &mut bytes)?;
        Ok(RawDocument {
            bytes,
            num_stored_fields: self.num_stored_fields[index_in_chunk],
        })
    }

    /// Sequential walk over every chunk, for merging
    pub fn chunk_iterator(&self) -> ChunkIterator {
        ChunkIterator {
            input: IndexInput::new(self.data.clone()),
            decompressor: self.mode.new_decompressor(),
            next_pointer: self.index.chunks().next().map(|loc| loc.start_pointer),
            max_pointer: self.index.max_pointer(),
            num_docs: self.num_docs,
            expected_doc_base: 0,
            doc_base: 0,
            chunk_docs: 0,
            num_stored_fields: Vec::new(),
            lengths: Vec::new(),
            body_start: 0,
            payload_start: 0,
            chunk_end: 0,
            decoded: Vec::new(),
        }
    }
}

impl Clone for StoreReader {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            index: Arc::clone(&self.index),
            mode: self.mode,
            chunk_size: self.chunk_size,
            num_docs: self.num_docs,
            decompressor: self.decompressor.clone(),
            num_stored_fields: Vec::new(),
            lengths: Vec::new(),
        }
    }
}

impl std::fmt::Debug for StoreReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreReader")
            .field("mode", &self.mode)
            .field("num_docs", &self.num_docs)
            .field("num_chunks", &self.index.num_chunks())
            .finish()
    }
}

fn to_len(n: u64) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::corruption(format!("chunk length {} overflows", n)))
}

/// Walks the chunks of a store in order.
///
/// Call [`advance`](Self::advance) to move to the next chunk; accessors
/// describe the current one.
pub struct ChunkIterator {
    input: IndexInput,
    decompressor: Decompressor,
    next_pointer: Option<u64>,
    max_pointer: u64,
    num_docs: DocId,
    expected_doc_base: DocId,
    doc_base: DocId,
    chunk_docs: u32,
    num_stored_fields: Vec<u32>,
    lengths: Vec<u32>,
    /// Offset just past the chunk's doc base
    body_start: u64,
    payload_start: u64,
    chunk_end: u64,
    decoded: Vec<u8>,
}

impl ChunkIterator {
    /// Move to the next chunk. Returns `false` once all chunks were seen.
    pub fn advance(&mut self) -> Result<bool> {
        let Some(pointer) = self.next_pointer else {
            return Ok(false);
        };
        if pointer == self.max_pointer {
            self.next_pointer = None;
            if self.expected_doc_base != self.num_docs {
                return Err(Error::corruption(format!(
                    "chunks hold {} docs, store has {}",
                    self.expected_doc_base, self.num_docs
                )));
            }
            return Ok(false);
        }
        if pointer > self.max_pointer {
            return Err(Error::corruption(format!(
                "chunk at {} past max pointer {}",
                pointer, self.max_pointer
            )));
        }

        self.input.seek(pointer)?;
        let doc_base = self.input.read_vint()?;
        if doc_base != self.expected_doc_base {
            return Err(Error::corruption(format!(
                "chunk at {} has doc base {}, expected {}",
                pointer, doc_base, self.expected_doc_base
            )));
        }
        self.body_start = self.input.file_pointer();
        let chunk_docs = self.input.read_vint()?;
        let next_doc_base = doc_base
            .checked_add(chunk_docs)
            .filter(|&next| chunk_docs > 0 && next <= self.num_docs)
            .ok_or_else(|| {
                Error::corruption(format!(
                    "chunk at {} has invalid doc count {}",
                    pointer, chunk_docs
                ))
            })?;
        read_ints(&mut self.input, chunk_docs as usize, &mut self.num_stored_fields)?;
        read_ints(&mut self.input, chunk_docs as usize, &mut self.lengths)?;
        self.payload_start = self.input.file_pointer();
        let compressed_len = self.input.read_vint()?;
        self.input.skip_bytes(compressed_len as u64)?;
        self.chunk_end = self.input.file_pointer();

        self.doc_base = doc_base;
        self.chunk_docs = chunk_docs;
        self.expected_doc_base = next_doc_base;
        self.next_pointer = Some(self.chunk_end);
        Ok(true)
    }

    pub fn doc_base(&self) -> DocId {
        self.doc_base
    }

    pub fn chunk_docs(&self) -> u32 {
        self.chunk_docs
    }

    pub fn num_stored_fields(&self) -> &[u32] {
        &self.num_stored_fields
    }

    pub fn lengths(&self) -> &[u32] {
        &self.lengths
    }

    /// Uncompressed size of the current chunk
    pub fn uncompressed_len(&self) -> u64 {
        self.lengths.iter().map(|&l| l as u64).sum()
    }

    /// Decompress the whole current chunk.
    pub fn decompress(&mut self) -> Result<&[u8]> {
        let total = to_len(self.uncompressed_len())?;
        self.input.seek(self.payload_start)?;
        self.decompressor
            .decompress(&mut self.input, total, 0, total, &mut self.decoded)?;
        Ok(&self.decoded)
    }

    /// The current chunk minus its doc base, as stored
    pub fn compressed_body(&self) -> Result<&[u8]> {
        self.input.bytes_range(self.body_start, self.chunk_end)
    }
}
