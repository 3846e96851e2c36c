//! Chunk accumulator: buffers serialized documents and flushes them as
//! compressed chunks.
//!
//! ```text
//! data file  := header vint(chunk_size) chunk* vint(num_docs) vlong(num_chunks) footer
//! chunk      := vint(doc_base) vint(chunk_docs)
//!               ints(num_stored_fields) ints(lengths) payload
//! ```

use std::io::Write;
use std::path::Path;

use log::debug;

use super::{
    STORE_VERSION, StoreIndexWriter, StoreMeta, data_codec, data_file, index_file, write_ints,
};
use crate::DocId;
use crate::compression::{CompressionMode, Compressor};
use crate::directories::io::write_header;
use crate::directories::{DataOutput, DirectoryWriter, IndexOutput, StreamingWriter};
use crate::dsl::{Document, serialize_document};
use crate::error::{Error, Result};

/// Configuration for a document store, fixed for the store's life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Codec for chunk payloads
    pub compression: CompressionMode,
    /// Flush once this many uncompressed bytes are buffered
    pub chunk_size: usize,
    /// Flush once this many documents are buffered
    pub max_docs_per_chunk: usize,
    /// Chunks per block index block
    pub block_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            compression: CompressionMode::Fast,
            chunk_size: 16 * 1024,
            max_docs_per_chunk: 128,
            block_size: 1024,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > u32::MAX as usize {
            return Err(Error::Config(format!(
                "chunk_size must be in 1..=u32::MAX, got {}",
                self.chunk_size
            )));
        }
        if self.max_docs_per_chunk == 0 {
            return Err(Error::Config("max_docs_per_chunk must be positive".into()));
        }
        if self.block_size == 0 {
            return Err(Error::Config("block_size must be positive".into()));
        }
        Ok(())
    }
}

/// Streams and metadata handed back by [`StoreWriter::finish`]
pub struct StoreFinish<W, I> {
    pub data: W,
    pub index: I,
    pub meta: StoreMeta,
}

impl StoreFinish<Box<dyn StreamingWriter>, Box<dyn StreamingWriter>> {
    /// Publish both files and the metadata sidecar.
    pub fn commit<D: DirectoryWriter + ?Sized>(self, dir: &D, segment: &str) -> Result<StoreMeta> {
        self.data.finish()?;
        self.index.finish()?;
        self.meta.save(dir, segment)?;
        Ok(self.meta)
    }
}

/// Single-owner document store writer
pub struct StoreWriter<W: Write, I: Write> {
    data: IndexOutput<W>,
    index: StoreIndexWriter<I>,
    config: StoreConfig,
    compressor: Compressor,
    /// Serialized documents of the pending chunk
    buffer: Vec<u8>,
    num_stored_fields: Vec<u32>,
    lengths: Vec<u32>,
    doc_base: DocId,
    num_chunks: u64,
    packed: Vec<u8>,
}

impl StoreWriter<Box<dyn StreamingWriter>, Box<dyn StreamingWriter>> {
    /// Open streaming writers for `<segment>.store` and `<segment>.storeidx`.
    pub fn create_in<D: DirectoryWriter + ?Sized>(
        dir: &D,
        segment: &str,
        config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        let data = dir.streaming_writer(Path::new(&data_file(segment)))?;
        let index = dir.streaming_writer(Path::new(&index_file(segment)))?;
        Self::new(data, index, config)
    }
}

impl<W: Write, I: Write> StoreWriter<W, I> {
    /// Write both file headers. The first chunk therefore starts past
    /// offset 0.
    pub fn new(data: W, index: I, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let mut data = IndexOutput::new(data);
        write_header(&mut data, &data_codec(config.compression), STORE_VERSION)?;
        data.write_vint(config.chunk_size as u32)?;
        let index = StoreIndexWriter::new(index, config.block_size)?;

        Ok(Self {
            data,
            index,
            config,
            compressor: config.compression.new_compressor(),
            buffer: Vec::with_capacity(config.chunk_size),
            num_stored_fields: Vec::new(),
            lengths: Vec::new(),
            doc_base: 0,
            num_chunks: 0,
            packed: Vec::new(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Documents added so far, buffered ones included
    pub fn num_docs(&self) -> DocId {
        self.doc_base + self.lengths.len() as DocId
    }

    pub fn num_buffered_docs(&self) -> usize {
        self.lengths.len()
    }

    pub fn num_chunks(&self) -> u64 {
        self.num_chunks
    }

    /// Serialize and buffer `doc`; returns its doc id.
    pub fn add_document(&mut self, doc: &Document) -> Result<DocId> {
        let start = self.buffer.len();
        let num_fields = match serialize_document(doc, &mut self.buffer) {
            Ok(n) => n,
            Err(e) => {
                self.buffer.truncate(start);
                return Err(e.into());
            }
        };
        self.finish_document(start, num_fields)
    }

    /// Buffer an already serialized document.
    pub fn add_raw_document(&mut self, bytes: &[u8], num_stored_fields: u32) -> Result<DocId> {
        let start = self.buffer.len();
        self.buffer.extend_from_slice(bytes);
        self.finish_document(start, num_stored_fields)
    }

    fn finish_document(&mut self, start: usize, num_fields: u32) -> Result<DocId> {
        let doc_id = self.num_docs();
        let length = self.buffer.len() - start;
        if doc_id == DocId::MAX || length > u32::MAX as usize {
            self.buffer.truncate(start);
            return Err(Error::Consistency(format!(
                "cannot add document {} of {} bytes",
                doc_id, length
            )));
        }
        self.num_stored_fields.push(num_fields);
        self.lengths.push(length as u32);
        if self.trigger_flush() {
            self.flush()?;
        }
        Ok(doc_id)
    }

    fn trigger_flush(&self) -> bool {
        self.buffer.len() >= self.config.chunk_size
            || self.lengths.len() >= self.config.max_docs_per_chunk
    }

    fn flush(&mut self) -> Result<()> {
        let chunk_docs = self.lengths.len() as u32;
        let start_pointer = self.data.file_pointer();
        self.index.write_index(chunk_docs, start_pointer)?;

        self.data.write_vint(self.doc_base)?;
        self.data.write_vint(chunk_docs)?;
        write_ints(&mut self.data, &self.num_stored_fields, &mut self.packed)?;
        write_ints(&mut self.data, &self.lengths, &mut self.packed)?;
        self.compressor.compress(&self.buffer, &mut self.data)?;

        debug!(
            "store chunk flushed: doc_base={} docs={} raw={} compressed={}",
            self.doc_base,
            chunk_docs,
            self.buffer.len(),
            self.data.file_pointer() - start_pointer
        );

        self.doc_base += chunk_docs;
        self.num_chunks += 1;
        self.buffer.clear();
        self.num_stored_fields.clear();
        self.lengths.clear();
        Ok(())
    }

    /// Append a chunk taken verbatim from another store.
    ///
    /// `body` is everything after the chunk's doc base: the doc count,
    /// both int runs and the payload. Only valid with nothing buffered and
    /// when both stores use the same compression mode.
    pub fn add_compressed_chunk(&mut self, chunk_docs: u32, body: &[u8]) -> Result<()> {
        if !self.lengths.is_empty() {
            return Err(Error::Internal(format!(
                "cannot copy a chunk with {} buffered docs",
                self.lengths.len()
            )));
        }
        if self.doc_base.checked_add(chunk_docs).is_none() {
            return Err(Error::Consistency("store is full".into()));
        }
        self.index
            .write_index(chunk_docs, self.data.file_pointer())?;
        self.data.write_vint(self.doc_base)?;
        self.data.write_bytes(body)?;
        self.doc_base += chunk_docs;
        self.num_chunks += 1;
        Ok(())
    }

    /// Flush pending documents, write the trailer and footer, and finish
    /// the block index.
    pub fn finish(mut self) -> Result<StoreFinish<W, I>> {
        if !self.lengths.is_empty() {
            self.flush()?;
        }
        let max_pointer = self.data.file_pointer();
        self.data.write_vint(self.doc_base)?;
        self.data.write_vlong(self.num_chunks)?;
        self.data.write_footer()?;
        let index = self.index.finish(self.doc_base, max_pointer)?;

        debug!(
            "store finished: mode={} docs={} chunks={} data_bytes={}",
            self.config.compression,
            self.doc_base,
            self.num_chunks,
            self.data.file_pointer()
        );
        let meta = StoreMeta {
            compression: self.config.compression,
            chunk_size: self.config.chunk_size,
            max_docs_per_chunk: self.config.max_docs_per_chunk,
            block_size: self.config.block_size,
            num_docs: self.doc_base,
            num_chunks: self.num_chunks,
        };
        Ok(StoreFinish {
            data: self.data.into_inner(),
            index,
            meta,
        })
    }
}
