//! Block index reader
//!
//! Keeps the packed runs of every block as zero-copy slices of the index
//! file and reconstructs doc bases and start pointers on demand:
//!
//! ```text
//! doc_base(i)      = block.doc_base + avg_chunk_docs * i + unzigzag(doc_deltas[i])
//! start_pointer(i) = block.first_start_pointer + avg_chunk_size * i + unzigzag(sp_deltas[i])
//! ```

use log::debug;

use super::{INDEX_CODEC, PACKED_VERSION, STORE_VERSION};
use crate::DocId;
use crate::directories::io::{FOOTER_LEN, check_footer, check_header};
use crate::directories::{DataInput, IndexInput, OwnedBytes};
use crate::error::{Error, Result};
use crate::structures::{bitpack_read, packed_len, zigzag_decode};

/// Where a chunk starts in the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLocation {
    /// First document of the chunk
    pub doc_base: DocId,
    /// Data file offset of the chunk header
    pub start_pointer: u64,
    block: usize,
    index: usize,
}

/// Per-block statistics, mostly for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStats {
    pub doc_base: DocId,
    pub num_chunks: usize,
    pub avg_chunk_docs: u32,
    pub bits_per_doc_base: u8,
    pub first_start_pointer: u64,
    pub avg_chunk_size: u64,
    pub bits_per_start_pointer: u8,
}

#[derive(Debug, Clone)]
struct Block {
    stats: BlockStats,
    doc_deltas: OwnedBytes,
    start_pointer_deltas: OwnedBytes,
}

impl Block {
    /// Doc base of chunk `i`, relative to the block
    fn relative_doc_base(&self, i: usize) -> i64 {
        let s = &self.stats;
        (s.avg_chunk_docs as i64)
            .wrapping_mul(i as i64)
            .wrapping_add(zigzag_decode(bitpack_read(
                &self.doc_deltas,
                s.bits_per_doc_base,
                i,
            )))
    }

    fn relative_start_pointer(&self, i: usize) -> i64 {
        let s = &self.stats;
        (s.avg_chunk_size as i64).wrapping_mul(i as i64).wrapping_add(zigzag_decode(
            bitpack_read(&self.start_pointer_deltas, s.bits_per_start_pointer, i),
        ))
    }

    fn location(&self, block: usize, index: usize) -> ChunkLocation {
        ChunkLocation {
            doc_base: (self.stats.doc_base as i64).wrapping_add(self.relative_doc_base(index))
                as DocId,
            start_pointer: (self.stats.first_start_pointer as i64)
                .wrapping_add(self.relative_start_pointer(index)) as u64,
            block,
            index,
        }
    }
}

/// In-memory view of a block index file
#[derive(Debug, Clone)]
pub struct StoreIndexReader {
    blocks: Vec<Block>,
    num_chunks: u64,
    max_pointer: u64,
}

impl StoreIndexReader {
    /// Validate the footer and header, then load every block.
    pub fn open(bytes: OwnedBytes) -> Result<Self> {
        check_footer(&bytes)?;
        let body = bytes.slice(0..bytes.len() - FOOTER_LEN);
        let mut input = IndexInput::new(body);
        check_header(&mut input, INDEX_CODEC, STORE_VERSION, STORE_VERSION)?;
        let packed_version = input.read_vint()?;
        if packed_version != PACKED_VERSION {
            return Err(Error::corruption(format!(
                "unsupported packed ints version {}",
                packed_version
            )));
        }

        let mut blocks: Vec<Block> = Vec::new();
        let mut num_chunks = 0u64;
        // Last chunk seen, to check ordering across blocks
        let mut last: Option<ChunkLocation> = None;
        loop {
            let block_chunks = input.read_vint()? as usize;
            if block_chunks == 0 {
                break;
            }
            let block = read_block(&mut input, block_chunks)?;
            let block_idx = blocks.len();
            for i in 0..block_chunks {
                let loc = block.location(block_idx, i);
                let relative = block.relative_doc_base(i);
                let in_order = match last {
                    None => loc.doc_base == 0 && loc.start_pointer > 0,
                    Some(prev) => {
                        loc.doc_base > prev.doc_base && loc.start_pointer > prev.start_pointer
                    }
                };
                if !in_order || (i == 0 && relative != 0) {
                    return Err(Error::corruption(format!(
                        "chunk {} of block {} out of order: doc_base={} start_pointer={}",
                        i, block_idx, loc.doc_base, loc.start_pointer
                    )));
                }
                last = Some(loc);
            }
            num_chunks += block_chunks as u64;
            blocks.push(block);
        }

        let max_pointer = input.read_vlong()?;
        if let Some(prev) = last.filter(|prev| max_pointer <= prev.start_pointer) {
            return Err(Error::corruption(format!(
                "max pointer {} before last chunk at {}",
                max_pointer, prev.start_pointer
            )));
        }
        if input.file_pointer() != input.len() {
            return Err(Error::corruption(format!(
                "{} trailing bytes in store index",
                input.len() - input.file_pointer()
            )));
        }

        debug!(
            "store index opened: blocks={} chunks={} max_pointer={}",
            blocks.len(),
            num_chunks,
            max_pointer
        );
        Ok(Self {
            blocks,
            num_chunks,
            max_pointer,
        })
    }

    /// Find the chunk holding `doc`.
    ///
    /// Any doc at or past the last chunk's doc base maps to the last chunk;
    /// callers bound `doc` by the store's document count.
    pub fn locate(&self, doc: DocId) -> Result<ChunkLocation> {
        // The first block starts at doc 0, so this is never zero when
        // there are blocks.
        let block_idx = self
            .blocks
            .partition_point(|b| b.stats.doc_base <= doc)
            .checked_sub(1)
            .ok_or(Error::DocumentNotFound(doc))?;
        let block = &self.blocks[block_idx];
        let relative = (doc - block.stats.doc_base) as i64;

        // Last chunk whose relative doc base is <= relative
        let (mut lo, mut hi) = (0usize, block.stats.num_chunks);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if block.relative_doc_base(mid) <= relative {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(block.location(block_idx, lo))
    }

    /// Start pointer of the chunk after `loc`, or `max_pointer` for the
    /// last chunk.
    pub fn chunk_end(&self, loc: &ChunkLocation) -> u64 {
        let block = &self.blocks[loc.block];
        if loc.index + 1 < block.stats.num_chunks {
            block.location(loc.block, loc.index + 1).start_pointer
        } else if let Some(next) = self.blocks.get(loc.block + 1) {
            next.location(loc.block + 1, 0).start_pointer
        } else {
            self.max_pointer
        }
    }

    /// Every chunk in doc order
    pub fn chunks(&self) -> impl Iterator<Item = ChunkLocation> + '_ {
        self.blocks.iter().enumerate().flat_map(|(block_idx, block)| {
            (0..block.stats.num_chunks).map(move |i| block.location(block_idx, i))
        })
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockStats> + '_ {
        self.blocks.iter().map(|block| block.stats)
    }

    pub fn num_chunks(&self) -> u64 {
        self.num_chunks
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Data file offset just past the last chunk
    pub fn max_pointer(&self) -> u64 {
        self.max_pointer
    }
}

fn read_block(input: &mut IndexInput, block_chunks: usize) -> Result<Block> {
    let doc_base = input.read_vint()?;
    let avg_chunk_docs = input.read_vint()?;
    let (bits_per_doc_base, doc_deltas) = read_packed(input, block_chunks)?;

    let first_start_pointer = input.read_vlong()?;
    let avg_chunk_size = input.read_vlong()?;
    let (bits_per_start_pointer, start_pointer_deltas) = read_packed(input, block_chunks)?;

    Ok(Block {
        stats: BlockStats {
            doc_base,
            num_chunks: block_chunks,
            avg_chunk_docs,
            bits_per_doc_base,
            first_start_pointer,
            avg_chunk_size,
            bits_per_start_pointer,
        },
        doc_deltas,
        start_pointer_deltas,
    })
}

fn read_packed(input: &mut IndexInput, count: usize) -> Result<(u8, OwnedBytes)> {
    let bits = input.read_vint()?;
    if bits == 0 || bits > 64 {
        return Err(Error::corruption(format!(
            "invalid packed bit width {}",
            bits
        )));
    }
    let len = packed_len(count, bits as u8);
    Ok((bits as u8, input.read_owned(len)?))
}
