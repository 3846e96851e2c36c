//! Block index writer
//!
//! Chunks are indexed in blocks of at most `block_size` entries. Per block
//! only the distance of each chunk's doc base and start pointer from a
//! linear estimate (`avg * i`) is stored, zigzag-encoded and bit-packed at
//! the width of the largest delta. One chunk far from the average only
//! widens its own block.
//!
//! ```text
//! index      := header vint(PACKED_VERSION) block* vint(0) vlong(max_pointer) footer
//! block      := vint(block_chunks)
//!               vint(doc_base) vint(avg_chunk_docs) vint(bits) packed[block_chunks]
//!               vlong(first_start_pointer) vlong(avg_chunk_size) vint(bits) packed[block_chunks]
//! ```
//!
//! Doc bases inside a block are relative to the block's doc base, start
//! pointers relative to its first start pointer.

use std::io::Write;

use log::{debug, trace};

use super::{INDEX_CODEC, PACKED_VERSION, STORE_VERSION};
use crate::DocId;
use crate::directories::DataOutput;
use crate::directories::IndexOutput;
use crate::directories::io::write_header;
use crate::error::{Error, Result};
use crate::structures::{bitpack_write, bits_needed_u64, bits_required, zigzag_encode};

/// Streams block index entries to `W`.
///
/// One `write_index` call per flushed chunk, then exactly one `finish`.
pub struct StoreIndexWriter<W: Write> {
    out: IndexOutput<W>,
    block_size: usize,
    total_docs: DocId,
    block_docs: DocId,
    first_start_pointer: u64,
    max_start_pointer: u64,
    last_start_pointer: Option<u64>,
    /// Doc count of every chunk in the pending block
    doc_counts: Vec<DocId>,
    /// Start pointer of every chunk in the pending block, minus the previous one
    start_pointer_deltas: Vec<u64>,
    num_blocks: usize,
    num_chunks: u64,
    values: Vec<u64>,
    packed: Vec<u8>,
}

impl<W: Write> StoreIndexWriter<W> {
    /// Write the index header and prepare an empty block.
    pub fn new(out: W, block_size: usize) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::Config("block_size must be positive".into()));
        }
        let mut out = IndexOutput::new(out);
        write_header(&mut out, INDEX_CODEC, STORE_VERSION)?;
        out.write_vint(PACKED_VERSION)?;
        Ok(Self {
            out,
            block_size,
            total_docs: 0,
            block_docs: 0,
            first_start_pointer: 0,
            max_start_pointer: 0,
            last_start_pointer: None,
            doc_counts: Vec::with_capacity(block_size.min(1024)),
            start_pointer_deltas: Vec::with_capacity(block_size.min(1024)),
            num_blocks: 0,
            num_chunks: 0,
            values: Vec::new(),
            packed: Vec::new(),
        })
    }

    /// Record a chunk of `num_docs` documents starting at `start_pointer`
    /// in the data file.
    pub fn write_index(&mut self, num_docs: DocId, start_pointer: u64) -> Result<()> {
        if num_docs == 0 {
            return Err(Error::Consistency("chunk without documents".into()));
        }
        match self.last_start_pointer {
            None if start_pointer == 0 => {
                return Err(Error::Consistency(
                    "first chunk must start after the data header".into(),
                ));
            }
            Some(last) if start_pointer <= last => {
                return Err(Error::Consistency(format!(
                    "start pointer {} does not advance past {}",
                    start_pointer, last
                )));
            }
            _ => {}
        }
        let total_docs = self.total_docs.checked_add(num_docs).ok_or_else(|| {
            Error::Consistency(format!(
                "doc count overflows: {} + {}",
                self.total_docs, num_docs
            ))
        })?;

        if self.doc_counts.len() == self.block_size {
            self.write_block()?;
        }

        if self.doc_counts.is_empty() {
            self.first_start_pointer = start_pointer;
            self.max_start_pointer = start_pointer;
        }
        trace!(
            "index chunk: docs={} start_pointer={} block_chunk={}",
            num_docs,
            start_pointer,
            self.doc_counts.len()
        );

        self.doc_counts.push(num_docs);
        self.start_pointer_deltas
            .push(start_pointer - self.max_start_pointer);
        self.block_docs += num_docs;
        self.total_docs = total_docs;
        self.max_start_pointer = start_pointer;
        self.last_start_pointer = Some(start_pointer);
        self.num_chunks += 1;
        Ok(())
    }

    /// Total documents indexed so far
    pub fn total_docs(&self) -> DocId {
        self.total_docs
    }

    pub fn num_chunks(&self) -> u64 {
        self.num_chunks
    }

    /// Blocks written so far (the pending block is not counted)
    pub fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    /// Flush the pending block, then write the end marker, `max_pointer`
    /// and the footer.
    ///
    /// `num_docs` must equal the documents indexed; otherwise nothing more
    /// is written.
    pub fn finish(mut self, num_docs: DocId, max_pointer: u64) -> Result<W> {
        if num_docs != self.total_docs {
            return Err(Error::Consistency(format!(
                "expected {} docs, but indexed {}",
                num_docs, self.total_docs
            )));
        }
        if let Some(last) = self.last_start_pointer.filter(|&last| max_pointer <= last) {
            return Err(Error::Consistency(format!(
                "max pointer {} does not advance past last chunk at {}",
                max_pointer, last
            )));
        }
        if !self.doc_counts.is_empty() {
            self.write_block()?;
        }
        self.out.write_vint(0)?;
        self.out.write_vlong(max_pointer)?;
        self.out.write_footer()?;
        debug!(
            "store index finished: docs={} chunks={} blocks={} max_pointer={}",
            self.total_docs, self.num_chunks, self.num_blocks, max_pointer
        );
        Ok(self.out.into_inner())
    }

    fn write_block(&mut self) -> Result<()> {
        let block_chunks = self.doc_counts.len();
        debug_assert!(block_chunks > 0);
        self.out.write_vint(block_chunks as u32)?;

        // Doc bases: the last chunk's size does not shift any doc base, so
        // it is left out of the average.
        let avg_chunk_docs = if block_chunks == 1 {
            0
        } else {
            let last = self.doc_counts[block_chunks - 1];
            ((self.block_docs - last) as f32 / (block_chunks - 1) as f32).round() as u32
        };
        self.out.write_vint(self.total_docs - self.block_docs)?;
        self.out.write_vint(avg_chunk_docs)?;

        self.values.clear();
        let mut doc_base = 0i64;
        for (i, &count) in self.doc_counts.iter().enumerate() {
            self.values
                .push(zigzag_encode(doc_base - avg_chunk_docs as i64 * i as i64));
            doc_base += count as i64;
        }
        let bits_per_doc_base = self.write_packed()?;

        // Start pointers
        let avg_chunk_size = if block_chunks == 1 {
            0
        } else {
            (self.max_start_pointer - self.first_start_pointer) / (block_chunks as u64 - 1)
        };
        self.out.write_vlong(self.first_start_pointer)?;
        self.out.write_vlong(avg_chunk_size)?;

        self.values.clear();
        let mut start_pointer = 0i64;
        for (i, &delta) in self.start_pointer_deltas.iter().enumerate() {
            start_pointer += delta as i64;
            self.values
                .push(zigzag_encode(start_pointer - (avg_chunk_size * i as u64) as i64));
        }
        let bits_per_start_pointer = self.write_packed()?;

        debug!(
            "store index block {}: chunks={} docs={} avg_chunk_docs={} avg_chunk_size={} bits={}/{}",
            self.num_blocks,
            block_chunks,
            self.block_docs,
            avg_chunk_docs,
            avg_chunk_size,
            bits_per_doc_base,
            bits_per_start_pointer
        );

        self.num_blocks += 1;
        self.block_docs = 0;
        self.doc_counts.clear();
        self.start_pointer_deltas.clear();
        Ok(())
    }

    /// Write `self.values` as `vint bits` + packed run; returns the width.
    fn write_packed(&mut self) -> Result<u8> {
        let bits = bits_required(self.values.iter().fold(0, |acc, &v| acc | v));
        if let Some(v) = self.values.iter().find(|&&v| bits_needed_u64(v) > bits) {
            return Err(Error::Internal(format!(
                "value {:#x} does not fit in {} bits",
                v, bits
            )));
        }
        self.out.write_vint(bits as u32)?;
        self.packed.clear();
        bitpack_write(&self.values, bits, &mut self.packed);
        self.out.write_bytes(&self.packed)?;
        Ok(bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directories::io::{FOOTER_LEN, check_footer, check_header};
    use crate::directories::{DataInput, IndexInput, OwnedBytes};
    use crate::structures::{bitpack_read, packed_len, zigzag_decode};

    fn body(bytes: Vec<u8>) -> IndexInput {
        check_footer(&bytes).unwrap();
        let len = bytes.len() - FOOTER_LEN;
        let mut input = IndexInput::new(OwnedBytes::new(bytes).slice(0..len));
        check_header(&mut input, INDEX_CODEC, STORE_VERSION, STORE_VERSION).unwrap();
        assert_eq!(input.read_vint().unwrap(), PACKED_VERSION);
        input
    }

    fn read_packed(input: &mut IndexInput, n: usize) -> (u8, Vec<i64>) {
        let bits = input.read_vint().unwrap() as u8;
        let packed = input.read_slice(packed_len(n, bits)).unwrap();
        let values = (0..n)
            .map(|i| zigzag_decode(bitpack_read(packed, bits, i)))
            .collect();
        (bits, values)
    }

    #[test]
    fn test_single_chunk_block() {
        let mut writer = StoreIndexWriter::new(Vec::new(), 16).unwrap();
        writer.write_index(7, 40).unwrap();
        let mut input = body(writer.finish(7, 90).unwrap());

        assert_eq!(input.read_vint().unwrap(), 1); // block_chunks
        assert_eq!(input.read_vint().unwrap(), 0); // doc base
        assert_eq!(input.read_vint().unwrap(), 0); // avg_chunk_docs
        assert_eq!(read_packed(&mut input, 1), (1, vec![0]));
        assert_eq!(input.read_vlong().unwrap(), 40);
        assert_eq!(input.read_vlong().unwrap(), 0); // avg_chunk_size
        assert_eq!(read_packed(&mut input, 1), (1, vec![0]));
        assert_eq!(input.read_vint().unwrap(), 0); // end marker
        assert_eq!(input.read_vlong().unwrap(), 90);
        assert!(input.read_byte().is_err());
    }

    #[test]
    fn test_average_excludes_last_chunk() {
        let mut writer = StoreIndexWriter::new(Vec::new(), 16).unwrap();
        // doc bases 0, 10, 20; the large last chunk must not move the average
        writer.write_index(10, 100).unwrap();
        writer.write_index(10, 200).unwrap();
        writer.write_index(500, 310).unwrap();
        let mut input = body(writer.finish(520, 1000).unwrap());

        assert_eq!(input.read_vint().unwrap(), 3);
        assert_eq!(input.read_vint().unwrap(), 0);
        assert_eq!(input.read_vint().unwrap(), 10);
        let (_, deltas) = read_packed(&mut input, 3);
        assert_eq!(deltas, vec![0, 0, 0]);

        assert_eq!(input.read_vlong().unwrap(), 100);
        assert_eq!(input.read_vlong().unwrap(), 105); // (310 - 100) / 2
        let (_, deltas) = read_packed(&mut input, 3);
        // relative pointers 0, 100, 210 against 0, 105, 210
        assert_eq!(deltas, vec![0, -5, 0]);
    }

    #[test]
    fn test_average_rounds_half_up() {
        let mut writer = StoreIndexWriter::new(Vec::new(), 16).unwrap();
        // (1 + 2) / 2 = 1.5 -> 2
        for (docs, sp) in [(1, 10), (2, 20), (9, 30)] {
            writer.write_index(docs, sp).unwrap();
        }
        let mut input = body(writer.finish(12, 40).unwrap());
        input.read_vint().unwrap();
        input.read_vint().unwrap();
        assert_eq!(input.read_vint().unwrap(), 2);
        let (_, deltas) = read_packed(&mut input, 3);
        // doc bases 0, 1, 3 against 0, 2, 4
        assert_eq!(deltas, vec![0, -1, -1]);
    }

    #[test]
    fn test_blocks_split_at_block_size() {
        let mut writer = StoreIndexWriter::new(Vec::new(), 4).unwrap();
        for i in 0..10u64 {
            writer.write_index(3, 10 + i * 50).unwrap();
        }
        assert_eq!(writer.num_blocks(), 2);
        assert_eq!(writer.num_chunks(), 10);
        let mut input = body(writer.finish(30, 600).unwrap());

        let mut doc_bases = Vec::new();
        loop {
            let chunks = input.read_vint().unwrap() as usize;
            if chunks == 0 {
                break;
            }
            doc_bases.push((input.read_vint().unwrap(), chunks));
            input.read_vint().unwrap();
            read_packed(&mut input, chunks);
            input.read_vlong().unwrap();
            input.read_vlong().unwrap();
            read_packed(&mut input, chunks);
        }
        assert_eq!(doc_bases, vec![(0, 4), (12, 4), (24, 2)]);
        assert_eq!(input.read_vlong().unwrap(), 600);
    }

    #[test]
    fn test_finish_doc_count_mismatch() {
        let mut writer = StoreIndexWriter::new(Vec::new(), 8).unwrap();
        writer.write_index(5, 10).unwrap();
        writer.write_index(5, 20).unwrap();
        assert!(matches!(
            writer.finish(11, 30),
            Err(Error::Consistency(_))
        ));
    }

    #[test]
    fn test_start_pointer_preconditions() {
        let mut writer = StoreIndexWriter::new(Vec::new(), 8).unwrap();
        assert!(matches!(
            writer.write_index(1, 0),
            Err(Error::Consistency(_))
        ));
        writer.write_index(1, 10).unwrap();
        assert!(matches!(
            writer.write_index(1, 10),
            Err(Error::Consistency(_))
        ));
        assert!(matches!(
            writer.write_index(0, 20),
            Err(Error::Consistency(_))
        ));
        writer.write_index(1, 11).unwrap();
        assert_eq!(writer.total_docs(), 2);
    }

    #[test]
    fn test_zero_block_size_rejected() {
        assert!(matches!(
            StoreIndexWriter::new(Vec::new(), 0),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_index() {
        let writer = StoreIndexWriter::new(Vec::new(), 8).unwrap();
        let mut input = body(writer.finish(0, 25).unwrap());
        assert_eq!(input.read_vint().unwrap(), 0);
        assert_eq!(input.read_vlong().unwrap(), 25);
    }
}
