//! Compressed, chunked document store
//!
//! Documents are buffered by [`StoreWriter`] and flushed as compressed
//! chunks to the data file. Every chunk gets one entry in the block index
//! (`StoreIndexWriter`), which packs chunk doc bases and start pointers as
//! zigzag deltas from a per-block average so that a reader can locate any
//! document's chunk with two binary searches.
//!
//! Files of one store:
//!
//! ```text
//! <segment>.store      data file (chunks + trailer)
//! <segment>.storeidx   block index
//! <segment>.store.json StoreMeta sidecar
//! ```

mod index_reader;
mod index_writer;
mod meta;
mod reader;
mod writer;

pub use index_reader::{BlockStats, ChunkLocation, StoreIndexReader};
pub use index_writer::StoreIndexWriter;
pub use meta::StoreMeta;
pub use reader::{ChunkIterator, RawDocument, StoreReader};
pub use writer::{StoreConfig, StoreFinish, StoreWriter};

use std::io::Write;

use crate::compression::CompressionMode;
use crate::directories::{DataInput, DataOutput, IndexInput};
use crate::error::{Error, Result};
use crate::structures::{bitpack_read, bitpack_write, bits_required, packed_len};

pub(crate) const DATA_CODEC_PREFIX: &str = "HermesStoreData";
pub(crate) const INDEX_CODEC: &str = "HermesStoreIndex";
pub(crate) const STORE_VERSION: u32 = 1;
/// Version of the packed-integer layout inside the block index
pub(crate) const PACKED_VERSION: u32 = 1;

pub(crate) fn data_codec(mode: CompressionMode) -> String {
    format!("{}_{}", DATA_CODEC_PREFIX, mode.name())
}

pub(crate) fn data_file(segment: &str) -> String {
    format!("{}.store", segment)
}

pub(crate) fn index_file(segment: &str) -> String {
    format!("{}.storeidx", segment)
}

/// Write per-document ints of a chunk header.
///
/// One value is a plain vint; a run of equal values is `vint 0` followed by
/// the value; anything else is a bit width and the packed run.
pub(crate) fn write_ints<W: Write + ?Sized>(
    out: &mut W,
    values: &[u32],
    packed: &mut Vec<u8>,
) -> Result<()> {
    match values {
        [] => {}
        [value] => out.write_vint(*value)?,
        [first, rest @ ..] if rest.iter().all(|v| v == first) => {
            out.write_vint(0)?;
            out.write_vint(*first)?;
        }
        _ => {
            let wide: Vec<u64> = values.iter().map(|&v| v as u64).collect();
            let bits = bits_required(wide.iter().fold(0, |acc, &v| acc | v));
            out.write_vint(bits as u32)?;
            packed.clear();
            bitpack_write(&wide, bits, packed);
            out.write_bytes(packed)?;
        }
    }
    Ok(())
}

/// Counterpart of [`write_ints`]: replaces `out` with `n` values.
pub(crate) fn read_ints(input: &mut IndexInput, n: usize, out: &mut Vec<u32>) -> Result<()> {
    out.clear();
    match n {
        0 => {}
        1 => out.push(input.read_vint()?),
        _ => {
            let bits = input.read_vint()?;
            if bits == 0 {
                let value = input.read_vint()?;
                out.resize(n, value);
            } else if bits > 32 {
                return Err(Error::corruption(format!(
                    "chunk header bit width {} exceeds 32",
                    bits
                )));
            } else {
                let packed = input.read_slice(packed_len(n, bits as u8))?;
                out.extend((0..n).map(|i| bitpack_read(packed, bits as u8, i) as u32));
            }
        }
    }
    Ok(())
}
