//! LZ4 block backend (`CompressionMode::Fast`)
//!
//! The uncompressed length is known from the chunk header, so the block
//! format is used without a size prefix.

use std::io;

pub(super) fn compress(data: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
    out.clear();
    out.resize(lz4_flex::block::get_maximum_output_size(data.len()), 0);
    let written = lz4_flex::block::compress_into(data, out).map_err(io::Error::other)?;
    out.truncate(written);
    Ok(())
}

pub(super) fn decompress(data: &[u8], original_length: usize, out: &mut Vec<u8>) -> io::Result<()> {
    out.clear();
    out.resize(original_length, 0);
    let written = lz4_flex::block::decompress_into(data, out).map_err(io::Error::other)?;
    out.truncate(written);
    Ok(())
}
