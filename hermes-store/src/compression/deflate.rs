//! Raw Deflate backend (`CompressionMode::HighCompression`)
//!
//! No zlib header or trailer: the store frames and checksums payloads
//! itself.

use std::io;

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

pub(super) const LEVEL: u32 = 3;

pub(super) fn new_encoder() -> Compress {
    Compress::new(Compression::new(LEVEL), false)
}

pub(super) fn new_decoder() -> Decompress {
    Decompress::new(false)
}

pub(super) fn compress(encoder: &mut Compress, data: &[u8], out: &mut Vec<u8>) -> io::Result<()> {
    encoder.reset();
    out.clear();
    out.reserve(data.len() / 2 + 64);
    loop {
        let consumed = encoder.total_in() as usize;
        match encoder
            .compress_vec(&data[consumed..], out, FlushCompress::Finish)
            .map_err(io::Error::other)?
        {
            Status::StreamEnd => return Ok(()),
            Status::Ok | Status::BufError => {
                if out.len() == out.capacity() {
                    out.reserve(out.capacity());
                }
            }
        }
    }
}

pub(super) fn decompress(
    decoder: &mut Decompress,
    data: &[u8],
    original_length: usize,
    out: &mut Vec<u8>,
) -> io::Result<()> {
    decoder.reset(false);
    out.clear();
    // One spare byte so an oversized stream shows up as an unfinished one
    out.reserve_exact(original_length + 1);
    let status = decoder
        .decompress_vec(data, out, FlushDecompress::Finish)
        .map_err(io::Error::other)?;
    if status != Status::StreamEnd {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "deflate stream did not end after {} bytes (expected {})",
                out.len(),
                original_length
            ),
        ));
    }
    Ok(())
}
