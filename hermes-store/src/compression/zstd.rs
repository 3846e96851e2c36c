//! Zstd backend (`CompressionMode::FastDecompression`)
//!
//! High level: slow to compress, fast to decode. Contexts are created on
//! first use and reused across chunks.

use std::io;

pub(super) const LEVEL: i32 = 19;

pub(super) fn compress(
    ctx: &mut Option<zstd::bulk::Compressor<'static>>,
    data: &[u8],
    out: &mut Vec<u8>,
) -> io::Result<()> {
    let compressor = match ctx {
        Some(compressor) => compressor,
        None => ctx.insert(zstd::bulk::Compressor::new(LEVEL)?),
    };
    *out = compressor.compress(data)?;
    Ok(())
}

pub(super) fn decompress(
    ctx: &mut Option<zstd::bulk::Decompressor<'static>>,
    data: &[u8],
    original_length: usize,
    out: &mut Vec<u8>,
) -> io::Result<()> {
    let decompressor = match ctx {
        Some(decompressor) => decompressor,
        None => ctx.insert(zstd::bulk::Decompressor::new()?),
    };
    *out = decompressor.decompress(data, original_length)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_roundtrip() {
        let data = b"Hello, World! This is a test of compression.".repeat(100);
        let mut compressed = Vec::new();
        let mut ctx = None;
        compress(&mut ctx, &data, &mut compressed).unwrap();
        assert!(compressed.len() < data.len());
        assert!(ctx.is_some());

        let mut decoded = Vec::new();
        decompress(&mut None, &compressed, data.len(), &mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_zstd_capacity_too_small_fails() {
        let data = b"Test data for compression levels".repeat(100);
        let mut compressed = Vec::new();
        compress(&mut None, &data, &mut compressed).unwrap();

        let mut decoded = Vec::new();
        assert!(decompress(&mut None, &compressed, data.len() - 1, &mut decoded).is_err());
    }
}
