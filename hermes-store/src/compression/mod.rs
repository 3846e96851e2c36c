//! Chunk compression
//!
//! A store is written with one [`CompressionMode`] for its whole life.
//! Each mode hands out a [`Compressor`] for the writer and a
//! [`Decompressor`] for readers; both own their scratch buffers and codec
//! state so they are reused across chunks.
//!
//! Payload framing is shared by every mode:
//!
//! ```text
//! payload := vint compressed_len, compressed_len bytes
//! ```
//!
//! An empty input is written as `vint 0` with no codec bytes.
//!
//! # Usage
//!
//! ```rust
//! use hermes_store::compression::CompressionMode;
//!
//! let data = b"Hello, World!".repeat(10);
//! let mut payload = Vec::new();
//! CompressionMode::Fast
//!     .new_compressor()
//!     .compress(&data, &mut payload)
//!     .unwrap();
//!
//! let mut out = Vec::new();
//! CompressionMode::Fast
//!     .new_decompressor()
//!     .decompress(&mut payload.as_slice(), data.len(), 7, 6, &mut out)
//!     .unwrap();
//! assert_eq!(out, b"World!");
//! ```

mod deflate;
mod lz4;
mod zstd;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::directories::{DataInput, DataOutput};
use crate::error::{Error, Result};

/// Trade-off between compression speed, ratio and decode speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompressionMode {
    /// LZ4: fast both ways, modest ratio
    #[default]
    Fast,
    /// Deflate level 3: better ratio, slower both ways
    HighCompression,
    /// Zstd level 19: slow to compress, fast to decompress
    FastDecompression,
}

impl CompressionMode {
    pub const ALL: [CompressionMode; 3] = [
        CompressionMode::Fast,
        CompressionMode::HighCompression,
        CompressionMode::FastDecompression,
    ];

    /// Name recorded in store headers and metadata
    pub fn name(self) -> &'static str {
        match self {
            CompressionMode::Fast => "FAST",
            CompressionMode::HighCompression => "HIGH_COMPRESSION",
            CompressionMode::FastDecompression => "FAST_DECOMPRESSION",
        }
    }

    pub fn new_compressor(self) -> Compressor {
        let backend = match self {
            CompressionMode::Fast => CompressBackend::Lz4,
            CompressionMode::HighCompression => CompressBackend::Deflate(deflate::new_encoder()),
            CompressionMode::FastDecompression => CompressBackend::Zstd(None),
        };
        Compressor {
            mode: self,
            backend,
            scratch: Vec::new(),
        }
    }

    pub fn new_decompressor(self) -> Decompressor {
        let backend = match self {
            CompressionMode::Fast => DecompressBackend::Lz4,
            CompressionMode::HighCompression => {
                DecompressBackend::Deflate(deflate::new_decoder())
            }
            CompressionMode::FastDecompression => DecompressBackend::Zstd(None),
        };
        Decompressor {
            mode: self,
            backend,
            compressed: Vec::new(),
            decoded: Vec::new(),
        }
    }
}

impl fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| Error::Config(format!("unknown compression mode: {:?}", s)))
    }
}

enum CompressBackend {
    Lz4,
    Deflate(flate2::Compress),
    Zstd(Option<::zstd::bulk::Compressor<'static>>),
}

/// Compresses whole chunks. Single owner, reused for every chunk.
pub struct Compressor {
    mode: CompressionMode,
    backend: CompressBackend,
    scratch: Vec<u8>,
}

impl Compressor {
    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    /// Compress `bytes` and append the framed payload to `out`.
    pub fn compress<O: DataOutput + ?Sized>(&mut self, bytes: &[u8], out: &mut O) -> Result<()> {
        if bytes.is_empty() {
            out.write_vint(0)?;
            return Ok(());
        }
        match &mut self.backend {
            CompressBackend::Lz4 => lz4::compress(bytes, &mut self.scratch)?,
            CompressBackend::Deflate(encoder) => {
                deflate::compress(encoder, bytes, &mut self.scratch)?
            }
            CompressBackend::Zstd(ctx) => zstd::compress(ctx, bytes, &mut self.scratch)?,
        }
        let len = u32::try_from(self.scratch.len()).map_err(|_| {
            Error::Internal(format!(
                "compressed chunk too large: {} bytes",
                self.scratch.len()
            ))
        })?;
        out.write_vint(len)?;
        out.write_bytes(&self.scratch)?;
        Ok(())
    }
}

impl fmt::Debug for Compressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compressor")
            .field("mode", &self.mode)
            .finish()
    }
}

enum DecompressBackend {
    Lz4,
    Deflate(flate2::Decompress),
    Zstd(Option<::zstd::bulk::Decompressor<'static>>),
}

/// Decompresses chunks, or a sub-range of one.
///
/// Cloning yields a decompressor with fresh buffers and codec state, so
/// each reader clone decodes independently.
pub struct Decompressor {
    mode: CompressionMode,
    backend: DecompressBackend,
    compressed: Vec<u8>,
    decoded: Vec<u8>,
}

impl Decompressor {
    pub fn mode(&self) -> CompressionMode {
        self.mode
    }

    /// Read one framed payload from `input` and write
    /// `original[offset..offset + length]` into `bytes`.
    ///
    /// The whole payload is always consumed from `input`.
    pub fn decompress<I: DataInput + ?Sized>(
        &mut self,
        input: &mut I,
        original_length: usize,
        offset: usize,
        length: usize,
        bytes: &mut Vec<u8>,
    ) -> Result<()> {
        let end = offset
            .checked_add(length)
            .filter(|&end| end <= original_length)
            .ok_or_else(|| {
                Error::corruption(format!(
                    "range {}+{} exceeds chunk length {}",
                    offset, length, original_length
                ))
            })?;

        let compressed_len = input.read_vint()? as usize;
        input.read_into_vec(compressed_len, &mut self.compressed)?;
        bytes.clear();

        if original_length == 0 {
            if compressed_len != 0 {
                return Err(Error::corruption(format!(
                    "{} compressed bytes for an empty chunk",
                    compressed_len
                )));
            }
            return Ok(());
        }

        let decoded = match &mut self.backend {
            DecompressBackend::Lz4 => {
                lz4::decompress(&self.compressed, original_length, &mut self.decoded)
            }
            DecompressBackend::Deflate(decoder) => deflate::decompress(
                decoder,
                &self.compressed,
                original_length,
                &mut self.decoded,
            ),
            DecompressBackend::Zstd(ctx) => {
                zstd::decompress(ctx, &self.compressed, original_length, &mut self.decoded)
            }
        };
        decoded.map_err(|e| Error::corruption(format!("{} decode failed: {}", self.mode, e)))?;

        if self.decoded.len() != original_length {
            return Err(Error::corruption(format!(
                "{} chunk decoded to {} bytes, expected {}",
                self.mode,
                self.decoded.len(),
                original_length
            )));
        }
        bytes.extend_from_slice(&self.decoded[offset..end]);
        Ok(())
    }
}

impl Clone for Decompressor {
    fn clone(&self) -> Self {
        self.mode.new_decompressor()
    }
}

impl fmt::Debug for Decompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decompressor")
            .field("mode", &self.mode)
            .finish()
    }
}
