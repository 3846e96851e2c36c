//! Sequential output and random-access input streams
//!
//! Both sides speak LEB128 varints (`vint` for u32, `vlong` for u64).
//! Every store file starts with a codec header and ends with a checksum
//! footer:
//!
//! ```text
//! header := u32 HEADER_MAGIC, vint len + codec name, u32 version
//! footer := u32 FOOTER_MAGIC, u32 algorithm (0 = crc32), u64 crc32
//! ```
//!
//! The footer checksum covers every byte that precedes the checksum field.

use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};

use super::OwnedBytes;
use crate::error::{Error, Result};

pub const HEADER_MAGIC: u32 = 0x4853_5452; // "HSTR"
pub const FOOTER_MAGIC: u32 = !HEADER_MAGIC;
/// magic(4) + algorithm(4) + checksum(8)
pub const FOOTER_LEN: usize = 16;

const CHECKSUM_ALGORITHM_CRC32: u32 = 0;

/// Append-only output with varint helpers
///
/// Blanket-implemented for every `io::Write`, like byteorder's `WriteBytesExt`.
pub trait DataOutput: Write {
    fn write_vint(&mut self, value: u32) -> io::Result<()> {
        self.write_vlong(value as u64)
    }

    fn write_vlong(&mut self, mut value: u64) -> io::Result<()> {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.write_u8(byte)?;
                return Ok(());
            }
            self.write_u8(byte | 0x80)?;
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_all(bytes)
    }

    fn write_string(&mut self, s: &str) -> io::Result<()> {
        self.write_vint(len_u32(s.len())?)?;
        self.write_all(s.as_bytes())
    }
}

impl<W: Write + ?Sized> DataOutput for W {}

/// Length prefix of a value; values of 4 GiB or more cannot be framed.
pub fn len_u32(len: usize) -> io::Result<u32> {
    u32::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("value of {} bytes exceeds the u32 length prefix", len),
        )
    })
}

/// Random-access input primitives
///
/// Reading past the end is reported as corruption: a store file is always
/// fully written before it is opened.
pub trait DataInput {
    fn read_byte(&mut self) -> Result<u8>;

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()>;

    fn skip_bytes(&mut self, n: u64) -> Result<()>;

    fn read_vint(&mut self) -> Result<u32> {
        let mut result = 0u32;
        for shift in (0..35).step_by(7) {
            let byte = self.read_byte()?;
            if shift == 28 && byte & 0xF0 != 0 {
                return Err(Error::corruption("vint overflows u32"));
            }
            result |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(Error::corruption("vint too long"))
    }

    fn read_vlong(&mut self) -> Result<u64> {
        let mut result = 0u64;
        for shift in (0..70).step_by(7) {
            let byte = self.read_byte()?;
            if shift == 63 && byte & 0xFE != 0 {
                return Err(Error::corruption("vlong overflows u64"));
            }
            result |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(Error::corruption("vlong too long"))
    }

    fn read_u32_le(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64_le(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_bytes(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Read `len` bytes into a fresh buffer.
    ///
    /// Grows in steps so a corrupt length fails at EOF instead of
    /// allocating up front.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_into_vec(len, &mut buf)?;
        Ok(buf)
    }

    /// Replace the contents of `buf` with the next `len` bytes.
    fn read_into_vec(&mut self, len: usize, buf: &mut Vec<u8>) -> Result<()> {
        const STEP: usize = 64 * 1024;
        buf.clear();
        while buf.len() < len {
            let start = buf.len();
            buf.resize(start + (len - start).min(STEP), 0);
            self.read_bytes(&mut buf[start..])?;
        }
        Ok(())
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_vint()? as usize;
        let buf = self.read_vec(len)?;
        String::from_utf8(buf).map_err(|e| Error::corruption(format!("invalid utf-8: {}", e)))
    }
}

impl DataInput for &[u8] {
    fn read_byte(&mut self) -> Result<u8> {
        let (&first, rest) = self
            .split_first()
            .ok_or_else(|| Error::corruption("read past EOF"))?;
        *self = rest;
        Ok(first)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() > self.len() {
            return Err(Error::corruption("read past EOF"));
        }
        let (head, rest) = self.split_at(buf.len());
        buf.copy_from_slice(head);
        *self = rest;
        Ok(())
    }

    fn skip_bytes(&mut self, n: u64) -> Result<()> {
        let n = usize::try_from(n).map_err(|_| Error::corruption("skip past EOF"))?;
        if n > self.len() {
            return Err(Error::corruption("skip past EOF"));
        }
        *self = &self[n..];
        Ok(())
    }
}

/// Write adapter that tracks the file pointer and a running CRC32.
pub struct IndexOutput<W: Write> {
    inner: W,
    hasher: crc32fast::Hasher,
    file_pointer: u64,
}

impl<W: Write> IndexOutput<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            file_pointer: 0,
        }
    }

    /// Current write position (total bytes written so far).
    pub fn file_pointer(&self) -> u64 {
        self.file_pointer
    }

    /// Checksum of everything written so far.
    pub fn checksum(&self) -> u32 {
        self.hasher.clone().finalize()
    }

    /// Append the checksum footer. Nothing may be written afterwards.
    pub fn write_footer(&mut self) -> io::Result<()> {
        self.write_u32::<LittleEndian>(FOOTER_MAGIC)?;
        self.write_u32::<LittleEndian>(CHECKSUM_ALGORITHM_CRC32)?;
        let checksum = self.checksum() as u64;
        self.write_u64::<LittleEndian>(checksum)?;
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for IndexOutput<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.file_pointer += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Random-access cursor over an immutable file.
#[derive(Debug, Clone)]
pub struct IndexInput {
    bytes: OwnedBytes,
    pos: usize,
}

impl IndexInput {
    pub fn new(bytes: OwnedBytes) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn file_pointer(&self) -> u64 {
        self.pos as u64
    }

    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len() {
            return Err(Error::corruption(format!(
                "seek to {} past EOF ({})",
                pos,
                self.len()
            )));
        }
        self.pos = pos as usize;
        Ok(())
    }

    /// Borrow the next `n` bytes without copying and advance past them.
    pub fn read_slice(&mut self, n: usize) -> Result<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| Error::corruption("read past EOF"))?;
        let start = self.pos;
        self.pos = end;
        Ok(&self.bytes[start..end])
    }

    /// Like [`read_slice`](Self::read_slice) but returns a shared handle.
    pub fn read_owned(&mut self, n: usize) -> Result<OwnedBytes> {
        let start = self.pos;
        self.read_slice(n)?;
        Ok(self.bytes.slice(start..self.pos))
    }

    /// Raw bytes of `range`, independent of the cursor.
    pub fn bytes_range(&self, start: u64, end: u64) -> Result<&[u8]> {
        if start > end || end > self.len() {
            return Err(Error::corruption(format!(
                "range {}..{} out of bounds ({})",
                start,
                end,
                self.len()
            )));
        }
        Ok(&self.bytes[start as usize..end as usize])
    }
}

impl DataInput for IndexInput {
    fn read_byte(&mut self) -> Result<u8> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| Error::corruption("read past EOF"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let src = self.read_slice(buf.len())?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn skip_bytes(&mut self, n: u64) -> Result<()> {
        let n = usize::try_from(n).map_err(|_| Error::corruption("skip past EOF"))?;
        self.read_slice(n).map(|_| ())
    }
}

/// Write a codec header.
pub fn write_header<W: Write + ?Sized>(out: &mut W, codec: &str, version: u32) -> io::Result<()> {
    out.write_u32::<LittleEndian>(HEADER_MAGIC)?;
    out.write_string(codec)?;
    out.write_u32::<LittleEndian>(version)
}

/// Validate a codec header and return the version it declares.
pub fn check_header<I: DataInput + ?Sized>(
    input: &mut I,
    codec: &str,
    min_version: u32,
    max_version: u32,
) -> Result<u32> {
    let magic = input.read_u32_le()?;
    if magic != HEADER_MAGIC {
        return Err(Error::corruption(format!(
            "invalid header magic: {:#010x}",
            magic
        )));
    }
    let actual = input.read_string()?;
    if actual != codec {
        return Err(Error::corruption(format!(
            "codec mismatch: expected {:?}, got {:?}",
            codec, actual
        )));
    }
    let version = input.read_u32_le()?;
    if !(min_version..=max_version).contains(&version) {
        return Err(Error::corruption(format!(
            "unsupported {} version {} (supported {}..={})",
            codec, version, min_version, max_version
        )));
    }
    Ok(version)
}

/// Validate the checksum footer of a complete file.
pub fn check_footer(bytes: &[u8]) -> Result<()> {
    if bytes.len() < FOOTER_LEN {
        return Err(Error::corruption(format!(
            "file too small for footer: {} bytes",
            bytes.len()
        )));
    }
    let mut footer = &bytes[bytes.len() - FOOTER_LEN..];
    let magic = footer.read_u32_le()?;
    if magic != FOOTER_MAGIC {
        return Err(Error::corruption(format!(
            "invalid footer magic: {:#010x}",
            magic
        )));
    }
    let algorithm = footer.read_u32_le()?;
    if algorithm != CHECKSUM_ALGORITHM_CRC32 {
        return Err(Error::corruption(format!(
            "unknown checksum algorithm: {}",
            algorithm
        )));
    }
    let expected = footer.read_u64_le()?;
    let actual = crc32fast::hash(&bytes[..bytes.len() - 8]) as u64;
    if expected != actual {
        return Err(Error::corruption(format!(
            "checksum mismatch: expected {:#x}, got {:#x}",
            expected, actual
        )));
    }
    Ok(())
}
