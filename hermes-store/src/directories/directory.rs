//! Directory abstraction for store files
//!
//! Files are written once through a [`StreamingWriter`] and become visible
//! to readers only after `finish`. Reads hand out [`OwnedBytes`] so readers
//! can slice without copying.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::OwnedBytes;

/// Read side of a directory
pub trait Directory: Send + Sync + 'static {
    /// Check if a file exists
    fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Get file size
    fn file_size(&self, path: &Path) -> io::Result<u64>;

    /// Open a complete file for random access
    fn open_read(&self, path: &Path) -> io::Result<OwnedBytes>;
}

/// A file being written. Data becomes readable after `finish`.
pub trait StreamingWriter: io::Write + Send {
    /// Finalize the write, making data available for reading.
    fn finish(self: Box<Self>) -> io::Result<()>;

    /// Bytes written so far.
    fn bytes_written(&self) -> u64;
}

/// Write side of a directory
pub trait DirectoryWriter: Directory {
    /// Write a small file in one shot
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Delete a file
    fn delete(&self, path: &Path) -> io::Result<()>;

    /// Open a streaming writer for an append-only file
    fn streaming_writer(&self, path: &Path) -> io::Result<Box<dyn StreamingWriter>>;
}

type FileMap = Arc<RwLock<HashMap<PathBuf, OwnedBytes>>>;

/// In-memory directory
#[derive(Clone, Default)]
pub struct RamDirectory {
    files: FileMap,
}

impl RamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently stored
    pub fn num_files(&self) -> usize {
        self.files.read().len()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("File not found: {:?}", path),
    )
}

impl Directory for RamDirectory {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.files.read().contains_key(path))
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        self.files
            .read()
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or_else(|| not_found(path))
    }

    fn open_read(&self, path: &Path) -> io::Result<OwnedBytes> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| not_found(path))
    }
}

impl DirectoryWriter for RamDirectory {
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.files
            .write()
            .insert(path.to_path_buf(), OwnedBytes::new(data.to_vec()));
        Ok(())
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        self.files
            .write()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }

    fn streaming_writer(&self, path: &Path) -> io::Result<Box<dyn StreamingWriter>> {
        Ok(Box::new(BufferedStreamingWriter {
            path: path.to_path_buf(),
            buffer: Vec::new(),
            files: Arc::clone(&self.files),
        }))
    }
}

/// StreamingWriter backed by Vec<u8>, published into a RamDirectory on finish.
struct BufferedStreamingWriter {
    path: PathBuf,
    buffer: Vec<u8>,
    files: FileMap,
}

impl io::Write for BufferedStreamingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl StreamingWriter for BufferedStreamingWriter {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let this = *self;
        this.files
            .write()
            .insert(this.path, OwnedBytes::new(this.buffer));
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.buffer.len() as u64
    }
}
