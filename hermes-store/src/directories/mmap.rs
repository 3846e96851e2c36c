//! Memory-mapped directory for efficient access to large stores
//!
//! This module is only compiled with the "native" feature.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memmap2::Mmap;

use super::{Directory, DirectoryWriter, OwnedBytes, StreamingWriter};

/// Memory-mapped directory
///
/// Reads map the whole file and hand out zero-copy slices; the OS page
/// cache does the caching. Writes use regular buffered file I/O.
#[derive(Debug, Clone)]
pub struct MmapDirectory {
    root: PathBuf,
}

impl MmapDirectory {
    /// Create a new MmapDirectory rooted at the given path
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Get the root directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }
}

impl Directory for MmapDirectory {
    fn exists(&self, path: &Path) -> io::Result<bool> {
        Ok(self.resolve(path).is_file())
    }

    fn file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(std::fs::metadata(self.resolve(path))?.len())
    }

    fn open_read(&self, path: &Path) -> io::Result<OwnedBytes> {
        let file = File::open(self.resolve(path))?;
        if file.metadata()?.len() == 0 {
            // Zero-length files cannot be mapped on every platform
            return Ok(OwnedBytes::empty());
        }
        // Store files are immutable once finished
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(OwnedBytes::from_mmap(Arc::new(mmap)))
    }
}

impl DirectoryWriter for MmapDirectory {
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let full_path = self.resolve(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(full_path, data)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(self.resolve(path))
    }

    fn streaming_writer(&self, path: &Path) -> io::Result<Box<dyn StreamingWriter>> {
        let full_path = self.resolve(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&full_path)?;
        Ok(Box::new(FileStreamingWriter {
            file: io::BufWriter::new(file),
            written: 0,
        }))
    }
}

/// StreamingWriter backed by a buffered file.
struct FileStreamingWriter {
    file: io::BufWriter<File>,
    written: u64,
}

impl Write for FileStreamingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl StreamingWriter for FileStreamingWriter {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let file = self.file.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}
