mod bytes;
mod directory;
pub mod io;
#[cfg(feature = "native")]
mod mmap;

pub use bytes::OwnedBytes;
pub use directory::*;
pub use io::{DataInput, DataOutput, IndexInput, IndexOutput};
#[cfg(feature = "native")]
pub use mmap::MmapDirectory;
