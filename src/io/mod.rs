/// Byte sources backing disk images

/// File-backed byte source
pub mod file;
/// In-memory byte source
pub mod memory;

pub use file::FileSource;
pub use memory::MemorySource;

use crate::error::Result;

/// A seekable, resizable array of bytes
///
/// Containers treat their backing store purely through this trait, so an image
/// can live in a file or in a `Vec<u8>` without the container knowing which.
pub trait ByteSource {
    /// Current length in bytes
    fn len(&self) -> u64;

    /// True when the source holds no bytes
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with the bytes starting at `offset`
    ///
    /// Reading past the end is an error.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `data` at `offset`, growing the source if needed
    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Truncate or extend (with zeros) to `len` bytes
    fn set_len(&mut self, len: u64) -> Result<()>;

    /// Push buffered writes to the backing store
    fn flush(&mut self) -> Result<()>;
}
