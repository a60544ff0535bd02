use crate::error::{DiskError, Result};
use crate::io::ByteSource;

/// Byte source held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    /// Wrap an existing buffer
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Create a zero-filled source of `len` bytes
    pub fn with_len(len: usize) -> Self {
        Self { data: vec![0; len] }
    }

    /// Borrow the underlying bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the source and return its bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = offset as usize;
        let end = start
            .checked_add(buf.len())
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| DiskError::parse(offset, "read past end of image"))?;
        buf.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = offset as usize;
        let end = start + data.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.data.resize(len as usize, 0);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write() {
        let mut source = MemorySource::with_len(16);
        source.write_at(4, &[1, 2, 3]).unwrap();

        let mut buf = [0u8; 3];
        source.read_at(4, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn test_read_past_end() {
        let mut source = MemorySource::with_len(8);
        let mut buf = [0u8; 4];
        assert!(source.read_at(6, &mut buf).is_err());
    }

    #[test]
    fn test_write_grows() {
        let mut source = MemorySource::default();
        source.write_at(10, &[0xFF]).unwrap();
        assert_eq!(source.len(), 11);
        assert_eq!(source.data()[10], 0xFF);
    }
}
