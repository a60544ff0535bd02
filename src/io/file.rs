use crate::error::{DiskError, Result};
use crate::io::ByteSource;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Byte source backed by a file on disk
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    /// Open an existing image read-write, falling back to read-only
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = match OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                log::warn!("{} is read-only", path.display());
                File::open(path)?
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }

    /// Create (or truncate) a file of `len` zero bytes
    pub fn create<P: AsRef<Path>>(path: P, len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(len)?;
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if offset + buf.len() as u64 > self.len {
            return Err(DiskError::parse(offset, "read past end of image"));
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.len = self.len.max(offset + data.len() as u64);
        Ok(())
    }

    fn set_len(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.len = len;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.dsk");

        let mut source = FileSource::create(&path, 512).unwrap();
        source.write_at(256, &[0xAA; 4]).unwrap();
        source.flush().unwrap();
        drop(source);

        let mut source = FileSource::open(&path).unwrap();
        assert_eq!(source.len(), 512);
        let mut buf = [0u8; 4];
        source.read_at(256, &mut buf).unwrap();
        assert_eq!(buf, [0xAA; 4]);
        assert!(source.read_at(510, &mut buf).is_err());
    }
}
