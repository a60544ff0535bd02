//! OS-9 file descriptors and 32-byte directory slots

use crate::codec::{
    decode_date, decode_date_time, encode_high_bit, high_bit_terminated, put_u24_be, put_u32_be,
    u16_be, u24_be, u32_be,
};
use crate::error::{DiskError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// Segment list slots in a file descriptor
pub const SEGMENT_COUNT: usize = 48;

const SEGMENT_OFFSET: usize = 0x10;
const SEGMENT_SIZE: usize = 5;

/// File attribute byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Os9Attributes(pub u8);

impl Os9Attributes {
    /// Directory
    pub const DIRECTORY: u8 = 0x80;
    /// Shareable
    pub const SHARE: u8 = 0x40;
    /// Public execute
    pub const PUBLIC_EXECUTE: u8 = 0x20;
    /// Public write
    pub const PUBLIC_WRITE: u8 = 0x10;
    /// Public read
    pub const PUBLIC_READ: u8 = 0x08;
    /// Owner execute
    pub const EXECUTE: u8 = 0x04;
    /// Owner write
    pub const WRITE: u8 = 0x02;
    /// Owner read
    pub const READ: u8 = 0x01;

    /// Directory bit
    pub fn is_directory(&self) -> bool {
        self.0 & Self::DIRECTORY != 0
    }
}

impl fmt::Display for Os9Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const LETTERS: [char; 8] = ['d', 's', 'e', 'w', 'r', 'e', 'w', 'r'];
        for (i, letter) in LETTERS.iter().enumerate() {
            let bit = 0x80 >> i;
            if self.0 & bit != 0 {
                write!(f, "{}", letter)?;
            } else {
                write!(f, "-")?;
            }
        }
        Ok(())
    }
}

/// A run of contiguous sectors belonging to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileSegment {
    /// First LSN; 0 ends the segment list
    pub lsn: u32,
    /// Sectors in the run
    pub sectors: u16,
}

impl FileSegment {
    /// Create a segment
    pub fn new(lsn: u32, sectors: u16) -> Self {
        Self { lsn, sectors }
    }
}

/// File descriptor sector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Attribute byte
    pub attributes: Os9Attributes,
    /// Owner id
    pub owner: u16,
    /// Packed last-modified time (y m d h m)
    pub modified: [u8; 5],
    /// Link count
    pub link_count: u8,
    /// File size in bytes
    pub size: u32,
    /// Packed creation date (y m d)
    pub created: [u8; 3],
    /// Segment list, in file order
    pub segments: Vec<FileSegment>,
}

impl Default for FileDescriptor {
    fn default() -> Self {
        Self {
            attributes: Os9Attributes::default(),
            owner: 0,
            modified: [0; 5],
            link_count: 1,
            size: 0,
            created: [0; 3],
            segments: Vec::new(),
        }
    }
}

impl FileDescriptor {
    /// Decode a descriptor sector
    ///
    /// All 48 segment slots are kept, including trailing empty ones, so the
    /// descriptor encodes back to the same bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let end = SEGMENT_OFFSET + SEGMENT_COUNT * SEGMENT_SIZE;
        if bytes.len() < end {
            return Err(DiskError::parse(
                bytes.len() as u64,
                "file descriptor is shorter than its segment list",
            ));
        }

        let mut modified = [0u8; 5];
        modified.copy_from_slice(&bytes[3..8]);
        let mut created = [0u8; 3];
        created.copy_from_slice(&bytes[0x0D..0x10]);

        let segments = bytes[SEGMENT_OFFSET..end]
            .chunks_exact(SEGMENT_SIZE)
            .map(|raw| FileSegment::new(u24_be(raw, 0), u16_be(raw, 3)))
            .collect();

        Ok(Self {
            attributes: Os9Attributes(bytes[0]),
            owner: u16_be(bytes, 1),
            modified,
            link_count: bytes[8],
            size: u32_be(bytes, 9),
            created,
            segments,
        })
    }

    /// Encode into a sector of `sector_size` bytes
    pub fn encode(&self, sector_size: usize) -> Result<Vec<u8>> {
        if self.segments.len() > SEGMENT_COUNT {
            return Err(DiskError::filesystem(format!(
                "{} segments do not fit a file descriptor",
                self.segments.len()
            )));
        }
        let mut bytes = vec![0u8; sector_size.max(256)];
        bytes[0] = self.attributes.0;
        bytes[1..3].copy_from_slice(&self.owner.to_be_bytes());
        bytes[3..8].copy_from_slice(&self.modified);
        bytes[8] = self.link_count;
        put_u32_be(&mut bytes, 9, self.size);
        bytes[0x0D..0x10].copy_from_slice(&self.created);
        for (i, segment) in self.segments.iter().enumerate() {
            let offset = SEGMENT_OFFSET + i * SEGMENT_SIZE;
            put_u24_be(&mut bytes, offset, segment.lsn);
            bytes[offset + 3..offset + 5].copy_from_slice(&segment.sectors.to_be_bytes());
        }
        Ok(bytes)
    }

    /// Directory bit of the attributes
    pub fn is_directory(&self) -> bool {
        self.attributes.is_directory()
    }

    /// Segments up to the first empty one
    pub fn used_segments(&self) -> impl Iterator<Item = &FileSegment> {
        self.segments.iter().take_while(|s| s.lsn != 0)
    }

    /// Sectors allocated to the file
    pub fn allocated_sectors(&self) -> u32 {
        self.used_segments().map(|s| s.sectors as u32).sum()
    }

    /// Last-modified time
    pub fn modified_time(&self) -> Option<NaiveDateTime> {
        decode_date_time(&self.modified)
    }

    /// Creation date
    pub fn creation_date(&self) -> Option<NaiveDate> {
        decode_date(&self.created)
    }
}

/// One 32-byte slot of directory data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySlot {
    /// Entry name
    pub name: String,
    /// LSN of the entry's file descriptor
    pub descriptor_lsn: u32,
}

impl DirectorySlot {
    /// Slot size
    pub const SIZE: usize = 32;
    const NAME_LEN: usize = 29;

    /// Decode a slot; a zero first byte marks an unused slot
    pub fn decode(bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.len() < Self::SIZE {
            return Err(DiskError::parse(0, "directory slot is truncated"));
        }
        if bytes[0] == 0 {
            return Ok(None);
        }
        Ok(Some(Self {
            name: high_bit_terminated(&bytes[..Self::NAME_LEN]),
            descriptor_lsn: u24_be(bytes, Self::NAME_LEN),
        }))
    }

    /// Encode into a 32-byte slot
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..Self::NAME_LEN].copy_from_slice(&encode_high_bit(&self.name, Self::NAME_LEN));
        put_u24_be(&mut bytes, Self::NAME_LEN, self.descriptor_lsn);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileDescriptor {
        let mut segments = vec![FileSegment::new(0x40, 3), FileSegment::new(0x1234, 1)];
        segments.resize(SEGMENT_COUNT, FileSegment::default());
        FileDescriptor {
            attributes: Os9Attributes(0x1B),
            owner: 0,
            modified: [87, 6, 1, 9, 15],
            link_count: 1,
            size: 800,
            created: [87, 5, 31],
            segments,
        }
    }

    #[test]
    fn test_descriptor_round_trip() {
        let fd = sample();
        let bytes = fd.encode(256).unwrap();
        assert_eq!(bytes[0], 0x1B);
        assert_eq!(&bytes[9..13], &[0, 0, 3, 0x20]);
        assert_eq!(&bytes[0x10..0x15], &[0, 0, 0x40, 0, 3]);
        assert_eq!(FileDescriptor::decode(&bytes).unwrap(), fd);
    }

    #[test]
    fn test_used_segments_stop_at_zero() {
        let mut fd = sample();
        fd.segments[3] = FileSegment::new(0x99, 9);
        assert_eq!(fd.used_segments().count(), 2);
        assert_eq!(fd.allocated_sectors(), 4);
    }

    #[test]
    fn test_dates() {
        let fd = sample();
        assert_eq!(fd.modified_time().unwrap().to_string(), "1987-06-01 09:15:00");
        assert_eq!(fd.creation_date().unwrap().to_string(), "1987-05-31");

        let blank = FileDescriptor::default();
        assert!(blank.modified_time().is_none());
    }

    #[test]
    fn test_attribute_display() {
        assert_eq!(Os9Attributes(0xBF).to_string(), "d-ewrewr");
        assert_eq!(Os9Attributes(0x1B).to_string(), "---wr-wr");
        assert!(Os9Attributes(0x80).is_directory());
    }

    #[test]
    fn test_slot_round_trip() {
        let slot = DirectorySlot {
            name: "startup".to_string(),
            descriptor_lsn: 0x000123,
        };
        let bytes = slot.encode();
        assert_eq!(bytes[6], b'p' | 0x80);
        assert_eq!(&bytes[29..32], &[0x00, 0x01, 0x23]);
        assert_eq!(DirectorySlot::decode(&bytes).unwrap(), Some(slot));
    }

    #[test]
    fn test_deleted_slot() {
        let mut bytes = [0u8; 32];
        bytes[1] = b'x';
        assert_eq!(DirectorySlot::decode(&bytes).unwrap(), None);
    }

    #[test]
    fn test_dot_entries() {
        let dotdot = DirectorySlot {
            name: "..".to_string(),
            descriptor_lsn: 2,
        }
        .encode();
        assert_eq!(&dotdot[..3], &[0x2E, 0xAE, 0x00]);
        let dot = DirectorySlot {
            name: ".".to_string(),
            descriptor_lsn: 2,
        }
        .encode();
        assert_eq!(dot[0], 0xAE);
    }
}
