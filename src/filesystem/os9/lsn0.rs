//! OS-9 identification sector (LSN0) and device path descriptor

use crate::codec::{
    decode_date_time, encode_high_bit, high_bit_terminated, put_u16_be, put_u24_be, u16_be,
    u24_be,
};
use crate::error::{DiskError, Result};
use crate::format::OS9_HARD_DISK_FORMAT;
use crate::geometry::Geometry;
use chrono::NaiveDateTime;

const VOLUME_NAME_OFFSET: usize = 0x1F;
const VOLUME_NAME_LEN: usize = 32;
const PATH_DESCRIPTOR_OFFSET: usize = 0x3F;
const SECTOR_SIZE_OFFSET: usize = 0x68;

/// RBF device path descriptor options stored in LSN0
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathDescriptor {
    /// Device class (1 = RBF)
    pub device_class: u8,
    /// Drive number
    pub drive_number: u8,
    /// Step rate
    pub step_rate: u8,
    /// Device type (0x20 = 5.25" double density)
    pub device_type: u8,
    /// Density
    pub density: u8,
    /// Cylinders
    pub cylinders: u16,
    /// Sides
    pub sides: u8,
    /// Verify flag
    pub verify: u8,
    /// Sectors per track
    pub sectors_per_track: u16,
    /// Sectors per track on track 0
    pub sectors_per_track0: u16,
    /// Sector interleave
    pub interleave: u8,
    /// Minimum segment allocation size
    pub segment_allocation_size: u8,
    /// DMA transfer mode
    pub dma_mode: u8,
    /// Path extension
    pub extension: u16,
    /// Sector offsets
    pub offsets: u8,
}

impl PathDescriptor {
    /// Encoded length
    pub const SIZE: usize = 19;

    /// Decode from the 19 bytes at LSN0 offset 0x3F
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(DiskError::parse(0, "path descriptor is truncated"));
        }
        Ok(Self {
            device_class: bytes[0],
            drive_number: bytes[1],
            step_rate: bytes[2],
            device_type: bytes[3],
            density: bytes[4],
            cylinders: u16_be(bytes, 5),
            sides: bytes[7],
            verify: bytes[8],
            sectors_per_track: u16_be(bytes, 9),
            sectors_per_track0: u16_be(bytes, 0x0B),
            interleave: bytes[0x0D],
            segment_allocation_size: bytes[0x0E],
            dma_mode: bytes[0x0F],
            extension: u16_be(bytes, 0x10),
            offsets: bytes[0x12],
        })
    }

    /// Encode into a 19-byte buffer
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0] = self.device_class;
        bytes[1] = self.drive_number;
        bytes[2] = self.step_rate;
        bytes[3] = self.device_type;
        bytes[4] = self.density;
        put_u16_be(&mut bytes, 5, self.cylinders);
        bytes[7] = self.sides;
        bytes[8] = self.verify;
        put_u16_be(&mut bytes, 9, self.sectors_per_track);
        put_u16_be(&mut bytes, 0x0B, self.sectors_per_track0);
        bytes[0x0D] = self.interleave;
        bytes[0x0E] = self.segment_allocation_size;
        bytes[0x0F] = self.dma_mode;
        put_u16_be(&mut bytes, 0x10, self.extension);
        bytes[0x12] = self.offsets;
        bytes
    }
}

/// Decoded LSN0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lsn0 {
    /// Sectors on the volume (24-bit)
    pub total_sectors: u32,
    /// Sectors per track, as a byte
    pub track_size: u8,
    /// Bytes in the allocation bitmap
    pub map_bytes: u16,
    /// Sectors per bitmap bit
    pub cluster_size: u16,
    /// LSN of the root directory descriptor
    pub root_directory: u32,
    /// Owner id
    pub owner: u16,
    /// Volume attributes
    pub attributes: u8,
    /// Random disk id
    pub disk_id: u16,
    /// Disk format byte (bit 0 double sided, 0x82 hard disk)
    pub disk_format: u8,
    /// Sectors per track
    pub sectors_per_track: u16,
    /// Reserved
    pub reserved: u16,
    /// LSN of the bootstrap file
    pub bootstrap: u32,
    /// Bootstrap size in bytes
    pub bootstrap_size: u16,
    /// Packed creation date (y m d h m)
    pub created: [u8; 5],
    /// Volume name
    pub volume_name: String,
    /// Device path descriptor
    pub path_descriptor: PathDescriptor,
    /// Logical sector size; 0 means 256
    pub sector_size: u16,
}

impl Default for Lsn0 {
    fn default() -> Self {
        Self {
            total_sectors: 0,
            track_size: 0,
            map_bytes: 0,
            cluster_size: 1,
            root_directory: 0,
            owner: 0,
            attributes: 0,
            disk_id: 0,
            disk_format: 0,
            sectors_per_track: 0,
            reserved: 0,
            bootstrap: 0,
            bootstrap_size: 0,
            created: [0; 5],
            volume_name: String::new(),
            path_descriptor: PathDescriptor::default(),
            sector_size: 0,
        }
    }
}

impl Lsn0 {
    /// Bytes of LSN0 that carry fields
    pub const SIZE: usize = SECTOR_SIZE_OFFSET + 2;

    /// Decode LSN0 from the start of a sector
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(DiskError::parse(
                bytes.len() as u64,
                "LSN0 is shorter than its fields",
            ));
        }

        let mut created = [0u8; 5];
        created.copy_from_slice(&bytes[0x1A..0x1F]);

        Ok(Self {
            total_sectors: u24_be(bytes, 0x00),
            track_size: bytes[0x03],
            map_bytes: u16_be(bytes, 0x04),
            cluster_size: u16_be(bytes, 0x06),
            root_directory: u24_be(bytes, 0x08),
            owner: u16_be(bytes, 0x0B),
            attributes: bytes[0x0D],
            disk_id: u16_be(bytes, 0x0E),
            disk_format: bytes[0x10],
            sectors_per_track: u16_be(bytes, 0x11),
            reserved: u16_be(bytes, 0x13),
            bootstrap: u24_be(bytes, 0x15),
            bootstrap_size: u16_be(bytes, 0x18),
            created,
            volume_name: high_bit_terminated(
                &bytes[VOLUME_NAME_OFFSET..VOLUME_NAME_OFFSET + VOLUME_NAME_LEN],
            ),
            path_descriptor: PathDescriptor::decode(
                &bytes[PATH_DESCRIPTOR_OFFSET..PATH_DESCRIPTOR_OFFSET + PathDescriptor::SIZE],
            )?,
            sector_size: u16_be(bytes, SECTOR_SIZE_OFFSET),
        })
    }

    /// Encode into a sector buffer of `sector_size` bytes (at least 256)
    pub fn encode(&self, sector_size: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; sector_size.max(256)];
        put_u24_be(&mut bytes, 0x00, self.total_sectors);
        bytes[0x03] = self.track_size;
        put_u16_be(&mut bytes, 0x04, self.map_bytes);
        put_u16_be(&mut bytes, 0x06, self.cluster_size);
        put_u24_be(&mut bytes, 0x08, self.root_directory);
        put_u16_be(&mut bytes, 0x0B, self.owner);
        bytes[0x0D] = self.attributes;
        put_u16_be(&mut bytes, 0x0E, self.disk_id);
        bytes[0x10] = self.disk_format;
        put_u16_be(&mut bytes, 0x11, self.sectors_per_track);
        put_u16_be(&mut bytes, 0x13, self.reserved);
        put_u24_be(&mut bytes, 0x15, self.bootstrap);
        put_u16_be(&mut bytes, 0x18, self.bootstrap_size);
        bytes[0x1A..0x1F].copy_from_slice(&self.created);
        let name = encode_high_bit(&self.volume_name, VOLUME_NAME_LEN);
        bytes[VOLUME_NAME_OFFSET..VOLUME_NAME_OFFSET + VOLUME_NAME_LEN].copy_from_slice(&name);
        bytes[PATH_DESCRIPTOR_OFFSET..PATH_DESCRIPTOR_OFFSET + PathDescriptor::SIZE]
            .copy_from_slice(&self.path_descriptor.encode());
        put_u16_be(&mut bytes, SECTOR_SIZE_OFFSET, self.sector_size);
        bytes
    }

    /// Heads implied by the disk format byte
    pub fn heads(&self) -> u8 {
        if self.disk_format == OS9_HARD_DISK_FORMAT {
            1
        } else if self.disk_format & 0x01 != 0 {
            2
        } else {
            1
        }
    }

    /// Logical sector size in bytes
    pub fn logical_sector_size(&self) -> u16 {
        if self.sector_size == 0 {
            256
        } else {
            self.sector_size
        }
    }

    /// Sectors occupied by the allocation bitmap
    pub fn bitmap_sectors(&self) -> u32 {
        let size = self.logical_sector_size() as u32;
        (self.map_bytes as u32).div_ceil(size)
    }

    /// Creation date, when it decodes to a real date
    pub fn creation_date(&self) -> Option<NaiveDateTime> {
        decode_date_time(&self.created)
    }

    /// True when the volume sits on a hard disk
    pub fn is_hard_disk(&self) -> bool {
        self.disk_format == OS9_HARD_DISK_FORMAT
    }

    /// Physical geometry for a container holding this volume
    ///
    /// The path descriptor is authoritative; missing sides and sectors per
    /// track fall back to the disk format byte and the LSN0 copy, and a
    /// missing cylinder count is derived from the total.
    pub fn container_geometry(&self) -> Result<Geometry> {
        let pd = &self.path_descriptor;
        let spt = if pd.sectors_per_track == 0 {
            self.sectors_per_track
        } else {
            pd.sectors_per_track
        };
        let heads = if pd.sides == 0 { self.heads() } else { pd.sides };
        let total = self.total_sectors;

        if total == 0 || spt == 0 {
            return Err(DiskError::invalid_image("LSN0 describes an empty volume"));
        }

        let tracks = if pd.cylinders == 0 {
            total / spt as u32 / heads as u32
        } else {
            pd.cylinders as u32
        };
        if tracks * heads as u32 * spt as u32 != total {
            return Err(DiskError::invalid_image(format!(
                "LSN0 total of {} sectors does not match {} x {} x {}",
                total, tracks, heads, spt
            )));
        }
        let tracks = u16::try_from(tracks)
            .map_err(|_| DiskError::invalid_image(format!("{} cylinders is too many", tracks)))?;

        Ok(Geometry::new(tracks, heads, spt, self.logical_sector_size()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Lsn0 {
        Lsn0 {
            total_sectors: 630,
            track_size: 18,
            map_bytes: 79,
            cluster_size: 1,
            root_directory: 2,
            attributes: 0xFF,
            disk_id: 0x1234,
            disk_format: 0x02,
            sectors_per_track: 18,
            created: [86, 3, 14, 12, 30],
            volume_name: "Work Disk".to_string(),
            path_descriptor: PathDescriptor {
                device_class: 1,
                device_type: 0x20,
                density: 1,
                cylinders: 35,
                sides: 1,
                sectors_per_track: 18,
                sectors_per_track0: 18,
                interleave: 3,
                segment_allocation_size: 8,
                ..PathDescriptor::default()
            },
            ..Lsn0::default()
        }
    }

    #[test]
    fn test_field_offsets() {
        let bytes = sample().encode(256);
        assert_eq!(&bytes[0..3], &[0x00, 0x02, 0x76]);
        assert_eq!(bytes[0x03], 18);
        assert_eq!(&bytes[0x0E..0x10], &[0x12, 0x34]);
        assert_eq!(bytes[0x1F], b'W');
        assert_eq!(bytes[0x1F + 8], b'k' | 0x80);
        assert_eq!(bytes[0x3F + 3], 0x20);
        assert_eq!(&bytes[0x3F + 5..0x3F + 7], &[0, 35]);
    }

    #[test]
    fn test_round_trip() {
        let lsn0 = sample();
        assert_eq!(Lsn0::decode(&lsn0.encode(256)).unwrap(), lsn0);
    }

    #[test]
    fn test_truncated() {
        assert!(Lsn0::decode(&[0; 0x40]).is_err());
    }

    #[test]
    fn test_heads_from_disk_format() {
        let mut lsn0 = sample();
        assert_eq!(lsn0.heads(), 1);
        lsn0.disk_format = 0x03;
        assert_eq!(lsn0.heads(), 2);
        lsn0.disk_format = OS9_HARD_DISK_FORMAT;
        assert_eq!(lsn0.heads(), 1);
        assert!(lsn0.is_hard_disk());
    }

    #[test]
    fn test_sector_size_default() {
        let mut lsn0 = sample();
        assert_eq!(lsn0.logical_sector_size(), 256);
        lsn0.sector_size = 512;
        assert_eq!(lsn0.logical_sector_size(), 512);
        assert_eq!(lsn0.bitmap_sectors(), 1);
    }

    #[test]
    fn test_container_geometry() {
        let mut lsn0 = sample();
        assert_eq!(lsn0.container_geometry().unwrap(), Geometry::new(35, 1, 18, 256));

        // Cylinders derived from the total when missing
        lsn0.path_descriptor.cylinders = 0;
        assert_eq!(lsn0.container_geometry().unwrap().tracks, 35);

        lsn0.total_sectors = 631;
        assert!(lsn0.container_geometry().is_err());
    }

    #[test]
    fn test_creation_date() {
        let date = sample().creation_date().unwrap();
        assert_eq!(date.to_string(), "1986-03-14 12:30:00");
    }
}
