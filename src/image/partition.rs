use super::{Layout, Probe};
use crate::error::{DiskError, Result};
use crate::format::{FormatSpec, RGBDOS_PARTITION_SIZE, RGBDOS_TRACKS, SECTORS_PER_TRACK, SECTOR_SIZE};
use crate::geometry::Geometry;
use crate::io::ByteSource;

/// Volumes on a partitioned hard disk
///
/// An optional OS-9 volume sits at offset 0 and is partition 0. Fixed-size
/// RGB-DOS volumes follow it back to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionTable {
    /// Geometry of the leading OS-9 volume, if there is one
    pub os9_geometry: Option<Geometry>,
    /// Number of RGB-DOS volumes
    pub rgbdos_count: u32,
    /// Selected partition
    pub current: u32,
}

impl PartitionTable {
    /// Geometry of every RGB-DOS volume
    pub fn rgbdos_geometry() -> Geometry {
        Geometry::new(RGBDOS_TRACKS, 1, SECTORS_PER_TRACK, SECTOR_SIZE as u16)
    }

    /// Bytes taken by the OS-9 volume
    pub fn os9_length(&self) -> u64 {
        self.os9_geometry.map_or(0, |g| g.total_bytes())
    }

    /// Total number of partitions
    pub fn count(&self) -> u32 {
        self.rgbdos_count + u32::from(self.os9_geometry.is_some())
    }

    /// True when `index` is the OS-9 volume
    pub fn is_os9(&self, index: u32) -> bool {
        self.os9_geometry.is_some() && index == 0
    }

    /// Byte offset of a partition
    pub fn offset(&self, index: u32) -> u64 {
        if self.os9_geometry.is_some() {
            match index {
                0 => 0,
                n => self.os9_length() + (n as u64 - 1) * RGBDOS_PARTITION_SIZE,
            }
        } else {
            index as u64 * RGBDOS_PARTITION_SIZE
        }
    }

    /// Geometry used to address sectors in a partition
    pub fn geometry(&self, index: u32) -> Geometry {
        match self.os9_geometry {
            Some(geometry) if index == 0 => geometry,
            _ => Self::rgbdos_geometry(),
        }
    }

    /// Make `index` the current partition
    pub fn select(&mut self, index: u32) -> Result<()> {
        if index >= self.count() {
            return Err(DiskError::InvalidPartition {
                index,
                count: self.count(),
            });
        }
        self.current = index;
        Ok(())
    }
}

/// Split a hard disk into its OS-9 volume and RGB-DOS partitions
pub(crate) fn probe(source: &mut dyn ByteSource) -> Result<Probe> {
    let os9_geometry = super::os9::read_lsn0(source)
        .and_then(|lsn0| lsn0.container_geometry())
        .ok()
        .filter(|g| g.total_bytes() <= source.len());
    let os9_length = os9_geometry.map_or(0, |g| g.total_bytes());

    let remainder = source.len() - os9_length;
    if remainder % RGBDOS_PARTITION_SIZE != 0 {
        return Err(DiskError::invalid_image(format!(
            "{} bytes after the OS-9 volume is not a whole number of RGB-DOS partitions",
            remainder
        )));
    }

    let table = PartitionTable {
        os9_geometry,
        rgbdos_count: (remainder / RGBDOS_PARTITION_SIZE) as u32,
        current: 0,
    };
    if table.count() == 0 {
        return Err(DiskError::invalid_image("hard disk holds no partitions"));
    }

    Ok(Probe {
        geometry: table.geometry(0),
        header_length: 0,
        layout: Layout::Partitioned(table),
    })
}

/// Allocate a partitioned disk: an optional OS-9 volume then `rgbdos` partitions
pub(crate) fn create(
    source: &mut dyn ByteSource,
    os9: Option<&FormatSpec>,
    rgbdos: u32,
    filler_byte: u8,
) -> Result<Probe> {
    let os9_geometry = match os9 {
        Some(spec) => {
            let geometry = spec.geometry();
            geometry.validate()?;
            Some(geometry)
        }
        None => None,
    };
    let table = PartitionTable {
        os9_geometry,
        rgbdos_count: rgbdos,
        current: 0,
    };
    if table.count() == 0 {
        return Err(DiskError::geometry("a partitioned disk needs at least one volume"));
    }

    source.set_len(table.os9_length() + rgbdos as u64 * RGBDOS_PARTITION_SIZE)?;
    for index in 0..table.count() {
        super::fill_tracks(source, table.offset(index), &table.geometry(index), filler_byte)?;
    }

    Ok(Probe {
        geometry: table.geometry(0),
        header_length: 0,
        layout: Layout::Partitioned(table),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_os9() -> PartitionTable {
        PartitionTable {
            os9_geometry: Some(Geometry::new(100, 1, 32, 256)),
            rgbdos_count: 3,
            current: 0,
        }
    }

    #[test]
    fn test_offsets_with_os9_volume() {
        let table = with_os9();
        assert_eq!(table.count(), 4);
        assert_eq!(table.offset(0), 0);
        assert_eq!(table.offset(1), 100 * 32 * 256);
        assert_eq!(table.offset(3), 100 * 32 * 256 + 2 * RGBDOS_PARTITION_SIZE);
        assert_eq!(table.geometry(0).sectors_per_track, 32);
        assert_eq!(table.geometry(2), PartitionTable::rgbdos_geometry());
        assert!(table.is_os9(0));
        assert!(!table.is_os9(1));
    }

    #[test]
    fn test_offsets_without_os9_volume() {
        let table = PartitionTable {
            os9_geometry: None,
            rgbdos_count: 2,
            current: 0,
        };
        assert_eq!(table.count(), 2);
        assert_eq!(table.offset(1), RGBDOS_PARTITION_SIZE);
        assert!(!table.is_os9(0));
    }

    #[test]
    fn test_select_out_of_range() {
        let mut table = with_os9();
        assert!(table.select(3).is_ok());
        assert_eq!(table.current, 3);
        assert!(matches!(
            table.select(4),
            Err(DiskError::InvalidPartition { index: 4, count: 4 })
        ));
        assert_eq!(table.current, 3);
    }

    #[test]
    fn test_probe_rgbdos_only() {
        let mut source = crate::io::MemorySource::with_len(2 * RGBDOS_PARTITION_SIZE as usize);
        let probe = probe(&mut source).unwrap();
        match probe.layout {
            Layout::Partitioned(table) => {
                assert_eq!(table.count(), 2);
                assert!(table.os9_geometry.is_none());
            }
            _ => panic!("expected a partition table"),
        }
    }

    #[test]
    fn test_probe_rejects_ragged_tail() {
        let mut source = crate::io::MemorySource::with_len(RGBDOS_PARTITION_SIZE as usize + 256);
        assert!(probe(&mut source).is_err());
    }
}
