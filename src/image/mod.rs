/// Disk image containers

/// Image builder for creating disk images
pub mod builder;
/// DMK MFM track images
pub mod dmk;
/// JVC raw sector images
pub mod jvc;
/// OS-9 raw volumes and hard disk images
pub mod os9;
/// Partitioned hard disk images
pub mod partition;
/// VDK raw sector images
pub mod vdk;

pub use builder::DiskImageBuilder;
pub use jvc::JvcHeader;
pub use partition::PartitionTable;

use crate::error::{DiskError, Result};
use crate::format::{candidates_for_path, DiskImageType, FormatSpec};
use crate::geometry::{Chs, Geometry};
use crate::io::{ByteSource, FileSource, MemorySource};
use log::{debug, info, warn};
use std::fmt;
use std::path::Path;

/// How sector addresses map onto the byte source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// Sectors stored back to back after the header
    Linear,
    /// Linear layout described by a JVC header
    Jvc(JvcHeader),
    /// Fixed-length MFM tracks, sectors located through ID address marks
    Dmk {
        /// Bytes per track, including the IDAM table
        track_length: u16,
    },
    /// Leading OS-9 volume followed by fixed-size RGB-DOS volumes
    Partitioned(PartitionTable),
}

/// Result of a successful geometry probe
#[derive(Debug, Clone, Copy)]
pub(crate) struct Probe {
    pub geometry: Geometry,
    pub header_length: u64,
    pub layout: Layout,
}

impl Probe {
    pub fn linear(geometry: Geometry, header_length: u64) -> Self {
        Self {
            geometry,
            header_length,
            layout: Layout::Linear,
        }
    }
}

/// Fill every track of a linear layout with `fill`, starting at `offset`
pub(crate) fn fill_tracks(
    source: &mut dyn ByteSource,
    offset: u64,
    geometry: &Geometry,
    fill: u8,
) -> Result<()> {
    let track = vec![fill; geometry.track_bytes() as usize];
    let tracks = geometry.tracks as u64 * geometry.heads as u64;
    for i in 0..tracks {
        source.write_at(offset + i * geometry.track_bytes(), &track)?;
    }
    Ok(())
}

/// A disk image: a byte source plus the geometry needed to address its sectors
pub struct DiskImage {
    source: Box<dyn ByteSource>,
    image_type: DiskImageType,
    geometry: Geometry,
    header_length: u64,
    interleave: u8,
    layout: Layout,
    valid: bool,
    changed: bool,
}

impl fmt::Debug for DiskImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiskImage")
            .field("image_type", &self.image_type)
            .field("geometry", &self.geometry)
            .field("header_length", &self.header_length)
            .field("layout", &self.layout)
            .field("valid", &self.valid)
            .field("len", &self.source.len())
            .finish()
    }
}

impl DiskImage {
    /// Open an image file, choosing the container from the file extension
    ///
    /// `.dsk` tries JVC then DMK, `.vhd` tries a plain hard disk then a
    /// partitioned one. The first candidate that passes its geometry probe wins.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        for &image_type in candidates_for_path(path) {
            let image = Self::open_as(path, image_type)?;
            if image.is_valid() {
                info!("Opened {} as {}", path.display(), image_type);
                return Ok(image);
            }
            debug!("{} is not a valid {} image", path.display(), image_type);
        }
        Err(DiskError::invalid_image(format!(
            "{} is not a recognised disk image",
            path.display()
        )))
    }

    /// Open an image file as a specific container type
    ///
    /// The image is returned even when its geometry probe fails; check
    /// [`DiskImage::is_valid`] before using it.
    pub fn open_as<P: AsRef<Path>>(path: P, image_type: DiskImageType) -> Result<Self> {
        let source = FileSource::open(path)?;
        Self::from_source(Box::new(source), image_type)
    }

    /// Wrap an in-memory buffer as a specific container type
    pub fn from_bytes(data: Vec<u8>, image_type: DiskImageType) -> Result<Self> {
        Self::from_source(Box::new(MemorySource::new(data)), image_type)
    }

    /// Wrap any byte source and probe its geometry
    pub fn from_source(source: Box<dyn ByteSource>, image_type: DiskImageType) -> Result<Self> {
        let mut image = Self::unprobed(source, image_type);
        image.probe_geometry()?;
        Ok(image)
    }

    /// Create an image file with the given container type and geometry
    pub fn create<P: AsRef<Path>>(path: P, image_type: DiskImageType, spec: FormatSpec) -> Result<Self> {
        DiskImageBuilder::new()
            .image_type(image_type)
            .spec(spec)
            .create(path)
    }

    /// Create a new builder for constructing disk images
    pub fn builder() -> DiskImageBuilder {
        DiskImageBuilder::new()
    }

    fn unprobed(source: Box<dyn ByteSource>, image_type: DiskImageType) -> Self {
        Self {
            source,
            image_type,
            geometry: Geometry::new(35, 1, 18, 256),
            header_length: 0,
            interleave: 1,
            layout: Layout::Linear,
            valid: false,
            changed: false,
        }
    }

    /// Build an image around freshly written bytes whose geometry is known
    pub(crate) fn with_geometry(
        source: Box<dyn ByteSource>,
        image_type: DiskImageType,
        probe: Probe,
        interleave: u8,
    ) -> Self {
        Self {
            source,
            image_type,
            geometry: probe.geometry,
            header_length: probe.header_length,
            interleave,
            layout: probe.layout,
            valid: true,
            changed: true,
        }
    }

    /// Re-detect geometry from the header or volume metadata and set validity
    ///
    /// Returns the new validity. Structural problems mark the image invalid;
    /// only I/O failures are returned as errors.
    pub fn probe_geometry(&mut self) -> Result<bool> {
        let source = self.source.as_mut();
        let probe = match self.image_type {
            DiskImageType::Jvc => jvc::probe(source),
            DiskImageType::Vdk => vdk::probe(source),
            DiskImageType::Os9 => os9::probe_volume(source),
            DiskImageType::Vhd => os9::probe_hard_disk(source),
            DiskImageType::Dmk => dmk::probe(source),
            DiskImageType::PartitionedVhd => partition::probe(source),
        };

        match probe {
            Ok(probe) => {
                debug!(
                    "{} probe: {} (header {} bytes)",
                    self.image_type, probe.geometry, probe.header_length
                );
                self.geometry = probe.geometry;
                self.header_length = probe.header_length;
                self.layout = probe.layout;
                self.valid = true;
            }
            Err(DiskError::Io(e)) => return Err(DiskError::Io(e)),
            Err(e) => {
                warn!("{} probe failed: {}", self.image_type, e);
                self.valid = false;
            }
        }
        Ok(self.valid)
    }

    /// Container type
    pub fn image_type(&self) -> DiskImageType {
        self.image_type
    }

    /// Geometry of the image, or of the selected partition on a partitioned disk
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Bytes of container header before the first sector
    pub fn header_length(&self) -> u64 {
        self.header_length
    }

    /// Sector interleave used when the image was laid out
    pub fn interleave(&self) -> u8 {
        self.interleave
    }

    /// JVC header fields, when this is a JVC image
    pub fn jvc_header(&self) -> Option<JvcHeader> {
        match self.layout {
            Layout::Jvc(header) => Some(header),
            _ => None,
        }
    }

    /// DMK track length, when this is a DMK image
    pub fn dmk_track_length(&self) -> Option<u16> {
        match self.layout {
            Layout::Dmk { track_length } => Some(track_length),
            _ => None,
        }
    }

    /// Did the last geometry probe succeed?
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// True for hard disk containers
    pub fn is_hard_disk(&self) -> bool {
        self.image_type.is_hard_disk()
    }

    /// True when the image carries a partition table
    pub fn is_partitioned(&self) -> bool {
        matches!(self.layout, Layout::Partitioned(_))
    }

    /// Partition table of a partitioned hard disk
    pub fn partition_table(&self) -> Option<&PartitionTable> {
        match &self.layout {
            Layout::Partitioned(table) => Some(table),
            _ => None,
        }
    }

    /// Number of volumes on the image (1 for everything but partitioned disks)
    pub fn partitions(&self) -> u32 {
        match &self.layout {
            Layout::Partitioned(table) => table.count(),
            _ => 1,
        }
    }

    /// Index of the selected partition
    pub fn current_partition(&self) -> u32 {
        match &self.layout {
            Layout::Partitioned(table) => table.current,
            _ => 0,
        }
    }

    /// Select the volume that sector addresses refer to
    pub fn select_partition(&mut self, index: u32) -> Result<()> {
        match &mut self.layout {
            Layout::Partitioned(table) => {
                table.select(index)?;
                self.geometry = table.geometry(index);
                debug!("Selected partition {} at offset {:#x}", index, table.offset(index));
                Ok(())
            }
            _ if index == 0 => Ok(()),
            _ => Err(DiskError::InvalidPartition { index, count: 1 }),
        }
    }

    /// Length of the underlying byte source
    pub fn len(&self) -> u64 {
        self.source.len()
    }

    /// True when the byte source is empty
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Check if the image has been modified
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Total capacity of the addressed volume in bytes
    pub fn total_capacity(&self) -> u64 {
        self.geometry.total_bytes()
    }

    fn ensure_valid(&self) -> Result<()> {
        if self.valid {
            Ok(())
        } else {
            Err(DiskError::invalid_image(format!(
                "{} image failed its geometry probe",
                self.image_type
            )))
        }
    }

    fn volume_offset(&self) -> u64 {
        match &self.layout {
            Layout::Partitioned(table) => table.offset(table.current),
            _ => self.header_length,
        }
    }

    fn sector_offset(&self, chs: Chs) -> Result<u64> {
        let lsn = self.geometry.chs_to_lsn(chs)?;
        Ok(self.volume_offset() + lsn as u64 * self.geometry.sector_size as u64)
    }

    /// Read sector data
    pub fn read_sector(&mut self, track: u16, head: u8, sector: u16) -> Result<Vec<u8>> {
        self.ensure_valid()?;
        let chs = Chs::new(track, head, sector);
        match self.layout {
            Layout::Dmk { track_length } => {
                let geometry = self.geometry;
                dmk::read_sector(self.source.as_mut(), &geometry, track_length, chs)
            }
            _ => {
                let offset = self.sector_offset(chs)?;
                let mut data = vec![0u8; self.geometry.sector_size as usize];
                self.source.read_at(offset, &mut data)?;
                Ok(data)
            }
        }
    }

    /// Write sector data; short buffers are padded with zeros
    pub fn write_sector(&mut self, track: u16, head: u8, sector: u16, data: &[u8]) -> Result<()> {
        self.ensure_valid()?;
        let chs = Chs::new(track, head, sector);
        let size = self.geometry.sector_size as usize;
        if data.len() > size {
            return Err(DiskError::geometry(format!(
                "sector data is {} bytes, sector size is {}",
                data.len(),
                size
            )));
        }
        let mut buffer = data.to_vec();
        buffer.resize(size, 0);

        self.changed = true;
        match self.layout {
            Layout::Dmk { track_length } => {
                let geometry = self.geometry;
                dmk::write_sector(self.source.as_mut(), &geometry, track_length, chs, &buffer)
            }
            _ => {
                let offset = self.sector_offset(chs)?;
                self.source.write_at(offset, &buffer)
            }
        }
    }

    /// Read `count` consecutive sectors starting at `start`
    ///
    /// Runs continue across heads and tracks and fail past the last track.
    pub fn read_sectors(&mut self, start: Chs, count: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(count * self.geometry.sector_size as usize);
        let mut chs = Some(start);
        for _ in 0..count {
            let at = chs.ok_or(DiskError::OutOfRange {
                track: self.geometry.tracks,
                head: 0,
                sector: 1,
            })?;
            data.extend_from_slice(&self.read_sector(at.track, at.head, at.sector)?);
            chs = self.geometry.next(at);
        }
        Ok(data)
    }

    /// Write consecutive sectors starting at `start`
    pub fn write_sectors(&mut self, start: Chs, data: &[u8]) -> Result<()> {
        let size = self.geometry.sector_size as usize;
        let mut chs = Some(start);
        for chunk in data.chunks(size) {
            let at = chs.ok_or(DiskError::OutOfRange {
                track: self.geometry.tracks,
                head: 0,
                sector: 1,
            })?;
            self.write_sector(at.track, at.head, at.sector, chunk)?;
            chs = self.geometry.next(at);
        }
        Ok(())
    }

    /// Read a sector by logical sector number
    pub fn read_lsn(&mut self, lsn: u32) -> Result<Vec<u8>> {
        let chs = self.geometry.lsn_to_chs(lsn)?;
        self.read_sector(chs.track, chs.head, chs.sector)
    }

    /// Write a sector by logical sector number
    pub fn write_lsn(&mut self, lsn: u32, data: &[u8]) -> Result<()> {
        let chs = self.geometry.lsn_to_chs(lsn)?;
        self.write_sector(chs.track, chs.head, chs.sector, data)
    }

    /// Read `count` sectors starting at `lsn`
    pub fn read_lsns(&mut self, lsn: u32, count: u32) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(count as usize * self.geometry.sector_size as usize);
        for i in 0..count {
            data.extend_from_slice(&self.read_lsn(lsn + i)?);
        }
        Ok(data)
    }

    /// Write consecutive sectors starting at `lsn`
    pub fn write_lsns(&mut self, lsn: u32, data: &[u8]) -> Result<()> {
        let size = self.geometry.sector_size as usize;
        for (i, chunk) in data.chunks(size).enumerate() {
            self.write_lsn(lsn + i as u32, chunk)?;
        }
        Ok(())
    }

    /// Read raw bytes, ignoring geometry (headers, metadata)
    pub fn read_bytes(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut data = vec![0u8; len];
        self.source.read_at(offset, &mut data)?;
        Ok(data)
    }

    /// Write raw bytes, ignoring geometry
    pub fn write_bytes(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.changed = true;
        self.source.write_at(offset, data)
    }

    /// Check the stored data CRC of a DMK sector
    ///
    /// Sector reads never verify the CRC; this is an explicit integrity check.
    pub fn verify_sector_crc(&mut self, track: u16, head: u8, sector: u16) -> Result<bool> {
        self.ensure_valid()?;
        match self.layout {
            Layout::Dmk { track_length } => {
                let geometry = self.geometry;
                dmk::verify_sector_crc(
                    self.source.as_mut(),
                    &geometry,
                    track_length,
                    Chs::new(track, head, sector),
                )
            }
            _ => Err(DiskError::NotImplemented(
                "CRC verification on images without stored CRCs",
            )),
        }
    }

    /// Push pending writes to the backing store
    pub fn flush(&mut self) -> Result<()> {
        self.source.flush()?;
        self.changed = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_jvc() -> DiskImage {
        DiskImage::builder()
            .image_type(DiskImageType::Jvc)
            .spec(FormatSpec::rsdos_35())
            .build()
            .unwrap()
    }

    #[test]
    fn test_read_write_sector() {
        let mut image = blank_jvc();

        let test_data = vec![0x42; 256];
        image.write_sector(17, 0, 3, &test_data).unwrap();

        let read_data = image.read_sector(17, 0, 3).unwrap();
        assert_eq!(read_data, test_data);
        assert_eq!(image.read_lsn(17 * 18 + 2).unwrap(), test_data);
        assert!(image.is_changed());
    }

    #[test]
    fn test_short_write_is_padded() {
        let mut image = blank_jvc();
        image.write_sector(0, 0, 1, &[1, 2, 3]).unwrap();

        let data = image.read_sector(0, 0, 1).unwrap();
        assert_eq!(&data[..3], &[1, 2, 3]);
        assert!(data[3..].iter().all(|&b| b == 0));
        assert!(image.write_sector(0, 0, 1, &[0; 257]).is_err());
    }

    #[test]
    fn test_out_of_range_sector() {
        let mut image = blank_jvc();
        assert!(matches!(
            image.read_sector(35, 0, 1),
            Err(DiskError::OutOfRange { track: 35, .. })
        ));
        assert!(image.read_sector(0, 1, 1).is_err());
        assert!(image.read_sector(0, 0, 0).is_err());
        assert!(image.read_lsn(630).is_err());
    }

    #[test]
    fn test_sector_runs_cross_tracks() {
        let mut image = blank_jvc();
        let data: Vec<u8> = (0..3 * 256).map(|i| (i / 256) as u8 + 1).collect();
        image.write_sectors(Chs::new(0, 0, 17), &data).unwrap();

        assert_eq!(image.read_sector(1, 0, 1).unwrap(), vec![3; 256]);
        assert_eq!(image.read_sectors(Chs::new(0, 0, 17), 3).unwrap(), data);
    }

    #[test]
    fn test_sector_run_past_end_fails() {
        let mut image = blank_jvc();
        assert!(image.read_sectors(Chs::new(34, 0, 18), 2).is_err());
    }

    #[test]
    fn test_invalid_image_refuses_io() {
        // 100 bytes of header is not a JVC image
        let mut image = DiskImage::from_bytes(vec![0; 100 + 256 * 18], DiskImageType::Jvc).unwrap();
        assert!(!image.is_valid());
        assert!(matches!(
            image.read_sector(0, 0, 1),
            Err(DiskError::InvalidImage(_))
        ));
        assert!(image.write_sector(0, 0, 1, &[0; 256]).is_err());
    }

    #[test]
    fn test_select_partition_on_floppy() {
        let mut image = blank_jvc();
        assert_eq!(image.partitions(), 1);
        assert!(image.select_partition(0).is_ok());
        assert!(matches!(
            image.select_partition(1),
            Err(DiskError::InvalidPartition { index: 1, count: 1 })
        ));
    }

    #[test]
    fn test_crc_check_needs_dmk() {
        let mut image = blank_jvc();
        assert!(matches!(
            image.verify_sector_crc(0, 0, 1),
            Err(DiskError::NotImplemented(_))
        ));
    }
}
