use super::Probe;
use crate::error::{DiskError, Result};
use crate::filesystem::os9::Lsn0;
use crate::format::{FormatSpec, SECTOR_SIZE};
use crate::geometry::Geometry;
use crate::io::ByteSource;
use log::debug;

/// Read and decode LSN0 from the start of a source
pub(crate) fn read_lsn0(source: &mut dyn ByteSource) -> Result<Lsn0> {
    if source.len() < SECTOR_SIZE as u64 {
        return Err(DiskError::invalid_image("image is too short to hold LSN0"));
    }
    let mut sector = vec![0u8; SECTOR_SIZE];
    source.read_at(0, &mut sector)?;
    Lsn0::decode(&sector).map_err(|e| DiskError::invalid_image(e.to_string()))
}

/// Geometry of a raw OS-9 volume, taken from LSN0
pub(crate) fn probe_volume(source: &mut dyn ByteSource) -> Result<Probe> {
    let geometry = read_lsn0(source)?.container_geometry()?;
    if source.len() != geometry.total_bytes() {
        return Err(DiskError::invalid_image(format!(
            "OS-9 image is {} bytes, LSN0 describes {}",
            source.len(),
            geometry.total_bytes()
        )));
    }
    Ok(Probe::linear(geometry, 0))
}

/// Geometry of a single-volume hard disk
///
/// A file shorter than the volume is grown to fit; a longer one is rejected.
pub(crate) fn probe_hard_disk(source: &mut dyn ByteSource) -> Result<Probe> {
    let geometry = read_lsn0(source)?.container_geometry()?;
    let expected = geometry.total_bytes();
    let len = source.len();
    if len > expected {
        return Err(DiskError::invalid_image(format!(
            "hard disk image is {} bytes, LSN0 describes {}",
            len, expected
        )));
    }
    if len < expected {
        debug!("Growing hard disk image from {} to {} bytes", len, expected);
        source.set_len(expected)?;
    }
    Ok(Probe::linear(geometry, 0))
}

/// Allocate a blank headerless volume for `spec`
///
/// The result has explicit geometry; LSN0 is written when a filesystem
/// formats the volume.
pub(crate) fn create(source: &mut dyn ByteSource, spec: &FormatSpec) -> Result<Probe> {
    let geometry: Geometry = spec.geometry();
    geometry.validate()?;
    source.set_len(geometry.total_bytes())?;
    super::fill_tracks(source, 0, &geometry, spec.filler_byte)?;
    Ok(Probe::linear(geometry, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::os9::PathDescriptor;
    use crate::io::MemorySource;

    fn volume(tracks: u16, heads: u8, len: usize) -> MemorySource {
        let lsn0 = Lsn0 {
            total_sectors: tracks as u32 * heads as u32 * 18,
            track_size: 18,
            sectors_per_track: 18,
            disk_format: if heads == 2 { 0x03 } else { 0x02 },
            path_descriptor: PathDescriptor {
                cylinders: tracks,
                sides: heads,
                sectors_per_track: 18,
                ..PathDescriptor::default()
            },
            ..Lsn0::default()
        };
        let mut data = lsn0.encode(256);
        data.resize(len, 0);
        MemorySource::new(data)
    }

    #[test]
    fn test_volume_geometry() {
        let mut source = volume(40, 2, 40 * 2 * 18 * 256);
        let probe = probe_volume(&mut source).unwrap();
        assert_eq!(probe.geometry, Geometry::new(40, 2, 18, 256));
    }

    #[test]
    fn test_volume_length_must_match() {
        let mut source = volume(40, 2, 40 * 2 * 18 * 256 - 256);
        assert!(probe_volume(&mut source).is_err());
    }

    #[test]
    fn test_blank_volume_is_invalid() {
        let mut source = MemorySource::with_len(35 * 18 * 256);
        assert!(matches!(
            probe_volume(&mut source),
            Err(DiskError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_hard_disk_grows() {
        let mut source = volume(40, 1, 4096);
        let probe = probe_hard_disk(&mut source).unwrap();
        assert_eq!(probe.geometry.total_sectors(), 720);
        assert_eq!(source.len(), 720 * 256);
    }

    #[test]
    fn test_hard_disk_too_long() {
        let mut source = volume(40, 1, 720 * 256 + 256);
        assert!(probe_hard_disk(&mut source).is_err());
    }
}
