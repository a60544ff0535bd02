use super::{Layout, Probe};
use crate::error::{DiskError, Result};
use crate::format::{
    bytes_to_jvc_size, jvc_size_to_bytes, FormatSpec, JVC_MAX_HEADER, MIN_FLOPPY_TRACKS,
    SECTORS_PER_TRACK,
};
use crate::geometry::Geometry;
use crate::io::ByteSource;
use log::debug;

/// Fields of a JVC header; missing bytes take their defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JvcHeader {
    /// Sectors per track (default 18)
    pub sectors_per_track: u8,
    /// Sides (default 1)
    pub heads: u8,
    /// Sector size in bytes (default 256)
    pub sector_size: u16,
    /// ID of the first sector on each track (default 1)
    pub first_sector_id: u8,
    /// Sector attribute flag (default 0)
    pub attribute_flag: u8,
}

impl Default for JvcHeader {
    fn default() -> Self {
        Self {
            sectors_per_track: SECTORS_PER_TRACK as u8,
            heads: 1,
            sector_size: 256,
            first_sector_id: 1,
            attribute_flag: 0,
        }
    }
}

impl JvcHeader {
    /// Decode a header of 0 to 5 bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() as u64 > JVC_MAX_HEADER {
            return Err(DiskError::invalid_image(format!(
                "JVC header of {} bytes is too long",
                bytes.len()
            )));
        }

        let mut header = Self::default();
        if let Some(&spt) = bytes.first() {
            header.sectors_per_track = spt;
        }
        if let Some(&heads) = bytes.get(1) {
            header.heads = heads;
        }
        if let Some(&code) = bytes.get(2) {
            header.sector_size = jvc_size_to_bytes(code).ok_or_else(|| {
                DiskError::invalid_image(format!("JVC sector size code {} is not supported", code))
            })?;
        }
        if let Some(&first) = bytes.get(3) {
            header.first_sector_id = first;
        }
        if let Some(&attribute) = bytes.get(4) {
            header.attribute_flag = attribute;
        }

        if header.sectors_per_track == 0 || header.heads == 0 {
            return Err(DiskError::invalid_image("JVC header has a zero dimension"));
        }
        Ok(header)
    }

    /// Encode the shortest header that records every non-default field
    pub fn encode(&self) -> Result<Vec<u8>> {
        let size_code = bytes_to_jvc_size(self.sector_size).ok_or_else(|| {
            DiskError::geometry(format!(
                "JVC cannot store {}-byte sectors",
                self.sector_size
            ))
        })?;
        let defaults = Self::default();
        let full = [
            self.sectors_per_track,
            self.heads,
            size_code,
            self.first_sector_id,
            self.attribute_flag,
        ];

        let length = if self.attribute_flag != defaults.attribute_flag {
            5
        } else if self.first_sector_id != defaults.first_sector_id {
            4
        } else if self.sector_size != defaults.sector_size {
            3
        } else if self.heads != defaults.heads {
            2
        } else if self.sectors_per_track != defaults.sectors_per_track {
            1
        } else {
            0
        };
        Ok(full[..length].to_vec())
    }

    /// Header describing a format specification
    pub fn from_spec(spec: &FormatSpec) -> Result<Self> {
        let sectors_per_track = u8::try_from(spec.sectors_per_track).map_err(|_| {
            DiskError::geometry(format!(
                "JVC cannot store {} sectors per track",
                spec.sectors_per_track
            ))
        })?;
        Ok(Self {
            sectors_per_track,
            heads: spec.num_sides,
            sector_size: spec.sector_size,
            first_sector_id: spec.first_sector_id,
            attribute_flag: 0,
        })
    }
}

/// Derive geometry from the header and file length
///
/// The header length is the file length modulo 256. Images shorter than
/// 35 tracks are grown to 35.
pub(crate) fn probe(source: &mut dyn ByteSource) -> Result<Probe> {
    let len = source.len();
    let header_length = len % 256;
    if header_length > JVC_MAX_HEADER {
        return Err(DiskError::invalid_image(format!(
            "JVC header of {} bytes is too long",
            header_length
        )));
    }

    let mut bytes = vec![0u8; header_length as usize];
    source.read_at(0, &mut bytes)?;
    let header = JvcHeader::decode(&bytes)?;

    let sector_size = header.sector_size as u64;
    let track_bytes = header.sectors_per_track as u64 * sector_size;
    let data = len - header_length;
    if data % sector_size != 0 {
        return Err(DiskError::invalid_image("JVC image ends in a partial sector"));
    }

    let mut tracks = data / track_bytes / header.heads as u64;
    if tracks < MIN_FLOPPY_TRACKS as u64 {
        debug!("Growing JVC image from {} to {} tracks", tracks, MIN_FLOPPY_TRACKS);
        tracks = MIN_FLOPPY_TRACKS as u64;
        source.set_len(header_length + tracks * header.heads as u64 * track_bytes)?;
    }
    let tracks = u16::try_from(tracks)
        .map_err(|_| DiskError::invalid_image(format!("{} tracks is too many", tracks)))?;

    let geometry = Geometry::new(
        tracks,
        header.heads,
        header.sectors_per_track as u16,
        header.sector_size,
    );
    Ok(Probe {
        geometry,
        header_length,
        layout: Layout::Jvc(header),
    })
}

/// Write a blank JVC image for `spec` into an empty source
pub(crate) fn create(source: &mut dyn ByteSource, spec: &FormatSpec) -> Result<Probe> {
    let header = JvcHeader::from_spec(spec)?;
    let bytes = header.encode()?;
    let geometry = spec.geometry();
    geometry.validate()?;

    let header_length = bytes.len() as u64;
    source.set_len(header_length + geometry.total_bytes())?;
    source.write_at(0, &bytes)?;
    super::fill_tracks(source, header_length, &geometry, spec.filler_byte)?;

    Ok(Probe {
        geometry,
        header_length,
        layout: Layout::Jvc(header),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;

    #[test]
    fn test_headerless_image() {
        let mut source = MemorySource::with_len(35 * 18 * 256);
        let probe = probe(&mut source).unwrap();
        assert_eq!(probe.geometry, Geometry::new(35, 1, 18, 256));
        assert_eq!(probe.header_length, 0);
    }

    #[test]
    fn test_two_byte_header() {
        let mut data = vec![18, 2];
        data.resize(2 + 40 * 2 * 18 * 256, 0);
        let mut source = MemorySource::new(data);
        let probe = probe(&mut source).unwrap();
        assert_eq!(probe.geometry, Geometry::new(40, 2, 18, 256));
        assert_eq!(probe.header_length, 2);
    }

    #[test]
    fn test_header_too_long() {
        let mut source = MemorySource::with_len(6 + 35 * 18 * 256);
        assert!(matches!(probe(&mut source), Err(DiskError::InvalidImage(_))));
    }

    #[test]
    fn test_zero_field_is_invalid() {
        let mut data = vec![0u8];
        data.resize(1 + 35 * 18 * 256, 0);
        assert!(probe(&mut MemorySource::new(data)).is_err());
    }

    #[test]
    fn test_partial_sector_is_invalid() {
        // 512-byte sectors with a trailing half sector
        let mut data = vec![18, 1, 2];
        data.resize(3 + 35 * 18 * 512 + 256, 0);
        assert_eq!(data.len() % 256, 3);
        assert!(probe(&mut MemorySource::new(data)).is_err());
    }

    #[test]
    fn test_short_image_is_grown() {
        let mut source = MemorySource::with_len(10 * 18 * 256);
        let probe = probe(&mut source).unwrap();
        assert_eq!(probe.geometry.tracks, 35);
        assert_eq!(source.len(), 35 * 18 * 256);
    }

    #[test]
    fn test_encode_shortest_header() {
        assert!(JvcHeader::default().encode().unwrap().is_empty());

        let header = JvcHeader {
            heads: 2,
            ..JvcHeader::default()
        };
        assert_eq!(header.encode().unwrap(), vec![18, 2]);

        let header = JvcHeader {
            sector_size: 512,
            ..JvcHeader::default()
        };
        assert_eq!(header.encode().unwrap(), vec![18, 1, 2]);

        let header = JvcHeader {
            first_sector_id: 0,
            ..JvcHeader::default()
        };
        let bytes = header.encode().unwrap();
        assert_eq!(bytes, vec![18, 1, 1, 0]);
        assert_eq!(JvcHeader::decode(&bytes).unwrap(), header);
    }

    #[test]
    fn test_create_matches_probe() {
        let mut source = MemorySource::default();
        let created = create(&mut source, &FormatSpec::dragon_40_ds()).unwrap();
        let probed = probe(&mut source).unwrap();
        assert_eq!(created.geometry, probed.geometry);
        assert_eq!(created.header_length, 2);
        assert!(source.data()[2..].iter().all(|&b| b == 0xFF));
    }
}
