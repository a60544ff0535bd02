use super::Probe;
use crate::error::{DiskError, Result};
use crate::format::{FormatSpec, SECTORS_PER_TRACK, SECTOR_SIZE, VDK_HEADER_SIZE, VDK_SIGNATURE};
use crate::geometry::Geometry;
use crate::io::ByteSource;

/// Longest header a VDK image may carry
const VDK_MAX_HEADER: u64 = 12;

/// Build the 12-byte header written on create
pub fn encode_header(tracks: u8, heads: u8) -> [u8; VDK_HEADER_SIZE as usize] {
    let mut header = [0u8; VDK_HEADER_SIZE as usize];
    header[..2].copy_from_slice(VDK_SIGNATURE);
    header[2..4].copy_from_slice(&(VDK_HEADER_SIZE as u16).to_le_bytes());
    header[4] = 0x10;
    header[5] = 0x10;
    header[7] = 0x10;
    header[8] = tracks;
    header[9] = heads;
    header
}

/// Validate the header and derive geometry
///
/// VDK images always use 18 sectors of 256 bytes per track.
pub(crate) fn probe(source: &mut dyn ByteSource) -> Result<Probe> {
    let len = source.len();
    let header_length = len % 256;
    if header_length > VDK_MAX_HEADER {
        return Err(DiskError::invalid_image(format!(
            "VDK header of {} bytes is too long",
            header_length
        )));
    }
    if header_length < 10 {
        return Err(DiskError::invalid_image("VDK header is missing"));
    }

    let mut header = vec![0u8; header_length as usize];
    source.read_at(0, &mut header)?;

    if &header[..2] != VDK_SIGNATURE {
        return Err(DiskError::invalid_image("missing VDK signature"));
    }
    let stored = u16::from_le_bytes([header[2], header[3]]) as u64;
    if stored != header_length {
        return Err(DiskError::invalid_image(format!(
            "VDK header length {} does not match file layout ({})",
            stored, header_length
        )));
    }
    if header_length > 5 && header[5] != 0x10 {
        return Err(DiskError::invalid_image("unexpected VDK source version"));
    }
    if header_length > 11 && header[11] != 0 {
        return Err(DiskError::invalid_image("VDK images with a name are not supported"));
    }

    let tracks = header[8] as u16;
    let heads = header[9];
    let geometry = Geometry::new(tracks, heads, SECTORS_PER_TRACK, SECTOR_SIZE as u16);
    geometry
        .validate()
        .map_err(|e| DiskError::invalid_image(e.to_string()))?;
    if len != header_length + geometry.total_bytes() {
        return Err(DiskError::invalid_image(format!(
            "VDK image is {} bytes, header describes {}",
            len,
            header_length + geometry.total_bytes()
        )));
    }

    Ok(Probe::linear(geometry, header_length))
}

/// Write a blank VDK image for `spec` into an empty source
pub(crate) fn create(source: &mut dyn ByteSource, spec: &FormatSpec) -> Result<Probe> {
    if spec.sectors_per_track != SECTORS_PER_TRACK || spec.sector_size != SECTOR_SIZE as u16 {
        return Err(DiskError::geometry(
            "VDK images hold 18 sectors of 256 bytes per track",
        ));
    }
    let tracks = u8::try_from(spec.num_tracks).map_err(|_| {
        DiskError::geometry(format!("VDK cannot store {} tracks", spec.num_tracks))
    })?;
    let geometry = spec.geometry();
    geometry.validate()?;

    source.set_len(VDK_HEADER_SIZE + geometry.total_bytes())?;
    source.write_at(0, &encode_header(tracks, spec.num_sides))?;
    super::fill_tracks(source, VDK_HEADER_SIZE, &geometry, spec.filler_byte)?;

    Ok(Probe::linear(geometry, VDK_HEADER_SIZE))
}
