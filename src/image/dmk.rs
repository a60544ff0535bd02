use super::{Layout, Probe};
use crate::crc16::{crc16, DATA_CRC_SEED, ID_CRC_SEED};
use crate::error::{DiskError, Result};
use crate::format::{
    FormatSpec, DATA_ADDRESS_MARK, DMK_DATA_OFFSET, DMK_DEFAULT_TRACK_LENGTH,
    DMK_DOUBLE_DENSITY, DMK_HEADER_SIZE, DMK_IDAM_ENTRIES, DMK_IDAM_IN_PREAMBLE,
    DMK_IDAM_OFFSET_MASK, DMK_IDAM_TABLE_SIZE, DMK_POSTAMBLE_SIZE, DMK_PREAMBLE_SIZE,
    DMK_TRACK_GAP, ID_ADDRESS_MARK, MFM_GAP, MFM_SYNC, SECTORS_PER_TRACK,
};
use crate::geometry::{Chs, Geometry};
use crate::io::ByteSource;
use log::{debug, trace};

const SINGLE_SIDED: u8 = 0x10;

/// Decoded 16-byte DMK header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmkHeader {
    /// Write protect flag
    pub write_protected: bool,
    /// Tracks per side
    pub tracks: u8,
    /// Bytes per track including the IDAM table
    pub track_length: u16,
    /// Option flags; bit 4 marks a single-sided image
    pub options: u8,
}

impl DmkHeader {
    /// Decode the first 16 bytes of an image
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DMK_HEADER_SIZE as usize {
            return Err(DiskError::invalid_image("DMK header is truncated"));
        }
        let track_length = match u16::from_le_bytes([bytes[2], bytes[3]]) {
            0 => DMK_DEFAULT_TRACK_LENGTH,
            n => n,
        };
        Ok(Self {
            write_protected: bytes[0] == 0xFF,
            tracks: bytes[1],
            track_length,
            options: bytes[4],
        })
    }

    /// Encode into the 16-byte header
    pub fn encode(&self) -> [u8; DMK_HEADER_SIZE as usize] {
        let mut bytes = [0u8; DMK_HEADER_SIZE as usize];
        bytes[0] = if self.write_protected { 0xFF } else { 0 };
        bytes[1] = self.tracks;
        bytes[2..4].copy_from_slice(&self.track_length.to_le_bytes());
        bytes[4] = self.options;
        bytes
    }

    /// Sides recorded in the option flags
    pub fn heads(&self) -> u8 {
        if self.options & SINGLE_SIDED != 0 {
            1
        } else {
            2
        }
    }
}

fn track_offset(geometry: &Geometry, track_length: u16, track: u16, head: u8) -> u64 {
    DMK_HEADER_SIZE
        + (track as u64 * geometry.heads as u64 + head as u64) * track_length as u64
}

fn read_track(
    source: &mut dyn ByteSource,
    geometry: &Geometry,
    track_length: u16,
    track: u16,
    head: u8,
) -> Result<Vec<u8>> {
    let mut data = vec![0u8; track_length as usize];
    source.read_at(track_offset(geometry, track_length, track, head), &mut data)?;
    Ok(data)
}

/// ID address mark offsets listed in a track's IDAM table
fn idam_offsets(track: &[u8]) -> impl Iterator<Item = usize> + '_ {
    track[..DMK_IDAM_TABLE_SIZE]
        .chunks_exact(2)
        .take(DMK_IDAM_ENTRIES)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]) & DMK_IDAM_OFFSET_MASK)
        .take_while(|&offset| offset != 0)
        .map(|offset| offset as usize)
}

/// Offset of the data field of `chs` within its track buffer
fn find_sector(track: &[u8], chs: Chs) -> Result<usize> {
    for idam in idam_offsets(track) {
        let Some(id) = track.get(idam..idam + 5) else {
            continue;
        };
        trace!("IDAM at {:#x}: {:02x?}", idam, id);
        if id[0] == ID_ADDRESS_MARK
            && id[1] as u16 == chs.track
            && id[2] == chs.head
            && id[3] as u16 == chs.sector
        {
            return Ok(idam + DMK_DATA_OFFSET);
        }
    }
    Err(DiskError::SectorNotFound {
        track: chs.track,
        head: chs.head,
        sector: chs.sector,
    })
}

fn locate(
    source: &mut dyn ByteSource,
    geometry: &Geometry,
    track_length: u16,
    chs: Chs,
) -> Result<u64> {
    if !geometry.contains(chs) {
        return Err(DiskError::OutOfRange {
            track: chs.track,
            head: chs.head,
            sector: chs.sector,
        });
    }
    let track = read_track(source, geometry, track_length, chs.track, chs.head)?;
    let data = find_sector(&track, chs)?;
    if data + geometry.sector_size as usize + 2 > track.len() {
        return Err(DiskError::parse(
            track_offset(geometry, track_length, chs.track, chs.head) + data as u64,
            "sector data runs past the end of the track",
        ));
    }
    Ok(track_offset(geometry, track_length, chs.track, chs.head) + data as u64)
}

/// Read the data field of a sector located through its ID address mark
pub(crate) fn read_sector(
    source: &mut dyn ByteSource,
    geometry: &Geometry,
    track_length: u16,
    chs: Chs,
) -> Result<Vec<u8>> {
    let offset = locate(source, geometry, track_length, chs)?;
    let mut data = vec![0u8; geometry.sector_size as usize];
    source.read_at(offset, &mut data)?;
    Ok(data)
}

/// Overwrite a sector's data field and store its CRC big-endian after it
pub(crate) fn write_sector(
    source: &mut dyn ByteSource,
    geometry: &Geometry,
    track_length: u16,
    chs: Chs,
    data: &[u8],
) -> Result<()> {
    let offset = locate(source, geometry, track_length, chs)?;
    let mut field = data.to_vec();
    field.extend_from_slice(&crc16(DATA_CRC_SEED, data).to_be_bytes());
    source.write_at(offset, &field)
}

/// Compare a sector's stored CRC with one computed from its data
pub(crate) fn verify_sector_crc(
    source: &mut dyn ByteSource,
    geometry: &Geometry,
    track_length: u16,
    chs: Chs,
) -> Result<bool> {
    let offset = locate(source, geometry, track_length, chs)?;
    let size = geometry.sector_size as usize;
    let mut field = vec![0u8; size + 2];
    source.read_at(offset, &mut field)?;
    let stored = u16::from_be_bytes([field[size], field[size + 1]]);
    Ok(stored == crc16(DATA_CRC_SEED, &field[..size]))
}

/// Derive geometry from the header and the IDAM table of track 0
pub(crate) fn probe(source: &mut dyn ByteSource) -> Result<Probe> {
    let len = source.len();
    let header_length = len % 256;
    if header_length > DMK_HEADER_SIZE {
        return Err(DiskError::invalid_image(format!(
            "DMK header of {} bytes is too long",
            header_length
        )));
    }
    if len < DMK_HEADER_SIZE {
        return Err(DiskError::invalid_image("DMK header is missing"));
    }

    let mut bytes = [0u8; DMK_HEADER_SIZE as usize];
    source.read_at(0, &mut bytes)?;
    let header = DmkHeader::decode(&bytes)?;
    if header.tracks == 0 {
        return Err(DiskError::invalid_image("DMK header records no tracks"));
    }
    if (header.track_length as usize) < DMK_IDAM_TABLE_SIZE {
        return Err(DiskError::invalid_image("DMK track is shorter than its IDAM table"));
    }

    let heads = header.heads();
    let expected =
        DMK_HEADER_SIZE + header.tracks as u64 * heads as u64 * header.track_length as u64;
    if len != expected {
        return Err(DiskError::invalid_image(format!(
            "DMK image is {} bytes, header describes {}",
            len, expected
        )));
    }

    // Sector count and size come from the first track's ID fields
    let mut track = vec![0u8; header.track_length as usize];
    source.read_at(DMK_HEADER_SIZE, &mut track)?;
    let ids: Vec<usize> = idam_offsets(&track)
        .filter(|&idam| track.get(idam) == Some(&ID_ADDRESS_MARK))
        .collect();
    let sectors_per_track = match ids.len() {
        0 => SECTORS_PER_TRACK,
        n => n as u16,
    };
    let sector_size = ids
        .first()
        .and_then(|&idam| track.get(idam + 4))
        .map_or(256, |&code| 128u16 << (code & 0x03));

    let geometry = Geometry::new(header.tracks as u16, heads, sectors_per_track, sector_size);
    debug!("DMK track length {:#x}, {}", header.track_length, geometry);

    Ok(Probe {
        geometry,
        header_length: DMK_HEADER_SIZE,
        layout: Layout::Dmk {
            track_length: header.track_length,
        },
    })
}

/// Slot order of sectors on a track for an interleave factor
///
/// Each sector goes `interleave` slots past the previous one, moving on to
/// the next free slot when that one is taken.
pub fn interleave_table(sectors: u16, interleave: u8) -> Vec<u16> {
    let count = sectors as usize;
    let step = interleave.max(1) as usize;
    let mut slots = vec![0u16; count];
    let mut pos = 0;
    for sector in 1..=sectors {
        while slots[pos] != 0 {
            pos = (pos + 1) % count;
        }
        slots[pos] = sector;
        pos = (pos + step) % count;
    }
    slots
}

/// Bytes one formatted sector occupies
fn sector_stride(sector_size: u16) -> usize {
    DMK_PREAMBLE_SIZE + sector_size as usize + DMK_POSTAMBLE_SIZE
}

/// Build one low-level formatted MFM track
pub fn format_track(
    track: u16,
    head: u8,
    geometry: &Geometry,
    track_length: u16,
    interleave: u8,
    filler_byte: u8,
) -> Result<Vec<u8>> {
    let spt = geometry.sectors_per_track;
    let size = geometry.sector_size as usize;
    let stride = sector_stride(geometry.sector_size);
    let start = DMK_IDAM_TABLE_SIZE + DMK_TRACK_GAP;

    if spt as usize > DMK_IDAM_ENTRIES {
        return Err(DiskError::geometry(format!(
            "DMK tracks hold at most {} sectors",
            DMK_IDAM_ENTRIES
        )));
    }
    if start + spt as usize * stride > track_length as usize {
        return Err(DiskError::geometry(format!(
            "{} sectors of {} bytes do not fit a {}-byte DMK track",
            spt, size, track_length
        )));
    }
    let size_code = match geometry.sector_size {
        128 => 0u8,
        256 => 1,
        512 => 2,
        1024 => 3,
        other => {
            return Err(DiskError::geometry(format!(
                "DMK cannot store {}-byte sectors",
                other
            )))
        }
    };
    let track_id = u8::try_from(track)
        .map_err(|_| DiskError::geometry(format!("track {} has no DMK id", track)))?;

    let mut data = vec![MFM_GAP; track_length as usize];
    data[..DMK_IDAM_TABLE_SIZE].fill(0);

    let payload = vec![filler_byte; size];
    let data_crc = crc16(DATA_CRC_SEED, &payload);

    for (slot, &sector) in interleave_table(spt, interleave).iter().enumerate() {
        let base = start + slot * stride;
        let idam = base + DMK_IDAM_IN_PREAMBLE;
        let pointer = DMK_DOUBLE_DENSITY | idam as u16;
        data[slot * 2..slot * 2 + 2].copy_from_slice(&pointer.to_le_bytes());

        let preamble = &mut data[base..base + DMK_PREAMBLE_SIZE];
        preamble[..8].fill(0x00);
        preamble[8..0x0B].fill(MFM_SYNC);
        let id = [ID_ADDRESS_MARK, track_id, head, sector as u8, size_code];
        preamble[0x0B..0x10].copy_from_slice(&id);
        preamble[0x10..0x12].copy_from_slice(&crc16(ID_CRC_SEED, &id).to_be_bytes());
        preamble[0x28..0x34].fill(0x00);
        preamble[0x34..0x37].fill(MFM_SYNC);
        preamble[0x37] = DATA_ADDRESS_MARK;

        let field = base + DMK_PREAMBLE_SIZE;
        data[field..field + size].copy_from_slice(&payload);
        data[field + size..field + size + 2].copy_from_slice(&data_crc.to_be_bytes());
    }
    Ok(data)
}

/// Write a low-level formatted DMK image for `spec` into an empty source
pub(crate) fn create(source: &mut dyn ByteSource, spec: &FormatSpec) -> Result<Probe> {
    let geometry = spec.geometry();
    geometry.validate()?;
    let tracks = u8::try_from(spec.num_tracks).map_err(|_| {
        DiskError::geometry(format!("DMK cannot store {} tracks", spec.num_tracks))
    })?;
    if spec.num_sides > 2 {
        return Err(DiskError::geometry("DMK images have one or two sides"));
    }

    let header = DmkHeader {
        write_protected: false,
        tracks,
        track_length: DMK_DEFAULT_TRACK_LENGTH,
        options: if spec.num_sides == 1 { SINGLE_SIDED } else { 0 },
    };
    source.set_len(
        DMK_HEADER_SIZE + geometry.tracks as u64 * geometry.heads as u64 * header.track_length as u64,
    )?;
    source.write_at(0, &header.encode())?;

    for track in 0..geometry.tracks {
        for head in 0..geometry.heads {
            let data = format_track(
                track,
                head,
                &geometry,
                header.track_length,
                spec.interleave,
                spec.filler_byte,
            )?;
            source.write_at(track_offset(&geometry, header.track_length, track, head), &data)?;
        }
    }

    Ok(Probe {
        geometry,
        header_length: DMK_HEADER_SIZE,
        layout: Layout::Dmk {
            track_length: header.track_length,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;

    fn formatted(spec: &FormatSpec) -> (MemorySource, Probe) {
        let mut source = MemorySource::default();
        let probe = create(&mut source, spec).unwrap();
        (source, probe)
    }

    #[test]
    fn test_interleave_table_covers_every_sector() {
        for interleave in 1..=6 {
            let mut table = interleave_table(18, interleave);
            table.sort_unstable();
            assert_eq!(table, (1..=18).collect::<Vec<u16>>());
        }
        assert_eq!(interleave_table(4, 1), vec![1, 2, 3, 4]);
        assert_eq!(interleave_table(4, 2), vec![1, 3, 2, 4]);
    }

    #[test]
    fn test_idam_table_layout() {
        let geometry = Geometry::new(35, 1, 18, 256);
        let track = format_track(3, 0, &geometry, DMK_DEFAULT_TRACK_LENGTH, 1, 0).unwrap();

        assert_eq!(u16::from_le_bytes([track[0], track[1]]), 0x80AB);
        assert_eq!(u16::from_le_bytes([track[2], track[3]]), 0x80AB + 338);
        assert_eq!(&track[36..38], &[0, 0]);
        assert_eq!(&track[0xAB..0xB0], &[0xFE, 3, 0, 1, 1]);
        assert_eq!(track[0xAB + 44], DATA_ADDRESS_MARK);
        assert!(track[128..160].iter().all(|&b| b == MFM_GAP));
    }

    #[test]
    fn test_formatted_data_crc() {
        let geometry = Geometry::new(35, 1, 18, 256);
        let track = format_track(0, 0, &geometry, DMK_DEFAULT_TRACK_LENGTH, 1, 0).unwrap();
        let data = 0xAB + DMK_DATA_OFFSET;
        assert_eq!(&track[data + 256..data + 258], &[0xE1, 0x22]);
    }

    #[test]
    fn test_id_crc_matches_full_mark() {
        let geometry = Geometry::new(35, 1, 18, 256);
        let track = format_track(5, 0, &geometry, DMK_DEFAULT_TRACK_LENGTH, 1, 0).unwrap();
        let idam = 0xAB;
        let mut mark = vec![MFM_SYNC; 3];
        mark.extend_from_slice(&track[idam..idam + 5]);
        let stored = u16::from_be_bytes([track[idam + 5], track[idam + 6]]);
        assert_eq!(crc16(0xFFFF, &mark), stored);
    }

    #[test]
    fn test_probe_formatted_image() {
        let (mut source, created) = formatted(&FormatSpec::rsdos_35());
        let probed = probe(&mut source).unwrap();
        assert_eq!(probed.geometry, created.geometry);
        assert_eq!(probed.geometry, Geometry::new(35, 1, 18, 256));
        assert_eq!(source.len(), 16 + 35 * 0x1900);
    }

    #[test]
    fn test_read_write_through_idams() {
        let spec = FormatSpec::rsdos_35();
        let (mut source, probe) = formatted(&spec);
        let geometry = probe.geometry;
        let chs = Chs::new(17, 0, 18);

        assert_eq!(
            read_sector(&mut source, &geometry, 0x1900, chs).unwrap(),
            vec![0xFF; 256]
        );
        let payload: Vec<u8> = (0..=255).collect();
        write_sector(&mut source, &geometry, 0x1900, chs, &payload).unwrap();
        assert_eq!(read_sector(&mut source, &geometry, 0x1900, chs).unwrap(), payload);
        assert!(verify_sector_crc(&mut source, &geometry, 0x1900, chs).unwrap());
    }

    #[test]
    fn test_corrupted_crc_detected() {
        let (mut source, probe) = formatted(&FormatSpec::rsdos_35());
        let geometry = probe.geometry;
        let chs = Chs::new(0, 0, 1);
        assert!(verify_sector_crc(&mut source, &geometry, 0x1900, chs).unwrap());

        let offset = locate(&mut source, &geometry, 0x1900, chs).unwrap();
        source.write_at(offset, &[0x00]).unwrap();
        assert!(!verify_sector_crc(&mut source, &geometry, 0x1900, chs).unwrap());
    }

    #[test]
    fn test_missing_sector_is_not_found() {
        let (mut source, probe) = formatted(&FormatSpec::rsdos_35());
        // A geometry claiming more sectors than were laid down
        let geometry = Geometry::new(probe.geometry.tracks, 1, 20, 256);
        assert!(matches!(
            read_sector(&mut source, &geometry, 0x1900, Chs::new(0, 0, 19)),
            Err(DiskError::SectorNotFound { sector: 19, .. })
        ));
    }

    #[test]
    fn test_header_round_trip() {
        let header = DmkHeader {
            write_protected: false,
            tracks: 40,
            track_length: 0x1900,
            options: SINGLE_SIDED,
        };
        let bytes = header.encode();
        assert_eq!(&bytes[..5], &[0, 40, 0x00, 0x19, 0x10]);
        assert_eq!(DmkHeader::decode(&bytes).unwrap(), header);
        assert_eq!(header.heads(), 1);
    }

    #[test]
    fn test_length_mismatch_is_invalid() {
        let (source, _) = formatted(&FormatSpec::rsdos_35());
        let mut data = source.into_inner();
        data.truncate(data.len() - 0x1900);
        assert!(probe(&mut MemorySource::new(data)).is_err());
    }

    #[test]
    fn test_oversized_track_rejected() {
        let geometry = Geometry::new(35, 1, 20, 256);
        assert!(format_track(0, 0, &geometry, DMK_DEFAULT_TRACK_LENGTH, 1, 0).is_err());
    }
}
