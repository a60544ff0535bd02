/// Container and filesystem layout constants

/// Standard sector size for every supported filesystem
pub const SECTOR_SIZE: usize = 256;

/// Sectors per track on Dragon and CoCo floppies
pub const SECTORS_PER_TRACK: u16 = 18;

/// Track count assumed for headerless images too short to hold 35 tracks
pub const MIN_FLOPPY_TRACKS: u16 = 35;

/// Longest JVC header (spt, heads, size code, first sector, attribute flag)
pub const JVC_MAX_HEADER: u64 = 5;

/// VDK signature bytes
pub const VDK_SIGNATURE: &[u8] = b"dk";

/// VDK header length written on create
pub const VDK_HEADER_SIZE: u64 = 12;

/// DMK header length
pub const DMK_HEADER_SIZE: u64 = 16;

/// Default DMK track length (6400 bytes)
pub const DMK_DEFAULT_TRACK_LENGTH: u16 = 0x1900;

/// Bytes in the IDAM pointer table at the start of each DMK track
pub const DMK_IDAM_TABLE_SIZE: usize = 128;

/// Number of IDAM pointers in the table
pub const DMK_IDAM_ENTRIES: usize = 64;

/// IDAM pointers are 14-bit offsets; bit 15 flags double density
pub const DMK_IDAM_OFFSET_MASK: u16 = 0x7FFF;

/// Double density flag in an IDAM pointer
pub const DMK_DOUBLE_DENSITY: u16 = 0x8000;

/// Distance from an ID address mark to the first data byte
pub const DMK_DATA_OFFSET: usize = 45;

/// Bytes each formatted sector occupies in a DMK track
pub const DMK_SECTOR_STRIDE: usize = 338;

/// Gap of 0x4E bytes between the IDAM table and the first sector
pub const DMK_TRACK_GAP: usize = 32;

/// Bytes before the data field in a formatted sector
pub const DMK_PREAMBLE_SIZE: usize = 56;

/// Bytes after the data field in a formatted sector (CRC plus gap)
pub const DMK_POSTAMBLE_SIZE: usize = 26;

/// Offset of the ID address mark inside the sector preamble
pub const DMK_IDAM_IN_PREAMBLE: usize = 0x0B;

/// ID address mark byte
pub const ID_ADDRESS_MARK: u8 = 0xFE;

/// Data address mark byte
pub const DATA_ADDRESS_MARK: u8 = 0xFB;

/// Sync byte written before address marks
pub const MFM_SYNC: u8 = 0xA1;

/// Gap filler byte
pub const MFM_GAP: u8 = 0x4E;

/// Size of one RGB-DOS partition on a partitioned hard disk image
pub const RGBDOS_PARTITION_SIZE: u64 = 0x27600;

/// Tracks in an RGB-DOS partition
pub const RGBDOS_TRACKS: u16 = 35;

/// OS-9 disk format byte identifying a hard disk
pub const OS9_HARD_DISK_FORMAT: u8 = 0x82;

/// RS-DOS directory track
pub const RSDOS_DIRECTORY_TRACK: u16 = 17;

/// RS-DOS granule map sector on the directory track
pub const RSDOS_GRANULE_MAP_SECTOR: u16 = 2;

/// First RS-DOS directory sector
pub const RSDOS_DIRECTORY_SECTOR: u16 = 3;

/// RS-DOS directory sectors
pub const RSDOS_DIRECTORY_SECTORS: u16 = 8;

/// RS-DOS volume label sector on the directory track
pub const RSDOS_LABEL_SECTOR: u16 = 17;

/// Sectors per RS-DOS granule
pub const RSDOS_SECTORS_PER_GRANULE: u16 = 9;

/// Highest granule count addressable by the map
pub const RSDOS_MAX_GRANULES: usize = 0x79;

/// DragonDOS directory track
pub const DRAGONDOS_DIRECTORY_TRACK: u16 = 20;

/// DragonDOS backup directory track
pub const DRAGONDOS_BACKUP_TRACK: u16 = 16;

/// First DragonDOS directory entry sector
pub const DRAGONDOS_DIRECTORY_SECTOR: u16 = 3;

/// DragonDOS directory entry sectors
pub const DRAGONDOS_DIRECTORY_SECTORS: u16 = 16;

/// LSNs covered by the first DragonDOS bitmap sector
pub const DRAGONDOS_BITMAP_SPLIT: u32 = 0x5A0;

/// Offset of the geometry header in the first DragonDOS bitmap sector
pub const DRAGONDOS_HEADER_OFFSET: usize = 0xFC;

/// Convert a JVC sector size code to bytes
#[inline]
pub fn jvc_size_to_bytes(size_code: u8) -> Option<u16> {
    match size_code {
        0..=3 => Some(128 << size_code),
        _ => None,
    }
}

/// Convert a sector size to its JVC size code
#[inline]
pub fn bytes_to_jvc_size(bytes: u16) -> Option<u8> {
    match bytes {
        128 => Some(0),
        256 => Some(1),
        512 => Some(2),
        1024 => Some(3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jvc_size_codes() {
        assert_eq!(jvc_size_to_bytes(0), Some(128));
        assert_eq!(jvc_size_to_bytes(1), Some(256));
        assert_eq!(jvc_size_to_bytes(3), Some(1024));
        assert_eq!(jvc_size_to_bytes(4), None);
        for code in 0..=3 {
            let bytes = jvc_size_to_bytes(code).unwrap();
            assert_eq!(bytes_to_jvc_size(bytes), Some(code));
        }
        assert_eq!(bytes_to_jvc_size(300), None);
    }

    #[test]
    fn test_dmk_slot_fits_default_track() {
        let used = DMK_IDAM_TABLE_SIZE + DMK_TRACK_GAP + 18 * DMK_SECTOR_STRIDE;
        assert!(used <= DMK_DEFAULT_TRACK_LENGTH as usize);
        assert_eq!(DMK_PREAMBLE_SIZE + SECTOR_SIZE + DMK_POSTAMBLE_SIZE, DMK_SECTOR_STRIDE);
        assert_eq!(DMK_IDAM_IN_PREAMBLE + DMK_DATA_OFFSET, DMK_PREAMBLE_SIZE);
    }

    #[test]
    fn test_rgbdos_partition_size() {
        assert_eq!(RGBDOS_PARTITION_SIZE, 35 * 18 * 256);
    }
}
