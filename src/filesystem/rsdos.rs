//! RS-DOS (Disk Extended Color BASIC) filesystem
//!
//! Track 17 holds everything: the granule map in sector 2, the directory in
//! sectors 3 onwards and the volume label in sector 17. Each granule is half a
//! track (9 sectors); the map links granules into per-file chains.

use super::{
    fill_volume, DirEntry, Directory, EntryDetail, FileSystem, FileSystemInfo, FileSystemType,
    FormatProgress,
};
use crate::codec::is_printable_ascii;
use crate::error::{DiskError, Result};
use crate::format::{
    RSDOS_DIRECTORY_SECTOR, RSDOS_DIRECTORY_SECTORS, RSDOS_DIRECTORY_TRACK,
    RSDOS_GRANULE_MAP_SECTOR, RSDOS_LABEL_SECTOR, RSDOS_MAX_GRANULES, RSDOS_SECTORS_PER_GRANULE,
    SECTORS_PER_TRACK, SECTOR_SIZE,
};
use crate::geometry::{Chs, Geometry};
use crate::image::DiskImage;
use log::{debug, info, warn};

/// Map value of a free granule, and of an unused directory slot's first byte
const FREE: u8 = 0xFF;

/// Map values from here up end a chain
const TERMINAL: u8 = 0x80;

const GRANULE_BYTES: u64 = RSDOS_SECTORS_PER_GRANULE as u64 * SECTOR_SIZE as u64;

/// The granules of one file, in order, with the map byte that ended the chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GranuleChain {
    /// Granule numbers in file order
    pub granules: Vec<u8>,
    /// Terminal map value; the low nibble counts sectors used in the last granule
    pub terminal: u8,
}

impl GranuleChain {
    /// Sectors used in the last granule
    pub fn sectors_in_last(&self) -> u16 {
        ((self.terminal & 0x0F) as u16).min(RSDOS_SECTORS_PER_GRANULE)
    }

    /// Walk the granule map from `first`
    ///
    /// Fails on pointers outside the map and on chains that revisit a granule.
    pub fn walk(map: &[u8], first: u8) -> Result<Self> {
        let mut granules = Vec::new();
        let mut granule = first;
        loop {
            let Some(&next) = map.get(granule as usize) else {
                return Err(DiskError::filesystem(format!(
                    "granule {} is outside the {}-entry map",
                    granule,
                    map.len()
                )));
            };
            if granules.contains(&granule) {
                return Err(DiskError::filesystem(format!(
                    "granule chain loops back to {}",
                    granule
                )));
            }
            granules.push(granule);
            if next >= TERMINAL {
                return Ok(Self {
                    granules,
                    terminal: next,
                });
            }
            granule = next;
        }
    }
}

/// RS-DOS directory entry fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsDosEntry {
    /// 0 BASIC, 1 data, 2 machine code, 3 text
    pub file_type: u8,
    /// 0x00 binary, 0xFF ASCII
    pub ascii_flag: u8,
    /// First granule of the chain
    pub first_granule: u8,
    /// Bytes used in the file's last sector
    pub last_sector_bytes: u16,
    /// Granule chain; empty for deleted entries
    pub chain: GranuleChain,
}

impl RsDosEntry {
    /// File size in bytes
    ///
    /// Never more than the sectors the chain holds: a terminal granule with
    /// no sectors ignores the last-sector count, which is capped at 256.
    pub fn size(&self) -> u64 {
        if self.chain.granules.is_empty() {
            return 0;
        }
        let full_granules = (self.chain.granules.len() - 1) as u64;
        let tail = match self.chain.sectors_in_last() {
            0 => 0,
            sectors => {
                (sectors - 1) as u64 * SECTOR_SIZE as u64
                    + (self.last_sector_bytes as u64).min(SECTOR_SIZE as u64)
            }
        };
        full_granules * GRANULE_BYTES + tail
    }

    /// Human-readable file type
    pub fn type_name(&self) -> &'static str {
        match self.file_type {
            0 => "BASIC",
            1 => "Data",
            2 => "ML",
            3 => "Text",
            _ => "Unknown",
        }
    }

    /// True when the file is stored as ASCII
    pub fn is_ascii(&self) -> bool {
        self.ascii_flag == 0xFF
    }
}

/// Raw 32-byte directory slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Name, space padded
    pub name: [u8; 8],
    /// Extension, space padded
    pub extension: [u8; 3],
    /// File type byte
    pub file_type: u8,
    /// ASCII flag byte
    pub ascii_flag: u8,
    /// First granule
    pub first_granule: u8,
    /// Bytes used in the last sector
    pub last_sector_bytes: u16,
}

impl DirectoryRecord {
    /// Slot size
    pub const SIZE: usize = 32;

    /// Decode a slot
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(DiskError::parse(0, "RS-DOS directory slot is truncated"));
        }
        let mut name = [0u8; 8];
        name.copy_from_slice(&bytes[..8]);
        let mut extension = [0u8; 3];
        extension.copy_from_slice(&bytes[8..11]);
        Ok(Self {
            name,
            extension,
            file_type: bytes[11],
            ascii_flag: bytes[12],
            first_granule: bytes[13],
            last_sector_bytes: u16::from_be_bytes([bytes[14], bytes[15]]),
        })
    }

    /// Encode into a 32-byte slot
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[..8].copy_from_slice(&self.name);
        bytes[8..11].copy_from_slice(&self.extension);
        bytes[11] = self.file_type;
        bytes[12] = self.ascii_flag;
        bytes[13] = self.first_granule;
        bytes[14..16].copy_from_slice(&self.last_sector_bytes.to_be_bytes());
        bytes
    }

    /// Slot never used
    pub fn is_unused(&self) -> bool {
        self.name[0] == FREE
    }

    /// Slot of a deleted file
    pub fn is_deleted(&self) -> bool {
        self.name[0] == 0
    }

    /// Name as `NAME.EXT`; deleted entries show `?` for the lost first letter
    pub fn display_name(&self) -> String {
        let mut name = String::from_utf8_lossy(&self.name).trim_end().to_string();
        if self.is_deleted() {
            name.replace_range(..1, "?");
        }
        let extension = String::from_utf8_lossy(&self.extension)
            .trim_end()
            .to_string();
        if extension.is_empty() {
            name
        } else {
            format!("{}.{}", name, extension)
        }
    }

    fn check(&self, raw: &[u8], granules: usize) -> Result<()> {
        if self.is_unused() {
            if raw[..16].iter().any(|&b| b != FREE) {
                return Err(DiskError::invalid_format("unused slot is not blank"));
            }
            return Ok(());
        }
        if self.file_type > 3 {
            return Err(DiskError::invalid_format(format!(
                "file type {} is not a known type",
                self.file_type
            )));
        }
        if self.ascii_flag != 0 && self.ascii_flag != 0xFF {
            return Err(DiskError::invalid_format(format!(
                "ASCII flag 0x{:02X} is neither 0x00 nor 0xFF",
                self.ascii_flag
            )));
        }
        let name_start = if self.is_deleted() { 1 } else { 0 };
        if !is_printable_ascii(&raw[name_start..11]) {
            return Err(DiskError::invalid_format("filename is not printable"));
        }
        if !self.is_deleted() && self.first_granule as usize >= granules {
            return Err(DiskError::invalid_format(format!(
                "first granule {} is outside the map",
                self.first_granule
            )));
        }
        Ok(())
    }
}

/// Granules the map covers on a disk of this geometry
pub fn granule_count(geometry: &Geometry) -> usize {
    let tracks = geometry.tracks as usize * geometry.heads as usize;
    (tracks.saturating_sub(1) * 2).min(RSDOS_MAX_GRANULES)
}

/// First sector of a granule
///
/// Side 0 holds two granules per track, stepping over the directory track;
/// any remaining granules continue on side 1 from track 0.
pub fn granule_location(geometry: &Geometry, granule: u8) -> Chs {
    let side0 = (geometry.tracks as usize).saturating_sub(1) * 2;
    let granule = granule as usize;
    let (local, head) = if granule < side0 {
        (granule, 0)
    } else {
        (granule - side0, 1)
    };
    let mut track = (local / 2) as u16;
    if head == 0 && track >= RSDOS_DIRECTORY_TRACK {
        track += 1;
    }
    let sector = 1 + (local % 2) as u16 * RSDOS_SECTORS_PER_GRANULE;
    Chs::new(track, head, sector)
}

fn check_geometry(geometry: &Geometry) -> Result<()> {
    if geometry.sectors_per_track != SECTORS_PER_TRACK
        || geometry.sector_size as usize != SECTOR_SIZE
        || geometry.tracks <= RSDOS_DIRECTORY_TRACK
    {
        return Err(DiskError::geometry(format!(
            "RS-DOS needs 18 x 256-byte sectors and at least 18 tracks, not {}",
            geometry
        )));
    }
    Ok(())
}

/// RS-DOS filesystem mounted on a disk image
pub struct RsDosFileSystem<'a> {
    image: &'a mut DiskImage,
    granules: usize,
}

impl<'a> RsDosFileSystem<'a> {
    /// Mount the selected volume, failing unless it validates as RS-DOS
    pub fn mount(image: &'a mut DiskImage) -> Result<Self> {
        Self::validate(image)?;
        let granules = granule_count(&image.geometry());
        debug!("Mounted RS-DOS volume with {} granules", granules);
        Ok(Self { image, granules })
    }

    /// Check for an RS-DOS volume without mounting it
    pub fn probe(image: &mut DiskImage) -> bool {
        match Self::validate(image) {
            Ok(()) => true,
            Err(e) => {
                debug!("Not an RS-DOS volume: {}", e);
                false
            }
        }
    }

    /// Format the selected volume and mount the result
    pub fn format(image: &'a mut DiskImage, progress: &mut dyn FormatProgress) -> Result<Self> {
        write_empty_volume(image, progress)?;
        Self::mount(image)
    }

    fn validate(image: &mut DiskImage) -> Result<()> {
        let geometry = image.geometry();
        check_geometry(&geometry)?;
        let granules = granule_count(&geometry);

        let map = read_map(image, granules)?;
        for (granule, &value) in map.iter().enumerate() {
            let valid = value == FREE
                || (value as usize) < granules
                || (value >= TERMINAL && value & 0x0F <= RSDOS_SECTORS_PER_GRANULE as u8);
            if !valid {
                return Err(DiskError::invalid_format(format!(
                    "granule {} has map value 0x{:02X}",
                    granule, value
                )));
            }
        }

        let directory = read_directory_sectors(image)?;
        // An all-zero directory cannot be told apart from an unformatted disk
        if directory[..SECTOR_SIZE].iter().all(|&b| b == 0) {
            return Err(DiskError::invalid_format("directory is blank"));
        }
        for raw in directory.chunks_exact(DirectoryRecord::SIZE) {
            DirectoryRecord::decode(raw)?.check(raw, granules)?;
        }
        Ok(())
    }

    /// The granule map
    pub fn granule_map(&mut self) -> Result<Vec<u8>> {
        read_map(self.image, self.granules)
    }

    /// Granules on the volume
    pub fn granules(&self) -> usize {
        self.granules
    }

    fn read_granule(&mut self, granule: u8, sectors: u16) -> Result<Vec<u8>> {
        let start = granule_location(&self.image.geometry(), granule);
        self.image.read_sectors(start, sectors as usize)
    }
}

fn read_map(image: &mut DiskImage, granules: usize) -> Result<Vec<u8>> {
    let mut map = image.read_sector(RSDOS_DIRECTORY_TRACK, 0, RSDOS_GRANULE_MAP_SECTOR)?;
    map.truncate(granules);
    Ok(map)
}

fn read_directory_sectors(image: &mut DiskImage) -> Result<Vec<u8>> {
    image.read_sectors(
        Chs::new(RSDOS_DIRECTORY_TRACK, 0, RSDOS_DIRECTORY_SECTOR),
        RSDOS_DIRECTORY_SECTORS as usize,
    )
}

fn encode_label(label: &str) -> Result<Vec<u8>> {
    if label.len() >= SECTOR_SIZE {
        return Err(DiskError::filesystem(format!(
            "label of {} bytes does not fit the label sector",
            label.len()
        )));
    }
    let mut sector = vec![FREE; SECTOR_SIZE];
    sector[..label.len()].copy_from_slice(label.as_bytes());
    sector[label.len()] = 0;
    Ok(sector)
}

fn write_empty_volume(image: &mut DiskImage, progress: &mut dyn FormatProgress) -> Result<()> {
    let geometry = image.geometry();
    check_geometry(&geometry)?;
    info!("Formatting RS-DOS volume: {}", geometry);

    // A blank map and directory are all 0xFF
    fill_volume(image, FREE, progress)?;
    image.write_sector(RSDOS_DIRECTORY_TRACK, 0, RSDOS_LABEL_SECTOR, &encode_label("")?)?;
    image.flush()?;
    Ok(())
}

impl FileSystem for RsDosFileSystem<'_> {
    fn fs_type(&self) -> FileSystemType {
        FileSystemType::RsDos
    }

    fn is_valid_format(&mut self) -> bool {
        match Self::validate(self.image) {
            Ok(()) => true,
            Err(e) => {
                warn!("RS-DOS validation failed: {}", e);
                false
            }
        }
    }

    fn disk_label(&mut self) -> Result<String> {
        let sector = self
            .image
            .read_sector(RSDOS_DIRECTORY_TRACK, 0, RSDOS_LABEL_SECTOR)?;
        let end = sector
            .iter()
            .position(|&b| b == 0 || b == FREE)
            .unwrap_or(sector.len());
        Ok(String::from_utf8_lossy(&sector[..end]).to_string())
    }

    fn set_disk_label(&mut self, label: &str) -> Result<()> {
        let sector = encode_label(label)?;
        self.image
            .write_sector(RSDOS_DIRECTORY_TRACK, 0, RSDOS_LABEL_SECTOR, &sector)
    }

    fn free_space(&mut self) -> Result<u64> {
        let map = self.granule_map()?;
        let free = map.iter().filter(|&&g| g == FREE).count() as u64;
        Ok(free * GRANULE_BYTES)
    }

    fn get_directory(&mut self, _lsn: u32) -> Result<Directory> {
        let map = self.granule_map()?;
        let raw = read_directory_sectors(self.image)?;
        let mut directory = Directory::new(FileSystemType::RsDos, 0);

        for slot in raw.chunks_exact(DirectoryRecord::SIZE) {
            let record = DirectoryRecord::decode(slot)?;
            if record.is_unused() {
                continue;
            }
            let deleted = record.is_deleted();
            let chain = if deleted {
                GranuleChain::default()
            } else {
                GranuleChain::walk(&map, record.first_granule)?
            };
            directory.push(DirEntry {
                name: record.display_name(),
                deleted,
                detail: EntryDetail::RsDos(RsDosEntry {
                    file_type: record.file_type,
                    ascii_flag: record.ascii_flag,
                    first_granule: record.first_granule,
                    last_sector_bytes: record.last_sector_bytes,
                    chain,
                }),
            });
        }
        Ok(directory)
    }

    fn read_file(&mut self, entry: &DirEntry) -> Result<Vec<u8>> {
        let EntryDetail::RsDos(rsdos) = &entry.detail else {
            return Err(DiskError::filesystem(format!(
                "{} is not an RS-DOS entry",
                entry.name
            )));
        };
        if entry.deleted {
            return Err(DiskError::filesystem(format!(
                "{} has been deleted",
                entry.name
            )));
        }

        let chain = &rsdos.chain;
        let mut data = Vec::with_capacity(rsdos.size() as usize);
        for (i, &granule) in chain.granules.iter().enumerate() {
            let sectors = if i + 1 == chain.granules.len() {
                chain.sectors_in_last()
            } else {
                RSDOS_SECTORS_PER_GRANULE
            };
            data.extend_from_slice(&self.read_granule(granule, sectors)?);
        }
        data.truncate(rsdos.size() as usize);
        Ok(data)
    }

    fn format_disk(&mut self, progress: &mut dyn FormatProgress) -> Result<()> {
        write_empty_volume(self.image, progress)?;
        self.granules = granule_count(&self.image.geometry());
        Ok(())
    }

    fn info(&mut self) -> Result<FileSystemInfo> {
        Ok(FileSystemInfo {
            fs_type: FileSystemType::RsDos,
            label: self.disk_label()?,
            block_size: GRANULE_BYTES as usize,
            total_blocks: self.granules,
            free_bytes: self.free_space()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::NoProgress;
    use crate::format::FormatSpec;

    fn formatted() -> DiskImage {
        let mut image = DiskImage::builder()
            .spec(FormatSpec::rsdos_35())
            .build()
            .unwrap();
        write_empty_volume(&mut image, &mut NoProgress).unwrap();
        image
    }

    fn record(name: &[u8; 8], extension: &[u8; 3], first_granule: u8, last: u16) -> DirectoryRecord {
        DirectoryRecord {
            name: *name,
            extension: *extension,
            file_type: 2,
            ascii_flag: 0,
            first_granule,
            last_sector_bytes: last,
        }
    }

    fn put_record(image: &mut DiskImage, index: usize, record: &DirectoryRecord) {
        let sector = RSDOS_DIRECTORY_SECTOR + (index / 8) as u16;
        let mut data = image.read_sector(17, 0, sector).unwrap();
        let offset = (index % 8) * 32;
        data[offset..offset + 32].copy_from_slice(&record.encode());
        image.write_sector(17, 0, sector, &data).unwrap();
    }

    fn set_map(image: &mut DiskImage, entries: &[(usize, u8)]) {
        let mut map = image.read_sector(17, 0, 2).unwrap();
        for &(granule, value) in entries {
            map[granule] = value;
        }
        image.write_sector(17, 0, 2, &map).unwrap();
    }

    #[test]
    fn test_size_of_partial_granule() {
        let entry = RsDosEntry {
            file_type: 2,
            ascii_flag: 0,
            first_granule: 0,
            last_sector_bytes: 0x00C8,
            chain: GranuleChain {
                granules: vec![0],
                terminal: 0x82,
            },
        };
        assert_eq!(entry.size(), 456);

        let longer = RsDosEntry {
            chain: GranuleChain {
                granules: vec![0, 1, 2],
                terminal: 0xC9,
            },
            last_sector_bytes: 256,
            ..entry
        };
        assert_eq!(longer.size(), 2 * 2304 + 8 * 256 + 256);
    }

    #[test]
    fn test_size_matches_sectors_read() {
        let mut image = formatted();
        image
            .write_sectors(granule_location(&image.geometry(), 0), &[0x11; 2304])
            .unwrap();
        image.write_sector(0, 0, 10, &[0x22; 256]).unwrap();
        set_map(&mut image, &[(0, 1), (1, 0xC0), (2, 0xC1)]);
        put_record(&mut image, 0, &record(b"EMPTYEND", b"BIN", 0, 100));
        put_record(&mut image, 1, &record(b"LONGLAST", b"BIN", 2, 300));

        let mut fs = RsDosFileSystem::mount(&mut image).unwrap();
        let directory = fs.get_directory(0).unwrap();

        let empty_end = directory.get("EMPTYEND.BIN").unwrap();
        assert_eq!(empty_end.size(), 2304);
        assert_eq!(fs.read_file(empty_end).unwrap(), vec![0x11; 2304]);

        let long_last = directory.get("LONGLAST.BIN").unwrap();
        assert_eq!(long_last.size(), 256);
        assert_eq!(fs.read_file(long_last).unwrap().len(), 256);
    }

    #[test]
    fn test_granule_locations() {
        let geometry = Geometry::new(35, 1, 18, 256);
        assert_eq!(granule_count(&geometry), 68);
        assert_eq!(granule_location(&geometry, 0), Chs::new(0, 0, 1));
        assert_eq!(granule_location(&geometry, 1), Chs::new(0, 0, 10));
        assert_eq!(granule_location(&geometry, 33), Chs::new(16, 0, 10));
        // Track 17 is skipped
        assert_eq!(granule_location(&geometry, 34), Chs::new(18, 0, 1));
        assert_eq!(granule_location(&geometry, 67), Chs::new(34, 0, 10));

        let double = Geometry::new(40, 2, 18, 256);
        assert_eq!(granule_count(&double), RSDOS_MAX_GRANULES);
        assert_eq!(granule_location(&double, 78), Chs::new(0, 1, 1));
        assert_eq!(granule_location(&double, 80), Chs::new(1, 1, 1));
    }

    #[test]
    fn test_chain_walk() {
        let mut map = vec![FREE; 68];
        map[5] = 9;
        map[9] = 6;
        map[6] = 0xC3;
        let chain = GranuleChain::walk(&map, 5).unwrap();
        assert_eq!(chain.granules, vec![5, 9, 6]);
        assert_eq!(chain.terminal, 0xC3);
        assert_eq!(chain.sectors_in_last(), 3);

        map[6] = 5;
        assert!(GranuleChain::walk(&map, 5).is_err());
        assert!(GranuleChain::walk(&map, 70).is_err());
    }

    #[test]
    fn test_record_round_trip() {
        let rec = record(b"HELLO   ", b"BAS", 12, 0x01F4);
        let bytes = rec.encode();
        assert_eq!(&bytes[11..16], &[2, 0, 12, 0x01, 0xF4]);
        assert_eq!(&bytes[16..], &[0; 16]);
        assert_eq!(DirectoryRecord::decode(&bytes).unwrap(), rec);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(record(b"HELLO   ", b"BAS", 0, 0).display_name(), "HELLO.BAS");
        assert_eq!(record(b"README  ", b"   ", 0, 0).display_name(), "README");
        assert_eq!(record(b"\0ONE    ", b"BIN", 0, 0).display_name(), "?ONE.BIN");
    }

    #[test]
    fn test_fresh_volume() {
        let mut image = formatted();
        let mut fs = RsDosFileSystem::mount(&mut image).unwrap();
        assert!(fs.get_directory(0).unwrap().is_empty());
        assert_eq!(fs.free_space().unwrap(), 68 * 2304);
        assert_eq!(fs.disk_label().unwrap(), "");
        assert_eq!(fs.info().unwrap().total_blocks, 68);
    }

    #[test]
    fn test_read_file() {
        let mut image = formatted();
        let first: Vec<u8> = (0..2304).map(|i| (i % 256) as u8).collect();
        image
            .write_sectors(granule_location(&image.geometry(), 34), &first)
            .unwrap();
        image.write_sector(0, 0, 1, &[0x5A; 256]).unwrap();
        image.write_sector(0, 0, 2, &[0xA5; 256]).unwrap();
        set_map(&mut image, &[(34, 0), (0, 0xC2)]);
        put_record(&mut image, 0, &record(b"PROGRAM ", b"BIN", 34, 100));

        let mut fs = RsDosFileSystem::mount(&mut image).unwrap();
        let directory = fs.get_directory(0).unwrap();
        let entry = directory.get("program.bin").unwrap();
        assert_eq!(entry.size(), 2304 + 256 + 100);

        let data = fs.read_file(entry).unwrap();
        assert_eq!(data.len(), 2660);
        assert_eq!(&data[..2304], &first[..]);
        assert_eq!(&data[2304..2560], &[0x5A; 256][..]);
        assert_eq!(&data[2560..], &[0xA5; 100][..]);
        assert_eq!(fs.free_space().unwrap(), 66 * 2304);
    }

    #[test]
    fn test_deleted_entry() {
        let mut image = formatted();
        put_record(&mut image, 3, &record(b"\0LD     ", b"DAT", 7, 10));
        let mut fs = RsDosFileSystem::mount(&mut image).unwrap();
        let directory = fs.get_directory(0).unwrap();
        let entry = directory.iter().next().unwrap();
        assert!(entry.deleted);
        assert_eq!(entry.name, "?LD.DAT");
        assert_eq!(entry.size(), 0);
        assert!(fs.read_file(entry).is_err());
    }

    #[test]
    fn test_label_round_trip() {
        let mut image = formatted();
        let mut fs = RsDosFileSystem::mount(&mut image).unwrap();
        fs.set_disk_label("GAMES DISK").unwrap();
        assert_eq!(fs.disk_label().unwrap(), "GAMES DISK");
        assert!(fs.set_disk_label(&"X".repeat(256)).is_err());
    }

    #[test]
    fn test_blank_directory_is_invalid() {
        let mut image = DiskImage::builder()
            .spec(FormatSpec::rsdos_35().with_filler_byte(0))
            .build()
            .unwrap();
        assert!(!RsDosFileSystem::probe(&mut image));
    }

    #[test]
    fn test_bad_map_value_is_invalid() {
        let mut image = formatted();
        set_map(&mut image, &[(4, 0xCA)]);
        assert!(!RsDosFileSystem::probe(&mut image));

        let mut image = formatted();
        set_map(&mut image, &[(4, 68)]);
        assert!(!RsDosFileSystem::probe(&mut image));
    }

    #[test]
    fn test_bad_entries_are_invalid() {
        let mut image = formatted();
        let mut bad_type = record(b"FILE    ", b"BIN", 0, 0);
        bad_type.file_type = 4;
        put_record(&mut image, 0, &bad_type);
        assert!(!RsDosFileSystem::probe(&mut image));

        let mut image = formatted();
        put_record(&mut image, 0, &record(b"FI\x01E    ", b"BIN", 0, 0));
        assert!(!RsDosFileSystem::probe(&mut image));

        let mut image = formatted();
        put_record(&mut image, 0, &record(b"FILE    ", b"BIN", 68, 0));
        assert!(!RsDosFileSystem::probe(&mut image));
    }

    #[test]
    fn test_wrong_geometry_is_rejected() {
        let mut image = DiskImage::builder()
            .spec(FormatSpec::new(1, 35, 10, 512))
            .build()
            .unwrap();
        assert!(!RsDosFileSystem::probe(&mut image));
        assert!(RsDosFileSystem::format(&mut image, &mut NoProgress).is_err());
    }

    #[test]
    fn test_writes_not_implemented() {
        let mut image = formatted();
        let mut fs = RsDosFileSystem::mount(&mut image).unwrap();
        assert!(matches!(
            fs.put_file(0, "NEW.BAS", b"10 PRINT"),
            Err(DiskError::NotImplemented(_))
        ));
    }
}
