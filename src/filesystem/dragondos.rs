//! DragonDOS filesystem
//!
//! Track 20 carries the volume: sectors 1 and 2 hold the sector bitmap (with
//! the geometry header at the end of sector 1) and sectors 3 to 18 hold 160
//! directory slots of 25 bytes. Track 16 keeps a backup copy.

use super::{
    fill_volume, DirEntry, Directory, EntryDetail, FileSystem, FileSystemInfo, FileSystemType,
    FormatProgress,
};
use crate::codec::{encode_padded, null_terminated, put_u16_be, u16_be};
use crate::error::{DiskError, Result};
use crate::format::{
    DRAGONDOS_BACKUP_TRACK, DRAGONDOS_BITMAP_SPLIT, DRAGONDOS_DIRECTORY_SECTOR,
    DRAGONDOS_DIRECTORY_SECTORS, DRAGONDOS_DIRECTORY_TRACK, DRAGONDOS_HEADER_OFFSET,
    SECTORS_PER_TRACK, SECTOR_SIZE,
};
use crate::geometry::{Chs, Geometry};
use crate::image::DiskImage;
use log::{debug, info, warn};

const SLOTS_PER_SECTOR: usize = 10;
const SLOT_COUNT: usize = SLOTS_PER_SECTOR * DRAGONDOS_DIRECTORY_SECTORS as usize;

/// Bytes of each bitmap sector given to bits
const BITMAP_BYTES: usize = DRAGONDOS_BITMAP_SPLIT as usize / 8;

/// Flag byte of a never-used slot
const EMPTY_SLOT: u8 = 0x89;

/// Directory slot flag bits
pub mod flags {
    /// Entry deleted; the slot may be reused
    pub const DELETED: u8 = 0x80;
    /// Byte 24 holds the slot index of a continuation entry
    pub const CONTINUED: u8 = 0x20;
    /// No further slots need scanning
    pub const END_OF_DIRECTORY: u8 = 0x08;
    /// File is write protected
    pub const PROTECTED: u8 = 0x02;
    /// Slot holds extra allocation blocks for another entry
    pub const CONTINUATION: u8 = 0x01;
}

/// A run of contiguous sectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectorAllocationBlock {
    /// First LSN
    pub lsn: u16,
    /// Sectors in the run
    pub sectors: u8,
}

impl SectorAllocationBlock {
    const SIZE: usize = 3;

    fn decode(bytes: &[u8]) -> Self {
        Self {
            lsn: u16_be(bytes, 0),
            sectors: bytes[2],
        }
    }

    fn encode(&self, bytes: &mut [u8]) {
        put_u16_be(bytes, 0, self.lsn);
        bytes[2] = self.sectors;
    }

    /// Block holds no sectors
    pub fn is_empty(&self) -> bool {
        self.sectors == 0
    }
}

/// One 25-byte directory slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryRecord {
    /// File header with name and the first four blocks
    Header {
        /// Flag byte
        flags: u8,
        /// Filename, up to 8 characters
        name: String,
        /// Extension, up to 3 characters
        extension: String,
        /// Allocation blocks
        blocks: [SectorAllocationBlock; 4],
        /// Bytes used in the last sector, or the next slot when continued
        link: u8,
    },
    /// Extra blocks for the entry that points here
    Continuation {
        /// Flag byte
        flags: u8,
        /// Allocation blocks
        blocks: [SectorAllocationBlock; 7],
        /// Bytes used in the last sector, or the next slot when continued
        link: u8,
    },
}

impl DirectoryRecord {
    /// Slot size
    pub const SIZE: usize = 25;

    /// Decode a slot
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(DiskError::parse(0, "DragonDOS directory slot is truncated"));
        }
        let flags = bytes[0];
        let link = bytes[24];

        if flags & flags::CONTINUATION != 0 {
            let mut blocks = [SectorAllocationBlock::default(); 7];
            for (i, block) in blocks.iter_mut().enumerate() {
                let offset = 1 + i * SectorAllocationBlock::SIZE;
                *block = SectorAllocationBlock::decode(&bytes[offset..]);
            }
            Ok(Self::Continuation {
                flags,
                blocks,
                link,
            })
        } else {
            let mut blocks = [SectorAllocationBlock::default(); 4];
            for (i, block) in blocks.iter_mut().enumerate() {
                let offset = 12 + i * SectorAllocationBlock::SIZE;
                *block = SectorAllocationBlock::decode(&bytes[offset..]);
            }
            Ok(Self::Header {
                flags,
                name: null_terminated(&bytes[1..9]),
                extension: null_terminated(&bytes[9..12]),
                blocks,
                link,
            })
        }
    }

    /// Encode into a 25-byte slot
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        match self {
            Self::Header {
                flags,
                name,
                extension,
                blocks,
                link,
            } => {
                bytes[0] = *flags;
                bytes[1..9].copy_from_slice(&encode_padded(name, 8, 0));
                bytes[9..12].copy_from_slice(&encode_padded(extension, 3, 0));
                for (i, block) in blocks.iter().enumerate() {
                    block.encode(&mut bytes[12 + i * SectorAllocationBlock::SIZE..]);
                }
                bytes[24] = *link;
            }
            Self::Continuation {
                flags,
                blocks,
                link,
            } => {
                bytes[0] = *flags;
                for (i, block) in blocks.iter().enumerate() {
                    block.encode(&mut bytes[1 + i * SectorAllocationBlock::SIZE..]);
                }
                bytes[24] = *link;
            }
        }
        bytes
    }

    /// Flag byte
    pub fn flags(&self) -> u8 {
        match self {
            Self::Header { flags, .. } | Self::Continuation { flags, .. } => *flags,
        }
    }

    /// Byte 24
    pub fn link(&self) -> u8 {
        match self {
            Self::Header { link, .. } | Self::Continuation { link, .. } => *link,
        }
    }

    /// Allocation blocks held in this slot
    pub fn blocks(&self) -> &[SectorAllocationBlock] {
        match self {
            Self::Header { blocks, .. } => blocks,
            Self::Continuation { blocks, .. } => blocks,
        }
    }
}

/// DragonDOS directory entry with continuation blocks merged in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragonDosEntry {
    /// Flag byte of the header slot
    pub flags: u8,
    /// Non-empty allocation blocks in file order
    pub blocks: Vec<SectorAllocationBlock>,
    /// Bytes used in the last sector; 0 means all 256
    pub bytes_in_last_sector: u8,
}

impl DragonDosEntry {
    /// File size in bytes
    pub fn size(&self) -> u64 {
        let sectors: u64 = self.blocks.iter().map(|b| b.sectors as u64).sum();
        let total = sectors * SECTOR_SIZE as u64;
        if self.bytes_in_last_sector == 0 {
            total
        } else {
            total.saturating_sub(SECTOR_SIZE as u64 - self.bytes_in_last_sector as u64)
        }
    }

    /// Write-protect flag
    pub fn is_protected(&self) -> bool {
        self.flags & flags::PROTECTED != 0
    }
}

/// Sector bitmap split over two sectors, least significant bit first
///
/// A set bit marks an allocated sector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorBitmap {
    sectors: [Vec<u8>; 2],
}

impl SectorBitmap {
    /// Wrap the two bitmap sectors
    pub fn new(first: Vec<u8>, second: Vec<u8>) -> Self {
        Self {
            sectors: [first, second],
        }
    }

    fn position(lsn: u32) -> (usize, usize, u8) {
        let (index, bit) = if lsn < DRAGONDOS_BITMAP_SPLIT {
            (0, lsn)
        } else {
            (1, lsn - DRAGONDOS_BITMAP_SPLIT)
        };
        (index, (bit / 8) as usize, 1 << (bit % 8))
    }

    /// Is a sector allocated? Sectors past the map count as allocated.
    pub fn is_allocated(&self, lsn: u32) -> bool {
        let (index, byte, mask) = Self::position(lsn);
        self.sectors[index]
            .get(byte)
            .map_or(true, |&b| b & mask != 0)
    }

    /// Mark a sector allocated or free
    pub fn set_allocated(&mut self, lsn: u32, allocated: bool) {
        let (index, byte, mask) = Self::position(lsn);
        if let Some(b) = self.sectors[index].get_mut(byte) {
            if allocated {
                *b |= mask;
            } else {
                *b &= !mask;
            }
        }
    }

    /// Free sectors among the first `total`
    pub fn free_count(&self, total: u32) -> u32 {
        (0..total).filter(|&lsn| !self.is_allocated(lsn)).count() as u32
    }

    /// The sector holding bits from LSN 0
    pub fn first(&self) -> &[u8] {
        &self.sectors[0]
    }

    /// The sector holding bits from LSN 0x5A0
    pub fn second(&self) -> &[u8] {
        &self.sectors[1]
    }
}

/// Geometry header bytes: tracks, sectors per track (36 when double sided)
/// and the complements of both
pub fn encode_header(geometry: &Geometry) -> [u8; 4] {
    let tracks = geometry.tracks as u8;
    let sectors = (geometry.sectors_per_track as u8).wrapping_mul(geometry.heads);
    [tracks, sectors, !tracks, !sectors]
}

/// Decode the geometry header at the end of bitmap sector 1
pub fn decode_header(bytes: &[u8]) -> Result<Geometry> {
    let header = bytes
        .get(DRAGONDOS_HEADER_OFFSET..DRAGONDOS_HEADER_OFFSET + 4)
        .ok_or_else(|| DiskError::parse(0, "bitmap sector is too short for the header"))?;
    if header[2] != !header[0] || header[3] != !header[1] {
        return Err(DiskError::invalid_format(format!(
            "geometry header {:02X?} fails its complement check",
            header
        )));
    }
    let tracks = header[0] as u16;
    let (heads, sectors) = if header[1] == 36 {
        (2, 18)
    } else {
        (1, header[1] as u16)
    };
    if tracks != 40 && tracks != 80 {
        return Err(DiskError::invalid_format(format!(
            "{} tracks is not a DragonDOS size",
            tracks
        )));
    }
    if sectors != SECTORS_PER_TRACK {
        return Err(DiskError::invalid_format(format!(
            "{} sectors per track is not a DragonDOS size",
            sectors
        )));
    }
    Ok(Geometry::new(tracks, heads, sectors, SECTOR_SIZE as u16))
}

/// Byte offset of a slot; the last 6 bytes of each sector hold no slot
fn slot_offset(index: usize) -> usize {
    (index / SLOTS_PER_SECTOR) * SECTOR_SIZE + (index % SLOTS_PER_SECTOR) * DirectoryRecord::SIZE
}

fn slot(directory: &[u8], index: usize) -> &[u8] {
    let offset = slot_offset(index);
    &directory[offset..offset + DirectoryRecord::SIZE]
}

fn empty_directory() -> Vec<u8> {
    let mut data = vec![0u8; DRAGONDOS_DIRECTORY_SECTORS as usize * SECTOR_SIZE];
    for index in 0..SLOT_COUNT {
        data[slot_offset(index)] = EMPTY_SLOT;
    }
    data
}

/// DragonDOS filesystem mounted on a disk image
pub struct DragonDosFileSystem<'a> {
    image: &'a mut DiskImage,
    geometry: Geometry,
}

impl<'a> DragonDosFileSystem<'a> {
    /// Mount the selected volume, failing unless it validates as DragonDOS
    pub fn mount(image: &'a mut DiskImage) -> Result<Self> {
        let geometry = Self::validate(image)?;
        debug!("Mounted DragonDOS volume: {}", geometry);
        Ok(Self { image, geometry })
    }

    /// Check for a DragonDOS volume without mounting it
    pub fn probe(image: &mut DiskImage) -> bool {
        match Self::validate(image) {
            Ok(_) => true,
            Err(e) => {
                debug!("Not a DragonDOS volume: {}", e);
                false
            }
        }
    }

    /// Format the selected volume and mount the result
    pub fn format(image: &'a mut DiskImage, progress: &mut dyn FormatProgress) -> Result<Self> {
        write_empty_volume(image, progress)?;
        Self::mount(image)
    }

    fn validate(image: &mut DiskImage) -> Result<Geometry> {
        let physical = image.geometry();
        if physical.sector_size as usize != SECTOR_SIZE
            || physical.sectors_per_track != SECTORS_PER_TRACK
        {
            return Err(DiskError::invalid_format(format!(
                "DragonDOS needs 18 x 256-byte sectors, not {}",
                physical
            )));
        }
        let geometry = decode_header(&image.read_sector(DRAGONDOS_DIRECTORY_TRACK, 0, 1)?)?;
        if geometry.tracks > physical.tracks || geometry.heads > physical.heads {
            return Err(DiskError::invalid_format(format!(
                "header describes {}, larger than the image's {}",
                geometry, physical
            )));
        }
        Ok(geometry)
    }

    /// Logical geometry from the header
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Read the sector bitmap
    pub fn bitmap(&mut self) -> Result<SectorBitmap> {
        let first = self.image.read_sector(DRAGONDOS_DIRECTORY_TRACK, 0, 1)?;
        let second = self.image.read_sector(DRAGONDOS_DIRECTORY_TRACK, 0, 2)?;
        Ok(SectorBitmap::new(
            first[..BITMAP_BYTES].to_vec(),
            second[..BITMAP_BYTES].to_vec(),
        ))
    }

    fn read_lsn(&mut self, lsn: u32) -> Result<Vec<u8>> {
        let chs = self.geometry.lsn_to_chs(lsn)?;
        self.image.read_sector(chs.track, chs.head, chs.sector)
    }

    fn read_directory(&mut self) -> Result<Vec<u8>> {
        self.image.read_sectors(
            Chs::new(DRAGONDOS_DIRECTORY_TRACK, 0, DRAGONDOS_DIRECTORY_SECTOR),
            DRAGONDOS_DIRECTORY_SECTORS as usize,
        )
    }
}

fn write_empty_volume(image: &mut DiskImage, progress: &mut dyn FormatProgress) -> Result<()> {
    let geometry = image.geometry();
    let supported = (geometry.tracks == 40 || geometry.tracks == 80)
        && (geometry.heads == 1 || geometry.heads == 2)
        && geometry.sectors_per_track == SECTORS_PER_TRACK
        && geometry.sector_size as usize == SECTOR_SIZE;
    if !supported {
        return Err(DiskError::geometry(format!(
            "DragonDOS needs 40 or 80 tracks of 18 x 256-byte sectors, not {}",
            geometry
        )));
    }
    info!("Formatting DragonDOS volume: {}", geometry);
    fill_volume(image, 0xFF, progress)?;

    let directory = empty_directory();
    for track in [DRAGONDOS_DIRECTORY_TRACK, DRAGONDOS_BACKUP_TRACK] {
        image.write_sectors(Chs::new(track, 0, DRAGONDOS_DIRECTORY_SECTOR), &directory)?;
    }

    let mut bitmap = SectorBitmap::new(vec![0xFF; SECTOR_SIZE], vec![0xFF; SECTOR_SIZE]);
    let total = geometry.total_sectors();
    for lsn in 0..total {
        bitmap.set_allocated(lsn, false);
    }
    for track in [DRAGONDOS_BACKUP_TRACK, DRAGONDOS_DIRECTORY_TRACK] {
        for sector in 1..=SECTORS_PER_TRACK {
            bitmap.set_allocated(geometry.chs_to_lsn(Chs::new(track, 0, sector))?, true);
        }
    }

    let mut first = bitmap.first().to_vec();
    let mut second = bitmap.second().to_vec();
    first[BITMAP_BYTES..].fill(0);
    second[BITMAP_BYTES..].fill(0);
    first[DRAGONDOS_HEADER_OFFSET..DRAGONDOS_HEADER_OFFSET + 4]
        .copy_from_slice(&encode_header(&geometry));

    for track in [DRAGONDOS_DIRECTORY_TRACK, DRAGONDOS_BACKUP_TRACK] {
        image.write_sector(track, 0, 1, &first)?;
        image.write_sector(track, 0, 2, &second)?;
    }
    image.flush()?;
    Ok(())
}

impl FileSystem for DragonDosFileSystem<'_> {
    fn fs_type(&self) -> FileSystemType {
        FileSystemType::DragonDos
    }

    fn is_valid_format(&mut self) -> bool {
        match Self::validate(self.image) {
            Ok(geometry) => {
                self.geometry = geometry;
                true
            }
            Err(e) => {
                warn!("DragonDOS validation failed: {}", e);
                false
            }
        }
    }

    fn disk_label(&mut self) -> Result<String> {
        Ok(String::new())
    }

    fn free_space(&mut self) -> Result<u64> {
        let bitmap = self.bitmap()?;
        let free = bitmap.free_count(self.geometry.total_sectors());
        Ok(free as u64 * SECTOR_SIZE as u64)
    }

    fn get_directory(&mut self, _lsn: u32) -> Result<Directory> {
        let raw = self.read_directory()?;
        let mut directory = Directory::new(FileSystemType::DragonDos, 0);

        for index in 0..SLOT_COUNT {
            let record = DirectoryRecord::decode(slot(&raw, index))?;
            let header_flags = record.flags();
            if header_flags & flags::END_OF_DIRECTORY != 0 {
                break;
            }
            let DirectoryRecord::Header {
                name, extension, ..
            } = &record
            else {
                continue;
            };

            let deleted = header_flags & flags::DELETED != 0;
            let mut blocks: Vec<SectorAllocationBlock> = record.blocks().to_vec();
            let mut current = header_flags;
            let mut link = record.link();
            let mut steps = 0;
            while !deleted && current & flags::CONTINUED != 0 {
                steps += 1;
                if steps > SLOT_COUNT || link as usize >= SLOT_COUNT {
                    return Err(DiskError::filesystem(format!(
                        "continuation chain of {} is broken at slot {}",
                        name, link
                    )));
                }
                let next = DirectoryRecord::decode(slot(&raw, link as usize))?;
                if !matches!(next, DirectoryRecord::Continuation { .. }) {
                    return Err(DiskError::filesystem(format!(
                        "slot {} continues {} but is not a continuation entry",
                        link, name
                    )));
                }
                blocks.extend_from_slice(next.blocks());
                current = next.flags();
                link = next.link();
            }
            blocks.retain(|b| !b.is_empty());

            let display = if extension.is_empty() {
                name.clone()
            } else {
                format!("{}.{}", name, extension)
            };
            directory.push(DirEntry {
                name: display,
                deleted,
                detail: EntryDetail::DragonDos(DragonDosEntry {
                    flags: header_flags,
                    blocks,
                    bytes_in_last_sector: if current & flags::CONTINUED != 0 {
                        0
                    } else {
                        link
                    },
                }),
            });
        }
        Ok(directory)
    }

    fn read_file(&mut self, entry: &DirEntry) -> Result<Vec<u8>> {
        let EntryDetail::DragonDos(dragon) = &entry.detail else {
            return Err(DiskError::filesystem(format!(
                "{} is not a DragonDOS entry",
                entry.name
            )));
        };
        let size = dragon.size() as usize;
        let mut data = Vec::with_capacity(size);
        for block in &dragon.blocks {
            for i in 0..block.sectors as u32 {
                data.extend_from_slice(&self.read_lsn(block.lsn as u32 + i)?);
            }
        }
        data.truncate(size);
        Ok(data)
    }

    fn format_disk(&mut self, progress: &mut dyn FormatProgress) -> Result<()> {
        write_empty_volume(self.image, progress)?;
        self.geometry = Self::validate(self.image)?;
        Ok(())
    }

    fn info(&mut self) -> Result<FileSystemInfo> {
        Ok(FileSystemInfo {
            fs_type: FileSystemType::DragonDos,
            label: String::new(),
            block_size: SECTOR_SIZE,
            total_blocks: self.geometry.total_sectors() as usize,
            free_bytes: self.free_space()?,
        })
    }
}
