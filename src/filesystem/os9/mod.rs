//! OS-9 RBF filesystem
//!
//! LSN0 describes the volume. The allocation bitmap starts at LSN 1 with one
//! bit per cluster, most significant bit first. Files and directories are
//! reached through file descriptor sectors whose segment lists hold the data;
//! directories are files of 32-byte slots.

mod descriptor;
mod lsn0;

pub use descriptor::{DirectorySlot, FileDescriptor, FileSegment, Os9Attributes, SEGMENT_COUNT};
pub use lsn0::{Lsn0, PathDescriptor};

use super::{
    fill_volume, DirEntry, Directory, EntryDetail, FileSystem, FileSystemInfo, FileSystemType,
    FormatProgress,
};
use crate::codec::{encode_date, encode_date_time};
use crate::error::{DiskError, Result};
use crate::format::OS9_HARD_DISK_FORMAT;
use crate::geometry::Geometry;
use crate::image::DiskImage;
use chrono::Local;
use log::{debug, info, warn};

/// Fill byte written over a freshly formatted volume
const FORMAT_FILL: u8 = 0xE5;

/// Sectors given to the root directory's data on format
const ROOT_DIRECTORY_SECTORS: u16 = 7;

/// Largest bitmap LSN0 can describe
const MAX_MAP_BYTES: u32 = 0xFFFF;

/// OS-9 directory entry fields
#[derive(Debug, Clone, PartialEq)]
pub struct Os9Entry {
    /// LSN of the entry's file descriptor
    pub descriptor_lsn: u32,
    /// The file descriptor, loaded when the directory is read
    pub descriptor: FileDescriptor,
}

/// Cluster allocation bitmap, most significant bit first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationBitmap {
    bytes: Vec<u8>,
}

impl AllocationBitmap {
    /// Wrap raw bitmap bytes
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// A bitmap of `len` bytes with every bit set
    pub fn full(len: usize) -> Self {
        Self {
            bytes: vec![0xFF; len],
        }
    }

    /// Is a cluster allocated? Clusters past the end count as allocated.
    pub fn is_allocated(&self, cluster: u32) -> bool {
        self.bytes
            .get((cluster / 8) as usize)
            .map_or(true, |&b| b & (0x80 >> (cluster % 8)) != 0)
    }

    /// Mark a cluster allocated or free
    pub fn set_allocated(&mut self, cluster: u32, allocated: bool) {
        if let Some(byte) = self.bytes.get_mut((cluster / 8) as usize) {
            let mask = 0x80 >> (cluster % 8);
            if allocated {
                *byte |= mask;
            } else {
                *byte &= !mask;
            }
        }
    }

    /// Free clusters among the first `clusters`
    pub fn free_count(&self, clusters: u32) -> u32 {
        (0..clusters).filter(|&c| !self.is_allocated(c)).count() as u32
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// OS-9 filesystem mounted on a disk image
pub struct Os9FileSystem<'a> {
    image: &'a mut DiskImage,
    lsn0: Lsn0,
}

impl<'a> Os9FileSystem<'a> {
    /// Mount the selected volume, failing unless it validates as OS-9
    pub fn mount(image: &'a mut DiskImage) -> Result<Self> {
        let lsn0 = Self::validate(image)?;
        debug!(
            "Mounted OS-9 volume '{}' with {} sectors",
            lsn0.volume_name, lsn0.total_sectors
        );
        Ok(Self { image, lsn0 })
    }

    /// Check for an OS-9 volume without mounting it
    pub fn probe(image: &mut DiskImage) -> bool {
        match Self::validate(image) {
            Ok(_) => true,
            Err(e) => {
                debug!("Not an OS-9 volume: {}", e);
                false
            }
        }
    }

    /// Format the selected volume and mount the result
    pub fn format(image: &'a mut DiskImage, progress: &mut dyn FormatProgress) -> Result<Self> {
        write_empty_volume(image, progress)?;
        Self::mount(image)
    }

    fn validate(image: &mut DiskImage) -> Result<Lsn0> {
        let lsn0 = Lsn0::decode(&image.read_lsn(0)?)?;
        let total = lsn0.total_sectors;
        let spt = lsn0.sectors_per_track as u32;
        let heads = lsn0.heads() as u32;

        if total == 0 || spt == 0 {
            return Err(DiskError::invalid_format("LSN0 describes an empty volume"));
        }
        if lsn0.logical_sector_size() != image.geometry().sector_size {
            return Err(DiskError::invalid_format(format!(
                "LSN0 sector size {} differs from the image's {}",
                lsn0.logical_sector_size(),
                image.geometry().sector_size
            )));
        }
        if lsn0.track_size as u32 != spt {
            return Err(DiskError::invalid_format(format!(
                "track size {} differs from {} sectors per track",
                lsn0.track_size, spt
            )));
        }
        if total % spt != 0 || (total / spt / heads) * heads * spt != total {
            return Err(DiskError::invalid_format(format!(
                "{} sectors is not a whole number of {}x{} cylinders",
                total, heads, spt
            )));
        }
        if total > image.geometry().total_sectors() {
            return Err(DiskError::invalid_format(format!(
                "volume of {} sectors is larger than the image",
                total
            )));
        }
        if lsn0.cluster_size == 0 {
            return Err(DiskError::invalid_format("cluster size is zero"));
        }

        let clusters = total.div_ceil(lsn0.cluster_size as u32);
        if (lsn0.map_bytes as u32) * 8 < clusters {
            return Err(DiskError::invalid_format(format!(
                "bitmap of {} bytes cannot cover {} clusters",
                lsn0.map_bytes, clusters
            )));
        }
        let bitmap_sectors = lsn0.bitmap_sectors();
        if 1 + bitmap_sectors > lsn0.root_directory || lsn0.root_directory >= total {
            return Err(DiskError::invalid_format(format!(
                "root directory at LSN {} overlaps the bitmap or lies outside the volume",
                lsn0.root_directory
            )));
        }

        let bitmap = read_bitmap(image, &lsn0)?;
        for lsn in 0..=bitmap_sectors {
            if !bitmap.is_allocated(lsn / lsn0.cluster_size as u32) {
                return Err(DiskError::invalid_format(format!(
                    "LSN {} holds volume metadata but is marked free",
                    lsn
                )));
            }
        }
        Ok(lsn0)
    }

    /// The volume's LSN0
    pub fn lsn0(&self) -> &Lsn0 {
        &self.lsn0
    }

    /// Logical geometry recorded in LSN0
    pub fn geometry(&self) -> Geometry {
        let spt = self.lsn0.sectors_per_track;
        let heads = self.lsn0.heads();
        let tracks = self.lsn0.total_sectors / spt as u32 / heads as u32;
        Geometry::new(tracks as u16, heads, spt, self.lsn0.logical_sector_size())
    }

    fn sector_size(&self) -> usize {
        self.lsn0.logical_sector_size() as usize
    }

    /// Read the allocation bitmap
    pub fn bitmap(&mut self) -> Result<AllocationBitmap> {
        read_bitmap(self.image, &self.lsn0)
    }

    /// Read and decode a file descriptor
    pub fn read_descriptor(&mut self, lsn: u32) -> Result<FileDescriptor> {
        FileDescriptor::decode(&self.image.read_lsn(lsn)?)
    }

    /// Read the bytes a descriptor's segment list covers, up to its size
    fn read_segments(&mut self, descriptor: &FileDescriptor) -> Result<Vec<u8>> {
        let size = descriptor.size as usize;
        let sector_size = self.sector_size();
        let allocated = descriptor.allocated_sectors() as usize * sector_size;
        if size > allocated {
            return Err(DiskError::filesystem(format!(
                "file size of {} bytes exceeds the {} bytes its segments allocate",
                size, allocated
            )));
        }
        let mut data = Vec::with_capacity(size);

        for segment in descriptor.used_segments() {
            let remaining = size - data.len();
            if remaining == 0 {
                break;
            }
            let sectors = remaining.div_ceil(sector_size).min(segment.sectors as usize);
            let bytes = self.image.read_lsns(segment.lsn, sectors as u32)?;
            data.extend_from_slice(&bytes[..remaining.min(bytes.len())]);
        }

        if data.len() < size {
            return Err(DiskError::filesystem(format!(
                "segment list covers {} of {} bytes",
                data.len(),
                size
            )));
        }
        Ok(data)
    }
}

fn read_bitmap(image: &mut DiskImage, lsn0: &Lsn0) -> Result<AllocationBitmap> {
    let mut bytes = image.read_lsns(1, lsn0.bitmap_sectors())?;
    bytes.truncate(lsn0.map_bytes as usize);
    Ok(AllocationBitmap::new(bytes))
}

/// Lay down LSN0, the bitmap and an empty root directory
fn write_empty_volume(image: &mut DiskImage, progress: &mut dyn FormatProgress) -> Result<()> {
    let geometry = image.geometry();
    geometry.validate()?;

    let total = geometry.total_sectors();
    if total > 0xFF_FFFF {
        return Err(DiskError::geometry(format!(
            "{} sectors do not fit a 24-bit LSN",
            total
        )));
    }
    let track_size = u8::try_from(geometry.sectors_per_track).map_err(|_| {
        DiskError::geometry(format!(
            "{} sectors per track do not fit LSN0",
            geometry.sectors_per_track
        ))
    })?;

    let mut cluster_size = 1u32;
    while total.div_ceil(cluster_size).div_ceil(8) > MAX_MAP_BYTES {
        cluster_size *= 2;
    }
    let clusters = total.div_ceil(cluster_size);
    let map_bytes = clusters.div_ceil(8);
    let sector_size = geometry.sector_size as u32;
    let bitmap_sectors = map_bytes.div_ceil(sector_size);
    let root = 1 + bitmap_sectors;
    let reserved = root + 1 + ROOT_DIRECTORY_SECTORS as u32;
    if reserved > total {
        return Err(DiskError::geometry(format!(
            "{} sectors is too small for an OS-9 volume",
            total
        )));
    }

    info!("Formatting OS-9 volume: {}", geometry);
    fill_volume(image, FORMAT_FILL, progress)?;

    let hard_disk = image.is_hard_disk();
    let now = Local::now().naive_local();
    let lsn0 = Lsn0 {
        total_sectors: total,
        track_size,
        map_bytes: map_bytes as u16,
        cluster_size: cluster_size as u16,
        root_directory: root,
        owner: 0,
        attributes: 0xFF,
        disk_id: rand::random::<u16>(),
        disk_format: if hard_disk {
            OS9_HARD_DISK_FORMAT
        } else {
            0x02 + (geometry.heads - 1)
        },
        sectors_per_track: geometry.sectors_per_track,
        created: encode_date_time(now),
        volume_name: String::new(),
        path_descriptor: PathDescriptor {
            device_class: 1,
            device_type: 0x20,
            density: 1,
            cylinders: geometry.tracks,
            sides: geometry.heads,
            sectors_per_track: geometry.sectors_per_track,
            sectors_per_track0: geometry.sectors_per_track,
            interleave: image.interleave(),
            segment_allocation_size: if hard_disk { 0x20 } else { 8 },
            ..PathDescriptor::default()
        },
        sector_size: geometry.sector_size,
        ..Lsn0::default()
    };
    image.write_lsn(0, &lsn0.encode(sector_size as usize))?;

    let mut bitmap = AllocationBitmap::full((bitmap_sectors * sector_size) as usize);
    for cluster in 0..clusters {
        bitmap.set_allocated(cluster, false);
    }
    for lsn in 0..reserved {
        bitmap.set_allocated(lsn / cluster_size, true);
    }
    image.write_lsns(1, bitmap.as_bytes())?;

    let root_descriptor = FileDescriptor {
        attributes: Os9Attributes(0xBF),
        owner: 0,
        modified: encode_date_time(now),
        link_count: 2,
        size: 2 * DirectorySlot::SIZE as u32,
        created: encode_date(now.date()),
        segments: vec![FileSegment::new(root + 1, ROOT_DIRECTORY_SECTORS)],
    };
    image.write_lsn(root, &root_descriptor.encode(sector_size as usize)?)?;

    let mut data = vec![0u8; ROOT_DIRECTORY_SECTORS as usize * sector_size as usize];
    for (i, name) in ["..", "."].iter().enumerate() {
        let slot = DirectorySlot {
            name: name.to_string(),
            descriptor_lsn: root,
        };
        data[i * DirectorySlot::SIZE..(i + 1) * DirectorySlot::SIZE].copy_from_slice(&slot.encode());
    }
    image.write_lsns(root + 1, &data)?;
    image.flush()?;
    Ok(())
}

impl FileSystem for Os9FileSystem<'_> {
    fn fs_type(&self) -> FileSystemType {
        FileSystemType::Os9
    }

    fn is_valid_format(&mut self) -> bool {
        match Self::validate(self.image) {
            Ok(lsn0) => {
                self.lsn0 = lsn0;
                true
            }
            Err(e) => {
                warn!("OS-9 validation failed: {}", e);
                false
            }
        }
    }

    fn disk_label(&mut self) -> Result<String> {
        Ok(self.lsn0.volume_name.clone())
    }

    fn set_disk_label(&mut self, label: &str) -> Result<()> {
        let mut lsn0 = self.lsn0.clone();
        lsn0.volume_name = label.to_string();

        let mut sector = self.image.read_lsn(0)?;
        let encoded = lsn0.encode(sector.len());
        sector[..Lsn0::SIZE].copy_from_slice(&encoded[..Lsn0::SIZE]);
        self.image.write_lsn(0, &sector)?;
        self.lsn0 = lsn0;
        Ok(())
    }

    fn free_space(&mut self) -> Result<u64> {
        let bitmap = self.bitmap()?;
        let cluster = self.lsn0.cluster_size as u32;
        let clusters = self
            .lsn0
            .total_sectors
            .div_ceil(cluster)
            .min(self.lsn0.map_bytes as u32 * 8);
        Ok(bitmap.free_count(clusters) as u64 * cluster as u64 * self.sector_size() as u64)
    }

    fn get_directory(&mut self, lsn: u32) -> Result<Directory> {
        let lsn = if lsn == 0 {
            self.lsn0.root_directory
        } else {
            lsn
        };
        let descriptor = self.read_descriptor(lsn)?;
        if !descriptor.is_directory() {
            return Err(DiskError::filesystem(format!(
                "LSN {} is not a directory",
                lsn
            )));
        }

        let data = self.read_segments(&descriptor)?;
        let mut directory = Directory::new(FileSystemType::Os9, lsn);
        directory.descriptor = Some(descriptor);

        for raw in data.chunks_exact(DirectorySlot::SIZE) {
            let Some(slot) = DirectorySlot::decode(raw)? else {
                continue;
            };
            let descriptor = self.read_descriptor(slot.descriptor_lsn)?;
            directory.push(DirEntry {
                name: slot.name,
                deleted: false,
                detail: EntryDetail::Os9(Os9Entry {
                    descriptor_lsn: slot.descriptor_lsn,
                    descriptor,
                }),
            });
        }
        Ok(directory)
    }

    fn read_file(&mut self, entry: &DirEntry) -> Result<Vec<u8>> {
        match &entry.detail {
            EntryDetail::Os9(os9) => self.read_segments(&os9.descriptor),
            _ => Err(DiskError::filesystem(format!(
                "{} is not an OS-9 entry",
                entry.name
            ))),
        }
    }

    fn format_disk(&mut self, progress: &mut dyn FormatProgress) -> Result<()> {
        write_empty_volume(self.image, progress)?;
        self.lsn0 = Self::validate(self.image)?;
        Ok(())
    }

    fn info(&mut self) -> Result<FileSystemInfo> {
        let cluster = self.lsn0.cluster_size as usize;
        Ok(FileSystemInfo {
            fs_type: FileSystemType::Os9,
            label: self.lsn0.volume_name.clone(),
            block_size: cluster * self.sector_size(),
            total_blocks: (self.lsn0.total_sectors as usize).div_ceil(cluster),
            free_bytes: self.free_space()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::NoProgress;
    use crate::format::{DiskImageType, FormatSpec};

    fn formatted(spec: FormatSpec) -> DiskImage {
        let mut image = DiskImage::builder()
            .image_type(DiskImageType::Jvc)
            .spec(spec)
            .build()
            .unwrap();
        write_empty_volume(&mut image, &mut NoProgress).unwrap();
        image
    }

    /// Add a file or directory to the root of a freshly formatted volume
    fn add_entry(image: &mut DiskImage, name: &str, fd_lsn: u32, attributes: u8, data: &[u8]) {
        let root = Lsn0::decode(&image.read_lsn(0).unwrap()).unwrap().root_directory;
        let data_lsn = fd_lsn + 1;
        let sectors = data.len().div_ceil(256).max(1) as u16;
        let fd = FileDescriptor {
            attributes: Os9Attributes(attributes),
            size: data.len() as u32,
            segments: vec![FileSegment::new(data_lsn, sectors)],
            ..FileDescriptor::default()
        };
        image.write_lsn(fd_lsn, &fd.encode(256).unwrap()).unwrap();
        image.write_lsns(data_lsn, data).unwrap();

        let mut root_fd = FileDescriptor::decode(&image.read_lsn(root).unwrap()).unwrap();
        let index = root_fd.size as usize / 32;
        root_fd.size += 32;
        image.write_lsn(root, &root_fd.encode(256).unwrap()).unwrap();

        let dir_lsn = root + 1;
        let mut sector = image.read_lsn(dir_lsn).unwrap();
        let slot = DirectorySlot {
            name: name.to_string(),
            descriptor_lsn: fd_lsn,
        };
        sector[index * 32..index * 32 + 32].copy_from_slice(&slot.encode());
        image.write_lsn(dir_lsn, &sector).unwrap();
    }

    #[test]
    fn test_fresh_root_directory() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        let mut fs = Os9FileSystem::mount(&mut image).unwrap();
        let root = fs.lsn0().root_directory;
        assert_eq!(root, 2);

        let directory = fs.get_directory(0).unwrap();
        let names: Vec<&str> = directory.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["..", "."]);
        for entry in &directory {
            match &entry.detail {
                EntryDetail::Os9(os9) => assert_eq!(os9.descriptor_lsn, root),
                _ => panic!("expected an OS-9 entry"),
            }
            assert!(entry.is_directory());
        }
        assert_eq!(directory.lsn, root);
        assert!(fs.get_directories(0).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_free_space() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        let mut fs = Os9FileSystem::mount(&mut image).unwrap();
        // LSN0, one bitmap sector, root descriptor and 7 directory sectors
        assert_eq!(fs.free_space().unwrap(), (630 - 10) * 256);
    }

    #[test]
    fn test_fresh_lsn0_fields() {
        let mut image = formatted(FormatSpec::os9_40_ds());
        let fs = Os9FileSystem::mount(&mut image).unwrap();
        let lsn0 = fs.lsn0();
        assert_eq!(lsn0.total_sectors, 1440);
        assert_eq!(lsn0.map_bytes, 180);
        assert_eq!(lsn0.disk_format, 0x03);
        assert_eq!(lsn0.path_descriptor.cylinders, 40);
        assert_eq!(lsn0.path_descriptor.interleave, 3);
        assert_eq!(lsn0.path_descriptor.segment_allocation_size, 8);
        assert!(lsn0.creation_date().is_some());
        assert_eq!(fs.geometry(), Geometry::new(40, 2, 18, 256));
    }

    #[test]
    fn test_bitmap_msb_first() {
        let bitmap = AllocationBitmap::new(vec![0x80, 0x01]);
        assert!(bitmap.is_allocated(0));
        assert!(!bitmap.is_allocated(7));
        assert!(bitmap.is_allocated(15));
        assert!(!bitmap.is_allocated(8));
        assert!(bitmap.is_allocated(16));
        assert_eq!(bitmap.free_count(16), 14);
    }

    #[test]
    fn test_read_file_and_subdirectory() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        let text: Vec<u8> = (0..300).map(|i| (i % 251) as u8).collect();
        add_entry(&mut image, "hello", 40, 0x1B, &text);
        add_entry(&mut image, "CMDS", 50, 0x80, &[]);

        let mut fs = Os9FileSystem::mount(&mut image).unwrap();
        let directory = fs.get_directory(0).unwrap();
        assert_eq!(directory.len(), 4);

        let hello = directory.get("HELLO").unwrap();
        assert_eq!(hello.size(), 300);
        assert!(!hello.is_directory());
        assert_eq!(fs.read_file(hello).unwrap(), text);
        assert_eq!(fs.read_file_by_name("hello").unwrap(), text);

        let subdirectories = fs.get_directories(0).unwrap();
        assert_eq!(subdirectories.len(), 1);
        assert_eq!(subdirectories[0].name, "CMDS");

        assert!(matches!(
            fs.read_file_by_name("missing"),
            Err(DiskError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_deleted_slots_are_skipped() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        add_entry(&mut image, "gone", 40, 0x1B, b"data");
        add_entry(&mut image, "kept", 42, 0x1B, b"data");
        // Zero the first byte of the "gone" slot
        let mut sector = image.read_lsn(3).unwrap();
        sector[64] = 0;
        image.write_lsn(3, &sector).unwrap();

        let mut fs = Os9FileSystem::mount(&mut image).unwrap();
        let directory = fs.get_directory(0).unwrap();
        assert_eq!(directory.len(), 3);
        assert!(directory.contains("kept"));
        assert!(!directory.contains("gone"));
    }

    #[test]
    fn test_size_beyond_segments_is_rejected() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        add_entry(&mut image, "huge", 40, 0x1B, b"data");
        let mut fd = FileDescriptor::decode(&image.read_lsn(40).unwrap()).unwrap();
        fd.size = 0xFFFF_FF00;
        image.write_lsn(40, &fd.encode(256).unwrap()).unwrap();

        let mut fs = Os9FileSystem::mount(&mut image).unwrap();
        let directory = fs.get_directory(0).unwrap();
        let huge = directory.get("huge").unwrap();
        assert_eq!(huge.size(), 0xFFFF_FF00);
        assert!(matches!(
            fs.read_file(huge),
            Err(DiskError::FileSystemError(_))
        ));
    }

    #[test]
    fn test_file_not_directory() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        add_entry(&mut image, "plain", 40, 0x1B, b"text");
        let mut fs = Os9FileSystem::mount(&mut image).unwrap();
        assert!(fs.get_directory(40).is_err());
    }

    #[test]
    fn test_label() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        let mut fs = Os9FileSystem::mount(&mut image).unwrap();
        assert_eq!(fs.disk_label().unwrap(), "");
        fs.set_disk_label("Utilities").unwrap();
        drop(fs);

        let mut fs = Os9FileSystem::mount(&mut image).unwrap();
        assert_eq!(fs.disk_label().unwrap(), "Utilities");
        assert_eq!(fs.info().unwrap().label, "Utilities");
    }

    #[test]
    fn test_unallocated_metadata_is_invalid() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        let mut bitmap = image.read_lsn(1).unwrap();
        bitmap[0] &= 0x3F;
        image.write_lsn(1, &bitmap).unwrap();
        assert!(!Os9FileSystem::probe(&mut image));
    }

    #[test]
    fn test_blank_image_is_not_os9() {
        let mut image = DiskImage::builder().build().unwrap();
        assert!(!Os9FileSystem::probe(&mut image));
        assert!(Os9FileSystem::mount(&mut image).is_err());
    }

    #[test]
    fn test_track_size_mismatch_is_invalid() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        let mut sector = image.read_lsn(0).unwrap();
        sector[3] = 17;
        image.write_lsn(0, &sector).unwrap();
        assert!(!Os9FileSystem::probe(&mut image));
    }

    #[test]
    fn test_write_operations_not_implemented() {
        let mut image = formatted(FormatSpec::os9_35_ss());
        let mut fs = Os9FileSystem::mount(&mut image).unwrap();
        assert!(matches!(
            fs.put_file(0, "new", b"data"),
            Err(DiskError::NotImplemented(_))
        ));
        assert!(matches!(
            fs.create_directory(0, "SYS"),
            Err(DiskError::NotImplemented(_))
        ));
        let entry = fs.get_directory(0).unwrap().into_iter().next().unwrap();
        assert!(fs.delete_file(&entry).is_err());
        assert!(fs.rename_file(&entry, "x").is_err());
        assert!(fs.set_file_attributes(&entry, 0).is_err());
    }

    #[test]
    fn test_hard_disk_format() {
        let mut image = DiskImage::builder()
            .image_type(DiskImageType::Vhd)
            .spec(FormatSpec::new(1, 64, 32, 256))
            .build()
            .unwrap();
        let fs = Os9FileSystem::format(&mut image, &mut NoProgress).unwrap();
        assert_eq!(fs.lsn0().disk_format, OS9_HARD_DISK_FORMAT);
        assert_eq!(fs.lsn0().path_descriptor.segment_allocation_size, 0x20);
        drop(fs);

        assert!(image.probe_geometry().unwrap());
        assert_eq!(image.geometry(), Geometry::new(64, 1, 32, 256));
    }

    #[test]
    fn test_format_reports_progress() {
        let mut image = DiskImage::builder()
            .spec(FormatSpec::os9_35_ss())
            .build()
            .unwrap();
        let mut calls = 0;
        {
            let mut progress = |_t: u16, _h: u8| calls += 1;
            let mut fs = Os9FileSystem::format(&mut image, &mut progress).unwrap();
            assert!(fs.is_valid_format());
        }
        assert_eq!(calls, 35);
    }
}
