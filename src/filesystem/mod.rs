/// Filesystem implementations

pub mod dragondos;
pub mod os9;
pub mod rsdos;

pub use dragondos::{DragonDosEntry, DragonDosFileSystem, SectorAllocationBlock};
pub use os9::{FileDescriptor, FileSegment, Os9Entry, Os9FileSystem};
pub use rsdos::{GranuleChain, RsDosEntry, RsDosFileSystem};

use crate::error::{DiskError, Result};
use crate::geometry::Chs;
use crate::image::DiskImage;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// On-disk filesystem formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileSystemType {
    /// OS-9 RBF: LSN0, allocation bitmap, file descriptors and segment lists
    Os9,
    /// DragonDOS: directory track with bitmap and chained 25-byte entries
    DragonDos,
    /// RS-DOS (Disk Extended Color BASIC): granule map and flat directory
    RsDos,
}

impl FileSystemType {
    /// Get a human-readable name for this filesystem
    pub fn name(&self) -> &'static str {
        match self {
            FileSystemType::Os9 => "OS-9",
            FileSystemType::DragonDos => "DragonDOS",
            FileSystemType::RsDos => "RS-DOS",
        }
    }
}

impl FromStr for FileSystemType {
    type Err = DiskError;

    /// Parse a filesystem name as typed by a user
    fn from_str(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "os9" | "os-9" | "rbf" => Ok(FileSystemType::Os9),
            "dragon" | "dragondos" => Ok(FileSystemType::DragonDos),
            "rsdos" | "rs-dos" | "decb" => Ok(FileSystemType::RsDos),
            _ => Err(DiskError::invalid_format(format!(
                "unknown filesystem: {}",
                name
            ))),
        }
    }
}

impl fmt::Display for FileSystemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives a notification for every (track, head) a format pass completes
pub trait FormatProgress {
    /// Called after `track` on `head` has been written
    fn track_formatted(&mut self, track: u16, head: u8);

    /// Polled before each track; returning true stops the format
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<F: FnMut(u16, u8)> FormatProgress for F {
    fn track_formatted(&mut self, track: u16, head: u8) {
        self(track, head)
    }
}

/// Progress sink that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl FormatProgress for NoProgress {
    fn track_formatted(&mut self, _track: u16, _head: u8) {}
}

/// Progress callback paired with a shared cancellation flag
pub struct CancellableProgress<F> {
    callback: F,
    cancelled: Arc<AtomicBool>,
}

impl<F: FnMut(u16, u8)> CancellableProgress<F> {
    /// Wrap `callback`; setting `cancelled` stops the format before the next track
    pub fn new(callback: F, cancelled: Arc<AtomicBool>) -> Self {
        Self { callback, cancelled }
    }
}

impl<F: FnMut(u16, u8)> FormatProgress for CancellableProgress<F> {
    fn track_formatted(&mut self, track: u16, head: u8) {
        (self.callback)(track, head)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Fill every track of the addressed volume with `fill`
pub(crate) fn fill_volume(
    image: &mut DiskImage,
    fill: u8,
    progress: &mut dyn FormatProgress,
) -> Result<()> {
    let geometry = image.geometry();
    let track = vec![fill; geometry.track_bytes() as usize];
    for t in 0..geometry.tracks {
        for head in 0..geometry.heads {
            if progress.is_cancelled() {
                return Err(DiskError::Cancelled);
            }
            image.write_sectors(Chs::new(t, head, 1), &track)?;
            progress.track_formatted(t, head);
        }
    }
    Ok(())
}

/// Format-specific fields of a directory entry
#[derive(Debug, Clone, PartialEq)]
pub enum EntryDetail {
    /// OS-9 entry with its file descriptor
    Os9(Os9Entry),
    /// RS-DOS entry with its granule chain
    RsDos(RsDosEntry),
    /// DragonDOS entry with its merged extent list
    DragonDos(DragonDosEntry),
}

/// Directory entry
#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    /// Filename as displayed (e.g. "HELLO.BAS")
    pub name: String,
    /// Deleted flag
    pub deleted: bool,
    /// Format-specific fields
    pub detail: EntryDetail,
}

impl DirEntry {
    /// File size in bytes, computed from the entry's allocation
    pub fn size(&self) -> u64 {
        match &self.detail {
            EntryDetail::Os9(entry) => entry.descriptor.size as u64,
            EntryDetail::RsDos(entry) => entry.size(),
            EntryDetail::DragonDos(entry) => entry.size(),
        }
    }

    /// True for OS-9 directories
    pub fn is_directory(&self) -> bool {
        match &self.detail {
            EntryDetail::Os9(entry) => entry.descriptor.is_directory(),
            _ => false,
        }
    }

    /// Filesystem the entry came from
    pub fn fs_type(&self) -> FileSystemType {
        match &self.detail {
            EntryDetail::Os9(_) => FileSystemType::Os9,
            EntryDetail::RsDos(_) => FileSystemType::RsDos,
            EntryDetail::DragonDos(_) => FileSystemType::DragonDos,
        }
    }
}

/// Entries of one directory, in on-disk order
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
    /// Filesystem the directory belongs to
    pub fs_type: FileSystemType,
    /// LSN of the directory (its descriptor on OS-9, the directory track otherwise)
    pub lsn: u32,
    /// The directory's own descriptor (OS-9 only)
    pub descriptor: Option<FileDescriptor>,
    entries: Vec<DirEntry>,
}

impl Directory {
    /// Create an empty directory
    pub fn new(fs_type: FileSystemType, lsn: u32) -> Self {
        Self {
            fs_type,
            lsn,
            descriptor: None,
            entries: Vec::new(),
        }
    }

    /// Append an entry
    pub fn push(&mut self, entry: DirEntry) {
        self.entries.push(entry);
    }

    /// All entries
    pub fn entries(&self) -> &[DirEntry] {
        &self.entries
    }

    /// Find a live entry by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.entries
            .iter()
            .find(|e| !e.deleted && e.name.eq_ignore_ascii_case(name))
    }

    /// True when a live entry has this name
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Remove and return a live entry by name
    pub fn remove(&mut self, name: &str) -> Option<DirEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| !e.deleted && e.name.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(index))
    }

    /// Iterate over the entries
    pub fn iter(&self) -> std::slice::Iter<'_, DirEntry> {
        self.entries.iter()
    }

    /// Number of entries, deleted ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the directory has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Directory {
    type Item = DirEntry;
    type IntoIter = std::vec::IntoIter<DirEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Directory {
    type Item = &'a DirEntry;
    type IntoIter = std::slice::Iter<'a, DirEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Filesystem information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemInfo {
    /// Filesystem type
    pub fs_type: FileSystemType,
    /// Volume label
    pub label: String,
    /// Allocation unit in bytes (cluster, granule or sector)
    pub block_size: usize,
    /// Allocation units on the volume
    pub total_blocks: usize,
    /// Free space in bytes
    pub free_bytes: u64,
}

/// Filesystem trait for accessing files on a mounted volume
///
/// Write operations the format does not support fail with
/// [`DiskError::NotImplemented`].
pub trait FileSystem {
    /// Which format this is
    fn fs_type(&self) -> FileSystemType;

    /// Re-run the format's structural validation against the volume
    fn is_valid_format(&mut self) -> bool;

    /// Volume label
    fn disk_label(&mut self) -> Result<String>;

    /// Change the volume label
    fn set_disk_label(&mut self, _label: &str) -> Result<()> {
        Err(DiskError::NotImplemented("setting the disk label"))
    }

    /// Free space in bytes
    fn free_space(&mut self) -> Result<u64>;

    /// Read a directory; LSN 0 means the root
    fn get_directory(&mut self, lsn: u32) -> Result<Directory>;

    /// Subdirectories of a directory, excluding `.` and `..`
    fn get_directories(&mut self, lsn: u32) -> Result<Vec<DirEntry>> {
        Ok(self
            .get_directory(lsn)?
            .into_iter()
            .filter(|e| !e.deleted && e.is_directory() && e.name != "." && e.name != "..")
            .collect())
    }

    /// Read a file's contents
    fn read_file(&mut self, entry: &DirEntry) -> Result<Vec<u8>>;

    /// Read a file from the root directory by name
    fn read_file_by_name(&mut self, name: &str) -> Result<Vec<u8>> {
        let directory = self.get_directory(0)?;
        let entry = directory
            .get(name)
            .ok_or_else(|| DiskError::FileNotFound(name.to_string()))?;
        self.read_file(entry)
    }

    /// Store a new file in a directory
    fn put_file(&mut self, _directory: u32, _name: &str, _data: &[u8]) -> Result<()> {
        Err(DiskError::NotImplemented("writing files"))
    }

    /// Delete a file
    fn delete_file(&mut self, _entry: &DirEntry) -> Result<()> {
        Err(DiskError::NotImplemented("deleting files"))
    }

    /// Replace a file's contents
    fn replace_file(&mut self, directory: u32, entry: &DirEntry, data: &[u8]) -> Result<()> {
        self.delete_file(entry)?;
        self.put_file(directory, &entry.name, data)
    }

    /// Rename a file
    fn rename_file(&mut self, _entry: &DirEntry, _name: &str) -> Result<()> {
        Err(DiskError::NotImplemented("renaming files"))
    }

    /// Change a file's attribute byte
    fn set_file_attributes(&mut self, _entry: &DirEntry, _attributes: u8) -> Result<()> {
        Err(DiskError::NotImplemented("setting file attributes"))
    }

    /// Create a subdirectory
    fn create_directory(&mut self, _parent: u32, _name: &str) -> Result<()> {
        Err(DiskError::NotImplemented("creating directories"))
    }

    /// Delete a subdirectory
    fn delete_directory(&mut self, _entry: &DirEntry) -> Result<()> {
        Err(DiskError::NotImplemented("deleting directories"))
    }

    /// Rename a subdirectory
    fn rename_directory(&mut self, _entry: &DirEntry, _name: &str) -> Result<()> {
        Err(DiskError::NotImplemented("renaming directories"))
    }

    /// Write a fresh, empty filesystem over the volume
    fn format_disk(&mut self, progress: &mut dyn FormatProgress) -> Result<()>;

    /// Get filesystem information
    fn info(&mut self) -> Result<FileSystemInfo>;
}

/// Side-effect-free check for a filesystem format on the selected volume
pub fn probe(image: &mut DiskImage, fs_type: FileSystemType) -> bool {
    match fs_type {
        FileSystemType::Os9 => Os9FileSystem::probe(image),
        FileSystemType::DragonDos => DragonDosFileSystem::probe(image),
        FileSystemType::RsDos => RsDosFileSystem::probe(image),
    }
}

/// Mount a filesystem of the given format on the selected volume
pub fn mount(image: &mut DiskImage, fs_type: FileSystemType) -> Result<Box<dyn FileSystem + '_>> {
    let fs: Box<dyn FileSystem + '_> = match fs_type {
        FileSystemType::Os9 => Box::new(Os9FileSystem::mount(image)?),
        FileSystemType::DragonDos => Box::new(DragonDosFileSystem::mount(image)?),
        FileSystemType::RsDos => Box::new(RsDosFileSystem::mount(image)?),
    };
    Ok(fs)
}

/// Write a new filesystem of the given format and mount it
pub fn format<'a>(
    image: &'a mut DiskImage,
    fs_type: FileSystemType,
    progress: &mut dyn FormatProgress,
) -> Result<Box<dyn FileSystem + 'a>> {
    let fs: Box<dyn FileSystem + 'a> = match fs_type {
        FileSystemType::Os9 => Box::new(Os9FileSystem::format(image, progress)?),
        FileSystemType::DragonDos => Box::new(DragonDosFileSystem::format(image, progress)?),
        FileSystemType::RsDos => Box::new(RsDosFileSystem::format(image, progress)?),
    };
    Ok(fs)
}
