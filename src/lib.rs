/*!
# cocodisk

A Rust library for reading and writing Dragon and Tandy Color Computer disk
images, with OS-9, RS-DOS and DragonDOS filesystem support.

## Features

- JVC, VDK, raw OS-9, DMK and hard disk (VHD) containers, including hard
  disks split into an OS-9 volume and RGB-DOS partitions
- Sector access by track/head/sector or by logical sector number
- DMK track images with ID address mark tables and CRC16 fields
- OS-9 RBF, RS-DOS and DragonDOS directory listing and file reads
- Formatting of all three filesystems with progress and cancellation

## Quick Start

```rust,no_run
use cocodisk::{filesystem, DiskImage, DiskImageType, FileSystemType, FormatSpec};

// Open an existing image; the container type follows the file extension
let mut image = DiskImage::open("games.dsk")?;

// Read a sector
let data = image.read_sector(17, 0, 3)?;

// Mount whichever filesystem the disk holds
for fs_type in [FileSystemType::Os9, FileSystemType::DragonDos, FileSystemType::RsDos] {
    if filesystem::probe(&mut image, fs_type) {
        let mut fs = filesystem::mount(&mut image, fs_type)?;
        for entry in &fs.get_directory(0)? {
            println!("{}: {} bytes", entry.name, entry.size());
        }
        break;
    }
}

// Create and format a new OS-9 disk
let mut blank = DiskImage::create("new.os9", DiskImageType::Os9, FormatSpec::os9_40_ds())?;
filesystem::format(&mut blank, FileSystemType::Os9, &mut cocodisk::NoProgress)?;
# Ok::<(), cocodisk::DiskError>(())
```

## Modules

- `io`: byte sources backing an image (file or memory)
- `image`: containers and sector addressing
- `format`: container types, presets and layout constants
- `filesystem`: OS-9, RS-DOS and DragonDOS
- `geometry`: CHS and LSN translation
- `error`: Error types and Result alias
*/

#![warn(missing_docs)]

/// Big-endian fields, padded strings and packed dates
pub mod codec;
/// CRC16-CCITT as used by MFM address marks
pub mod crc16;
/// Error types and Result alias
pub mod error;
/// Filesystem implementations (OS-9, RS-DOS, DragonDOS)
pub mod filesystem;
/// Container types, presets and constants
pub mod format;
/// Physical geometry and address translation
pub mod geometry;
/// Disk image containers
pub mod image;
/// Byte sources backing disk images
pub mod io;

// Re-export common types
pub use error::{DiskError, Result};
pub use filesystem::{
    CancellableProgress, DirEntry, Directory, DragonDosEntry, DragonDosFileSystem, EntryDetail,
    FileDescriptor, FileSegment, FileSystem, FileSystemInfo, FileSystemType, FormatProgress,
    GranuleChain, NoProgress, Os9Entry, Os9FileSystem, RsDosEntry, RsDosFileSystem,
    SectorAllocationBlock,
};
pub use format::{DiskImageType, FormatSpec};
pub use geometry::{Chs, Geometry};
pub use image::{DiskImage, DiskImageBuilder, JvcHeader, PartitionTable};
pub use io::{ByteSource, FileSource, MemorySource};
