/// Container formats, presets and layout constants

/// Format constants
pub mod constants;
/// Format specification types
pub mod spec;

pub use constants::*;
pub use spec::FormatSpec;

use crate::error::{DiskError, Result};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Disk image container type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiskImageType {
    /// Raw sectors with an optional 0-5 byte header
    Jvc,
    /// Raw sectors behind a 12-byte `dk` header
    Vdk,
    /// Raw OS-9 volume, geometry taken from LSN0
    Os9,
    /// MFM track image with ID address mark tables
    Dmk,
    /// Raw hard disk holding a single OS-9 volume
    Vhd,
    /// Hard disk holding an OS-9 volume followed by RGB-DOS partitions
    PartitionedVhd,
}

impl DiskImageType {
    /// All container types
    pub const ALL: [DiskImageType; 6] = [
        DiskImageType::Jvc,
        DiskImageType::Vdk,
        DiskImageType::Os9,
        DiskImageType::Dmk,
        DiskImageType::Vhd,
        DiskImageType::PartitionedVhd,
    ];

    /// Get a human-readable name for this container
    pub fn name(&self) -> &'static str {
        match self {
            DiskImageType::Jvc => "JVC",
            DiskImageType::Vdk => "VDK",
            DiskImageType::Os9 => "OS-9",
            DiskImageType::Dmk => "DMK",
            DiskImageType::Vhd => "VHD",
            DiskImageType::PartitionedVhd => "Partitioned VHD",
        }
    }

    /// File extension used when creating this container
    pub fn extension(&self) -> &'static str {
        match self {
            DiskImageType::Jvc => "dsk",
            DiskImageType::Vdk => "vdk",
            DiskImageType::Os9 => "os9",
            DiskImageType::Dmk => "dmk",
            DiskImageType::Vhd | DiskImageType::PartitionedVhd => "vhd",
        }
    }

    /// True for hard disk containers
    pub fn is_hard_disk(&self) -> bool {
        matches!(self, DiskImageType::Vhd | DiskImageType::PartitionedVhd)
    }
}

impl FromStr for DiskImageType {
    type Err = DiskError;

    /// Parse a container name as typed by a user
    fn from_str(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "jvc" | "dsk" => Ok(DiskImageType::Jvc),
            "vdk" => Ok(DiskImageType::Vdk),
            "os9" => Ok(DiskImageType::Os9),
            "dmk" => Ok(DiskImageType::Dmk),
            "vhd" => Ok(DiskImageType::Vhd),
            "pvhd" | "partitioned" => Ok(DiskImageType::PartitionedVhd),
            _ => Err(DiskError::invalid_format(format!(
                "unknown image type: {}",
                name
            ))),
        }
    }
}

impl fmt::Display for DiskImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Container types to try, in order, for a file name
pub fn candidates_for_path<P: AsRef<Path>>(path: P) -> &'static [DiskImageType] {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jvc" => &[DiskImageType::Jvc],
        "vdk" => &[DiskImageType::Vdk],
        "os9" => &[DiskImageType::Os9],
        "dmk" => &[DiskImageType::Dmk],
        "vhd" => &[DiskImageType::Vhd, DiskImageType::PartitionedVhd],
        "dsk" => &[DiskImageType::Jvc, DiskImageType::Dmk],
        _ => &[DiskImageType::Jvc, DiskImageType::Dmk, DiskImageType::Vdk],
    }
}
