use thiserror::Error;

/// Result type alias for disk image operations
pub type Result<T> = std::result::Result<T, DiskError>;

/// Errors that can occur when working with disk images and their filesystems
#[derive(Debug, Error)]
pub enum DiskError {
    /// I/O error occurred while reading or writing the byte source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The container failed its geometry probe and refuses sector access
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// The volume does not hold a valid filesystem of the requested format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Geometry is inconsistent or unsupported
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Physical address outside the current geometry
    #[error("Sector out of range: track {track}, head {head}, sector {sector}")]
    OutOfRange {
        /// Track number
        track: u16,
        /// Head (side) number
        head: u8,
        /// Sector number (1-based)
        sector: u16,
    },

    /// Logical sector number outside the current geometry
    #[error("LSN {lsn} out of range (total sectors: {total})")]
    LsnOutOfRange {
        /// Requested logical sector number
        lsn: u32,
        /// Number of addressable sectors
        total: u32,
    },

    /// No ID address mark matched the requested sector
    #[error("Sector not found: track {track}, head {head}, sector {sector}")]
    SectorNotFound {
        /// Track number
        track: u16,
        /// Head (side) number
        head: u8,
        /// Sector number (1-based)
        sector: u16,
    },

    /// Parse error at specific offset
    #[error("Parse error at offset {offset}: {message}")]
    ParseError {
        /// Byte offset where error occurred
        offset: u64,
        /// Error message
        message: String,
    },

    /// Filesystem-related error
    #[error("Filesystem error: {0}")]
    FileSystemError(String),

    /// File not found in directory
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Operation the filesystem does not support
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Partition index outside the partition table
    #[error("Invalid partition {index} (partitions: {count})")]
    InvalidPartition {
        /// Requested partition
        index: u32,
        /// Number of partitions on the image
        count: u32,
    },

    /// A long-running operation was cancelled by its progress sink
    #[error("Operation cancelled")]
    Cancelled,
}

impl DiskError {
    /// Create a parse error with context
    pub fn parse<S: Into<String>>(offset: u64, message: S) -> Self {
        DiskError::ParseError {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid image error
    pub fn invalid_image<S: Into<String>>(message: S) -> Self {
        DiskError::InvalidImage(message.into())
    }

    /// Create an invalid format error
    pub fn invalid_format<S: Into<String>>(message: S) -> Self {
        DiskError::InvalidFormat(message.into())
    }

    /// Create an invalid geometry error
    pub fn geometry<S: Into<String>>(message: S) -> Self {
        DiskError::InvalidGeometry(message.into())
    }

    /// Create a filesystem error
    pub fn filesystem<S: Into<String>>(message: S) -> Self {
        DiskError::FileSystemError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiskError::OutOfRange {
            track: 40,
            head: 0,
            sector: 1,
        };
        assert_eq!(
            err.to_string(),
            "Sector out of range: track 40, head 0, sector 1"
        );
    }

    #[test]
    fn test_parse_error() {
        let err = DiskError::parse(256, "Read past end of image");
        assert_eq!(
            err.to_string(),
            "Parse error at offset 256: Read past end of image"
        );
    }

    #[test]
    fn test_not_implemented() {
        let err = DiskError::NotImplemented("put_file");
        assert_eq!(err.to_string(), "Not implemented: put_file");
    }
}
