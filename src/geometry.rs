/// Physical geometry and CHS/LSN address translation

use crate::error::{DiskError, Result};
use std::fmt;

/// Physical layout of a disk volume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Tracks (cylinders) per side
    pub tracks: u16,
    /// Number of heads (sides)
    pub heads: u8,
    /// Sectors per track
    pub sectors_per_track: u16,
    /// Sector size in bytes
    pub sector_size: u16,
}

/// A physical (track, head, sector) address; sectors are numbered from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Chs {
    /// Track (cylinder)
    pub track: u16,
    /// Head (side)
    pub head: u8,
    /// Sector, 1-based
    pub sector: u16,
}

impl Chs {
    /// Create a new address
    pub fn new(track: u16, head: u8, sector: u16) -> Self {
        Self {
            track,
            head,
            sector,
        }
    }
}

impl fmt::Display for Chs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.track, self.head, self.sector)
    }
}

impl Geometry {
    /// Create a new geometry
    pub fn new(tracks: u16, heads: u8, sectors_per_track: u16, sector_size: u16) -> Self {
        Self {
            tracks,
            heads,
            sectors_per_track,
            sector_size,
        }
    }

    /// Fail unless every dimension is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.tracks == 0 || self.heads == 0 || self.sectors_per_track == 0 || self.sector_size == 0 {
            return Err(DiskError::geometry(format!("zero dimension in {}", self)));
        }
        Ok(())
    }

    /// Total number of addressable sectors
    pub fn total_sectors(&self) -> u32 {
        self.tracks as u32 * self.heads as u32 * self.sectors_per_track as u32
    }

    /// Size of one track (one head) in bytes
    pub fn track_bytes(&self) -> u64 {
        self.sectors_per_track as u64 * self.sector_size as u64
    }

    /// Size of the whole volume in bytes
    pub fn total_bytes(&self) -> u64 {
        self.total_sectors() as u64 * self.sector_size as u64
    }

    /// True when the address lies inside this geometry
    pub fn contains(&self, chs: Chs) -> bool {
        chs.track < self.tracks
            && chs.head < self.heads
            && chs.sector >= 1
            && chs.sector <= self.sectors_per_track
    }

    /// Convert a physical address to a logical sector number
    pub fn chs_to_lsn(&self, chs: Chs) -> Result<u32> {
        if !self.contains(chs) {
            return Err(DiskError::OutOfRange {
                track: chs.track,
                head: chs.head,
                sector: chs.sector,
            });
        }
        Ok((chs.track as u32 * self.heads as u32 + chs.head as u32) * self.sectors_per_track as u32
            + chs.sector as u32
            - 1)
    }

    /// Convert a logical sector number to a physical address
    pub fn lsn_to_chs(&self, lsn: u32) -> Result<Chs> {
        let total = self.total_sectors();
        if lsn >= total {
            return Err(DiskError::LsnOutOfRange { lsn, total });
        }
        let spt = self.sectors_per_track as u32;
        let heads = self.heads as u32;
        Ok(Chs {
            track: (lsn / (spt * heads)) as u16,
            head: ((lsn / spt) % heads) as u8,
            sector: (lsn % spt + 1) as u16,
        })
    }

    /// The address following `chs`, stepping sector, then head, then track
    ///
    /// Returns `None` past the last sector of the volume.
    pub fn next(&self, chs: Chs) -> Option<Chs> {
        let mut next = chs;
        next.sector += 1;
        if next.sector > self.sectors_per_track {
            next.sector = 1;
            next.head += 1;
            if next.head >= self.heads {
                next.head = 0;
                next.track += 1;
            }
        }
        self.contains(next).then_some(next)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tracks, {} head(s), {} sectors/track, {} bytes/sector",
            self.tracks, self.heads, self.sectors_per_track, self.sector_size
        )
    }
}
