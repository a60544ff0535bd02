/// Disk format specifications and presets

use crate::geometry::Geometry;

/// Disk format specification used when creating or formatting an image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSpec {
    /// Number of sides (1 or 2)
    pub num_sides: u8,
    /// Number of tracks per side
    pub num_tracks: u16,
    /// Sectors per track
    pub sectors_per_track: u16,
    /// Sector size in bytes
    pub sector_size: u16,
    /// First sector ID recorded in JVC headers
    pub first_sector_id: u8,
    /// Filler byte for formatting
    pub filler_byte: u8,
    /// Interleave factor (1 = no interleave)
    pub interleave: u8,
}

impl FormatSpec {
    /// Create a new format specification
    pub fn new(num_sides: u8, num_tracks: u16, sectors_per_track: u16, sector_size: u16) -> Self {
        Self {
            num_sides,
            num_tracks,
            sectors_per_track,
            sector_size,
            first_sector_id: 1,
            filler_byte: 0xFF,
            interleave: 1,
        }
    }

    /// RS-DOS (Disk Extended Color BASIC) single-sided, 35 tracks
    pub fn rsdos_35() -> Self {
        Self::new(1, 35, 18, 256).with_interleave(4)
    }

    /// RS-DOS single-sided, 40 tracks
    pub fn rsdos_40() -> Self {
        Self::new(1, 40, 18, 256).with_interleave(4)
    }

    /// DragonDOS single-sided, 40 tracks
    pub fn dragon_40_ss() -> Self {
        Self::new(1, 40, 18, 256).with_interleave(2)
    }

    /// DragonDOS double-sided, 40 tracks
    pub fn dragon_40_ds() -> Self {
        Self::new(2, 40, 18, 256).with_interleave(2)
    }

    /// DragonDOS double-sided, 80 tracks
    pub fn dragon_80_ds() -> Self {
        Self::new(2, 80, 18, 256).with_interleave(2)
    }

    /// OS-9 single-sided, 35 tracks
    pub fn os9_35_ss() -> Self {
        Self::new(1, 35, 18, 256)
            .with_interleave(3)
            .with_filler_byte(0xE5)
    }

    /// OS-9 double-sided, 40 tracks
    pub fn os9_40_ds() -> Self {
        Self::new(2, 40, 18, 256)
            .with_interleave(3)
            .with_filler_byte(0xE5)
    }

    /// OS-9 double-sided, 80 tracks
    pub fn os9_80_ds() -> Self {
        Self::new(2, 80, 18, 256)
            .with_interleave(3)
            .with_filler_byte(0xE5)
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "rsdos" | "rsdos35" => Some(Self::rsdos_35()),
            "rsdos40" => Some(Self::rsdos_40()),
            "dragon" | "dragon40" => Some(Self::dragon_40_ss()),
            "dragon40ds" => Some(Self::dragon_40_ds()),
            "dragon80" | "dragon80ds" => Some(Self::dragon_80_ds()),
            "os9" | "os935" => Some(Self::os9_35_ss()),
            "os940" | "os940ds" => Some(Self::os9_40_ds()),
            "os980" | "os980ds" => Some(Self::os9_80_ds()),
            _ => None,
        }
    }

    /// Physical geometry described by this specification
    pub fn geometry(&self) -> Geometry {
        Geometry::new(
            self.num_tracks,
            self.num_sides,
            self.sectors_per_track,
            self.sector_size,
        )
    }

    /// Calculate total disk capacity in bytes
    pub fn total_capacity(&self) -> u64 {
        self.geometry().total_bytes()
    }

    /// Calculate total disk capacity in kilobytes
    pub fn total_capacity_kb(&self) -> u64 {
        self.total_capacity() / 1024
    }

    /// Set the interleave factor
    pub fn with_interleave(mut self, interleave: u8) -> Self {
        self.interleave = interleave;
        self
    }

    /// Set the first sector ID
    pub fn with_first_sector_id(mut self, first_sector_id: u8) -> Self {
        self.first_sector_id = first_sector_id;
        self
    }

    /// Set the filler byte
    pub fn with_filler_byte(mut self, filler_byte: u8) -> Self {
        self.filler_byte = filler_byte;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsdos_capacity() {
        let spec = FormatSpec::rsdos_35();
        assert_eq!(spec.total_capacity(), 35 * 18 * 256);
        assert_eq!(spec.total_capacity_kb(), 157);
    }

    #[test]
    fn test_dragon_80_ds_capacity() {
        let spec = FormatSpec::dragon_80_ds();
        assert_eq!(spec.total_capacity(), 2 * 80 * 18 * 256);
        assert_eq!(spec.total_capacity_kb(), 720);
    }

    #[test]
    fn test_os9_filler() {
        assert_eq!(FormatSpec::os9_40_ds().filler_byte, 0xE5);
        assert_eq!(FormatSpec::dragon_40_ss().filler_byte, 0xFF);
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(FormatSpec::preset("Dragon80"), Some(FormatSpec::dragon_80_ds()));
        assert_eq!(FormatSpec::preset("os9"), Some(FormatSpec::os9_35_ss()));
        assert_eq!(FormatSpec::preset("cpm"), None);
    }

    #[test]
    fn test_with_methods() {
        let spec = FormatSpec::rsdos_35()
            .with_interleave(1)
            .with_first_sector_id(0)
            .with_filler_byte(0x00);

        assert_eq!(spec.interleave, 1);
        assert_eq!(spec.first_sector_id, 0);
        assert_eq!(spec.filler_byte, 0x00);
        assert_eq!(spec.geometry(), Geometry::new(35, 1, 18, 256));
    }
}
