/// Builder for creating disk images

use crate::error::{DiskError, Result};
use crate::format::{DiskImageType, FormatSpec};
use crate::image::{dmk, jvc, os9, partition, vdk, DiskImage};
use crate::io::{ByteSource, FileSource, MemorySource};
use log::info;
use std::path::Path;

/// Builder for constructing blank disk images
pub struct DiskImageBuilder {
    image_type: DiskImageType,
    spec: FormatSpec,
    os9_sectors: Option<u32>,
    rgbdos_partitions: u32,
}

impl DiskImageBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            image_type: DiskImageType::Jvc,
            spec: FormatSpec::rsdos_35(),
            os9_sectors: None,
            rgbdos_partitions: 0,
        }
    }

    /// Set the container type
    pub fn image_type(mut self, image_type: DiskImageType) -> Self {
        self.image_type = image_type;
        self
    }

    /// Set the format specification
    pub fn spec(mut self, spec: FormatSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Set the number of sides
    pub fn heads(mut self, heads: u8) -> Self {
        self.spec.num_sides = heads;
        self
    }

    /// Set the number of tracks
    pub fn tracks(mut self, tracks: u16) -> Self {
        self.spec.num_tracks = tracks;
        self
    }

    /// Set sectors per track
    pub fn sectors_per_track(mut self, sectors_per_track: u16) -> Self {
        self.spec.sectors_per_track = sectors_per_track;
        self
    }

    /// Set sector size
    pub fn sector_size(mut self, sector_size: u16) -> Self {
        self.spec.sector_size = sector_size;
        self
    }

    /// Set the sector interleave
    pub fn interleave(mut self, interleave: u8) -> Self {
        self.spec.interleave = interleave;
        self
    }

    /// Size of the leading OS-9 volume on a partitioned disk, in sectors
    ///
    /// Zero leaves the disk with RGB-DOS partitions only. Without this call
    /// the OS-9 volume takes the geometry of the spec.
    pub fn os9_sectors(mut self, sectors: u32) -> Self {
        self.os9_sectors = Some(sectors);
        self
    }

    /// Number of RGB-DOS partitions on a partitioned disk
    pub fn rgbdos_partitions(mut self, count: u32) -> Self {
        self.rgbdos_partitions = count;
        self
    }

    /// Build the image in memory
    pub fn build(self) -> Result<DiskImage> {
        self.build_into(Box::new(MemorySource::default()))
    }

    /// Create the image as a file
    pub fn create<P: AsRef<Path>>(self, path: P) -> Result<DiskImage> {
        let path = path.as_ref();
        let source = FileSource::create(path, 0)?;
        let image = self.build_into(Box::new(source))?;
        info!("Created {} image {}", image.image_type(), path.display());
        Ok(image)
    }

    /// Lay out a blank image of the configured type in an empty byte source
    pub fn build_into(self, mut source: Box<dyn ByteSource>) -> Result<DiskImage> {
        if !source.is_empty() {
            return Err(DiskError::invalid_image(
                "a new image needs an empty byte source",
            ));
        }

        let spec = &self.spec;
        let target = source.as_mut();
        let probe = match self.image_type {
            DiskImageType::Jvc => jvc::create(target, spec)?,
            DiskImageType::Vdk => vdk::create(target, spec)?,
            DiskImageType::Os9 | DiskImageType::Vhd => os9::create(target, spec)?,
            DiskImageType::Dmk => dmk::create(target, spec)?,
            DiskImageType::PartitionedVhd => partition::create(
                target,
                self.os9_spec()?.as_ref(),
                self.rgbdos_partitions,
                spec.filler_byte,
            )?,
        };

        Ok(DiskImage::with_geometry(
            source,
            self.image_type,
            probe,
            spec.interleave,
        ))
    }

    fn os9_spec(&self) -> Result<Option<FormatSpec>> {
        let sectors = match self.os9_sectors {
            None => return Ok(Some(self.spec.clone())),
            Some(0) => return Ok(None),
            Some(sectors) => sectors,
        };
        let per_cylinder = self.spec.sectors_per_track as u32 * self.spec.num_sides as u32;
        if per_cylinder == 0 || sectors % per_cylinder != 0 {
            return Err(DiskError::geometry(format!(
                "{} sectors is not a whole number of {}-sector cylinders",
                sectors, per_cylinder
            )));
        }
        let tracks = u16::try_from(sectors / per_cylinder)
            .map_err(|_| DiskError::geometry(format!("{} sectors is too many", sectors)))?;
        Ok(Some(FormatSpec {
            num_tracks: tracks,
            ..self.spec.clone()
        }))
    }
}

impl Default for DiskImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
