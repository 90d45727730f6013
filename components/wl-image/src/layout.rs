use core::ops::Range;

use crate::error::{Error, Result};
use crate::record::STATE_RECORD_SIZE;

/// Sectors holding one copy of the state record, at each end of the container.
pub const STATE_SECTORS: u32 = 2;
/// Scratch sector the device uses while moving data.
pub const TEMP_SECTORS: u32 = 1;
/// Sectors of a container not available to the filesystem.
pub const OVERHEAD_SECTORS: u32 = 2 * STATE_SECTORS + TEMP_SECTORS;
/// Smallest container: all overhead sectors plus one data sector.
pub const MIN_SECTORS: u32 = OVERHEAD_SECTORS + 1;

/// Sector accounting of a wrapped image.
///
/// All ranges are byte offsets into the wrapped image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    sector_size: u32,
    total_sectors: u32,
}

impl Layout {
    /// Layout filling a partition of `partition_size` bytes.
    pub fn for_partition(partition_size: u32, sector_size: u32) -> Result<Self> {
        let too_small = Error::PartitionTooSmall {
            partition_size,
            sector_size,
        };
        if sector_size == 0 || partition_size % sector_size != 0 {
            return Err(too_small);
        }
        let total_sectors = partition_size / sector_size;
        if total_sectors < MIN_SECTORS {
            return Err(too_small);
        }
        Ok(Self {
            sector_size,
            total_sectors,
        })
    }

    /// Layout an image of `len` bytes would have if it were a container.
    ///
    /// Returns `Error::NotWrapped` when `len` cannot be a container length.
    pub fn for_image(len: usize, sector_size: u32) -> Result<Self> {
        let sector = sector_size as usize;
        if sector < STATE_RECORD_SIZE || len % sector != 0 {
            return Err(Error::NotWrapped);
        }
        let total_sectors = u32::try_from(len / sector).map_err(|_| Error::NotWrapped)?;
        if total_sectors < MIN_SECTORS {
            return Err(Error::NotWrapped);
        }
        Ok(Self {
            sector_size,
            total_sectors,
        })
    }

    pub const fn sector_size(&self) -> u32 {
        self.sector_size
    }

    pub const fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    /// Sectors available to the filesystem, the record's `max_pos`.
    pub const fn data_sectors(&self) -> u32 {
        self.total_sectors - OVERHEAD_SECTORS
    }

    /// Largest raw image that fits.
    pub const fn data_capacity(&self) -> usize {
        self.data_sectors() as usize * self.sector_size as usize
    }

    pub const fn len(&self) -> usize {
        self.total_sectors as usize * self.sector_size as usize
    }

    pub fn leading_state(&self) -> Range<usize> {
        self.sectors(0, STATE_SECTORS)
    }

    pub fn data(&self) -> Range<usize> {
        self.sectors(STATE_SECTORS, self.data_sectors())
    }

    pub fn temp(&self) -> Range<usize> {
        self.sectors(STATE_SECTORS + self.data_sectors(), TEMP_SECTORS)
    }

    pub fn trailing_state(&self) -> Range<usize> {
        self.sectors(self.total_sectors - STATE_SECTORS, STATE_SECTORS)
    }

    fn sectors(&self, first: u32, count: u32) -> Range<usize> {
        let sector = self.sector_size as usize;
        let start = first as usize * sector;
        start..start + count as usize * sector
    }
}
