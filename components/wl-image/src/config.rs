use crate::error::{ConfigError, Error, Result};
use crate::record::STATE_RECORD_SIZE;

pub const DEFAULT_SECTOR_SIZE: u32 = 4096;
pub const DEFAULT_UPDATE_RATE: u32 = 16;

/// Parameters of a wear-leveling container.
///
/// Passed explicitly to every operation; `Default` yields the common
/// 4096 byte sectors with an update rate of 16.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WlConfig {
    pub sector_size: u32,
    pub update_rate: u32,
}

impl WlConfig {
    pub const fn new(sector_size: u32) -> Self {
        Self {
            sector_size,
            update_rate: DEFAULT_UPDATE_RATE,
        }
    }

    pub const fn with_update_rate(self, update_rate: u32) -> Self {
        Self {
            update_rate,
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        if (self.sector_size as usize) < STATE_RECORD_SIZE {
            return Err(Error::InvalidConfig(ConfigError::SectorTooSmall {
                sector_size: self.sector_size,
            }));
        }
        if self.update_rate == 0 {
            return Err(Error::InvalidConfig(ConfigError::ZeroUpdateRate));
        }
        Ok(())
    }

    /// `max_count` for a container with `max_pos` data sectors.
    pub fn max_count(&self, max_pos: u32) -> Result<u32> {
        self.update_rate
            .checked_mul(max_pos)
            .ok_or(Error::InvalidConfig(ConfigError::MaxCountOverflow {
                update_rate: self.update_rate,
                max_pos,
            }))
    }
}

impl Default for WlConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SECTOR_SIZE)
    }
}
