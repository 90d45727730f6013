use core::fmt;

use crate::layout::MIN_SECTORS;
use crate::record::{STATE_RECORD_SIZE, WL_VERSION};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// state record input is not exactly `STATE_RECORD_SIZE` bytes
    MalformedLength { len: usize },
    /// stored `crc32` differs from the one computed over bytes 0 - 43
    ChecksumMismatch { stored: u32, computed: u32 },
    /// partition is not a whole number of at least `MIN_SECTORS` sectors
    PartitionTooSmall { partition_size: u32, sector_size: u32 },
    /// raw image does not fit into the data sectors
    ImageTooLarge { len: usize, capacity: usize },
    /// blob does not carry a wear-leveling container
    NotWrapped,
    /// assembled output length disagrees with the layout; a defect, not an input error
    SizeMismatch { expected: usize, actual: usize },
    /// `WlConfig` that cannot describe a container
    InvalidConfig(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedLength { len } => write!(
                f,
                "malformed state record: expected {STATE_RECORD_SIZE} bytes, got {len}"
            ),
            Self::ChecksumMismatch { stored, computed } => write!(
                f,
                "state record checksum mismatch: stored {stored:#010x}, computed {computed:#010x}"
            ),
            Self::PartitionTooSmall {
                partition_size,
                sector_size,
            } => {
                let sectors = partition_size.checked_div(*sector_size).unwrap_or(0);
                write!(
                    f,
                    "partition too small: need >={MIN_SECTORS} sectors of {sector_size} bytes, have {sectors}"
                )?;
                match partition_size.checked_rem(*sector_size) {
                    Some(0) => Ok(()),
                    Some(rest) => write!(f, " (+{rest} unaligned bytes)"),
                    None => write!(f, " (sector size is zero)"),
                }
            }
            Self::ImageTooLarge { len, capacity } => write!(
                f,
                "image too large: {len} bytes, data sectors hold {capacity} bytes"
            ),
            Self::NotWrapped => f.write_str("no wear-leveling container found"),
            Self::SizeMismatch { expected, actual } => write!(
                f,
                "internal error: wrapped image is {actual} bytes, expected {expected}"
            ),
            Self::InvalidConfig(reason) => {
                write!(f, "invalid wear-leveling configuration: {reason}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Parameter of a `WlConfig` that was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// sector cannot hold a `STATE_RECORD_SIZE` byte record
    SectorTooSmall { sector_size: u32 },
    ZeroUpdateRate,
    /// `update_rate * max_pos` does not fit the record's `max_count`
    MaxCountOverflow { update_rate: u32, max_pos: u32 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SectorTooSmall { sector_size } => write!(
                f,
                "sector size {sector_size} cannot hold a {STATE_RECORD_SIZE} byte state record"
            ),
            Self::ZeroUpdateRate => f.write_str("update rate must not be zero"),
            Self::MaxCountOverflow {
                update_rate,
                max_pos,
            } => write!(
                f,
                "update rate {update_rate} x {max_pos} data sectors overflows max_count"
            ),
        }
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Findings that do not prevent using a container but are worth reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Advisory {
    /// state record carries a format version other than `WL_VERSION`
    UnsupportedVersion(u32),
    /// trailing state sectors are not byte-identical to the leading ones
    InconsistentTrailingState,
}

impl Advisory {
    /// Number of distinct advisories a single container can raise.
    pub const COUNT: usize = 2;
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion(version) => {
                write!(f, "state record version {version}, expected {WL_VERSION}")
            }
            Self::InconsistentTrailingState => {
                f.write_str("trailing state sectors differ from the leading ones")
            }
        }
    }
}
