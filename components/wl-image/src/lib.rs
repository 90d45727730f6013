#![cfg_attr(not(feature = "std"), no_std)]

//! Host-side wear-leveling container for flash filesystem partitions.
//!
//! A filesystem image stored on a wear-leveled flash partition is surrounded
//! by bookkeeping sectors the on-device mount routine expects to find. This
//! component produces that container from a raw filesystem image (`pack`) and
//! recovers the raw image from a partition dump (`is_wrapped`,
//! `unwrap_image`). It does not implement the on-device sector rotation.
//!
//! # Wrapped Image Layout
//! With `S` the sector size and `T` the partition size in sectors:
//! ```text
//! state | state | data 0 … data T-6 | temp | state | state
//! ```
//!
//! | sectors       | content                                          |
//! |---------------|--------------------------------------------------|
//! |  0 - 1        | `WlStateRecord`, padded to `S` with `0xFF`       |
//! |  2 - T-4      | raw filesystem image, padded with `0xFF`         |
//! |  T-3          | temp sector, all `0xFF`                          |
//! |  T-2 - T-1    | same two state sectors as at the start           |
//!
//! # State Record Layout
//! All fields are little-endian `u32`:
//!
//! | bytes   | field          | value at creation            |
//! |---------|----------------|------------------------------|
//! |  0 - 3  | `pos`          | 0                            |
//! |  4 - 7  | `max_pos`      | number of data sectors       |
//! |  8 - 11 | `move_count`   | 0                            |
//! | 12 - 15 | `access_count` | 0                            |
//! | 16 - 19 | `max_count`    | `update_rate * max_pos`      |
//! | 20 - 23 | `block_size`   | sector size                  |
//! | 24 - 27 | `version`      | 2                            |
//! | 28 - 31 | `device_id`    | 0                            |
//! | 32 - 43 | `reserved`     | `0xFF` x 12                  |
//! | 44 - 47 | `crc32`        | CRC-32 of bytes 0 - 43       |
//!
//! # Important Implementation Details
//! * Everything here is a pure function over in-memory buffers, reading
//!   dumps and writing artifacts is left to the caller
//! * The sector size is never implied: it is part of `WlConfig` resp. an
//!   explicit argument of the detection functions
//! * The leading pair of state sectors is authoritative, a differing trailing
//!   pair is only reported as `Advisory::InconsistentTrailingState`

extern crate alloc;

#[macro_use]
extern crate delog;

generate_macros!();

mod config;
mod error;
mod layout;
mod pack;
mod record;
mod unpack;

pub use crate::config::{WlConfig, DEFAULT_SECTOR_SIZE, DEFAULT_UPDATE_RATE};
pub use crate::error::{Advisory, ConfigError, Error, Result};
pub use crate::layout::{Layout, MIN_SECTORS, OVERHEAD_SECTORS};
pub use crate::pack::pack;
pub use crate::record::{
    checksum, decode, encode, WlStateRecord, CRC_SEED, STATE_RECORD_SIZE, WL_VERSION,
};
pub use crate::unpack::{detect, is_wrapped, unwrap_image, Unwrapped};

/// Value of erased flash, used for every padding byte.
pub const ERASED_BYTE: u8 = 0xFF;

#[cfg(test)]
mod tests;

#[cfg(all(test, not(feature = "std")))]
#[macro_use]
extern crate std;
