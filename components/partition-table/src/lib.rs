#![cfg_attr(not(feature = "std"), no_std)]

//! Flash partition table as found in the `partitions.csv` of a project.
//!
//! Rows have the form `name, type, subtype, offset, size[, flags]`. Sizes and
//! offsets are decimal, `0x` hexadecimal or carry a `K`/`M` suffix. An empty
//! offset continues after the previous partition, aligned to 64 KiB for
//! application partitions and to 4 bytes otherwise.

extern crate alloc;

#[macro_use]
extern crate delog;

generate_macros!();

use alloc::{
    string::{String, ToString},
    vec::Vec,
};
use core::{fmt, ops::Range};

/// Erase block of filesystem partitions, the sector size of their images.
pub const FS_BLOCK: u32 = 0x1000;
/// Program page of filesystem partitions.
pub const FS_PAGE: u32 = 0x100;
/// First byte after the bootloader and the partition table itself.
pub const TABLE_END: u32 = 0x9000;

const APP_ALIGN: u32 = 0x1_0000;
const DATA_ALIGN: u32 = 4;

/// Filesystems a data partition can be declared for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsKind {
    Spiffs,
    Fat,
    Littlefs,
}

impl FsKind {
    pub fn from_subtype(subtype: &str) -> Option<Self> {
        match subtype {
            "spiffs" => Some(Self::Spiffs),
            "fat" => Some(Self::Fat),
            "littlefs" => Some(Self::Littlefs),
            _ => None,
        }
    }

    /// FAT is mounted through the wear-leveling layer, the others manage flash wear themselves.
    pub const fn needs_wear_leveling(self) -> bool {
        matches!(self, Self::Fat)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spiffs => "spiffs",
            Self::Fat => "fat",
            Self::Littlefs => "littlefs",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    pub name: String,
    pub kind: String,
    pub subtype: String,
    pub offset: u32,
    pub size: u32,
    pub flags: Option<String>,
}

impl Partition {
    pub fn range(&self) -> Range<u32> {
        self.offset..self.offset.saturating_add(self.size)
    }

    pub fn is_app(&self) -> bool {
        matches!(self.kind.as_str(), "app" | "0")
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind.as_str(), "data" | "1")
    }

    pub fn fs_kind(&self) -> Option<FsKind> {
        if self.is_data() {
            FsKind::from_subtype(&self.subtype)
        } else {
            None
        }
    }
}

/// What the image tools need to know about the filesystem partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FsPartition {
    pub kind: FsKind,
    pub offset: u32,
    pub size: u32,
    pub sector_size: u32,
    pub page_size: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionTable {
    partitions: Vec<Partition>,
}

impl PartitionTable {
    /// Parse with implicit offsets starting right after the partition table.
    ///
    /// Firmware build scripts that count implicit offsets from 0 place
    /// partitions differently, `parse_from(csv, 0)` reproduces their offsets.
    pub fn parse(csv: &str) -> Result<Self, ParseError> {
        Self::parse_from(csv, TABLE_END)
    }

    /// Parse with implicit offsets starting at `first_offset`.
    pub fn parse_from(csv: &str, first_offset: u32) -> Result<Self, ParseError> {
        let mut partitions = Vec::new();
        let mut next_offset = first_offset;

        for (idx, line) in csv.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
            if tokens.len() < 5 {
                debug_now!("partitions: skipping short row {}", idx + 1);
                continue;
            }
            let error = |kind| ParseError {
                line: idx + 1,
                kind,
            };

            let kind = tokens[1];
            let bound = if matches!(kind, "app" | "0") {
                APP_ALIGN
            } else {
                DATA_ALIGN
            };
            let offset = if tokens[3].is_empty() {
                next_offset
                    .checked_add(bound - 1)
                    .map(|end| end & !(bound - 1))
                    .ok_or(error(ParseErrorKind::Overflow))?
            } else {
                parse_size(tokens[3]).ok_or(error(ParseErrorKind::InvalidOffset))?
            };
            let size = parse_size(tokens[4]).ok_or(error(ParseErrorKind::InvalidSize))?;
            next_offset = offset
                .checked_add(size)
                .ok_or(error(ParseErrorKind::Overflow))?;

            partitions.push(Partition {
                name: tokens[0].to_string(),
                kind: kind.to_string(),
                subtype: tokens[2].to_string(),
                offset,
                size,
                flags: tokens
                    .get(5)
                    .filter(|flags| !flags.is_empty())
                    .map(|flags| flags.to_string()),
            });
        }

        Ok(Self { partitions })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn find(&self, name: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.name == name)
    }

    /// The filesystem partition; with several candidates the last one wins.
    pub fn filesystem(&self) -> Option<FsPartition> {
        self.partitions.iter().rev().find_map(|p| {
            p.fs_kind().map(|kind| FsPartition {
                kind,
                offset: p.offset,
                size: p.size,
                sector_size: FS_BLOCK,
                page_size: FS_PAGE,
            })
        })
    }
}

/// Parse `4096`, `0x1000`, `4K` or `1M`.
pub fn parse_size(value: &str) -> Option<u32> {
    let value = value.trim();
    if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        return u32::from_str_radix(hex, 16).ok();
    }
    let (digits, unit) = match value.char_indices().last()? {
        (idx, 'k' | 'K') => (&value[..idx], 1024),
        (idx, 'm' | 'M') => (&value[..idx], 1024 * 1024),
        _ => (value, 1),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u32>().ok()?.checked_mul(unit)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseError {
    /// 1-based line in the table
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseErrorKind {
    InvalidOffset,
    InvalidSize,
    Overflow,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            ParseErrorKind::InvalidOffset => "invalid offset",
            ParseErrorKind::InvalidSize => "invalid size",
            ParseErrorKind::Overflow => "partition ends beyond 4 GiB",
        };
        write!(f, "partition table line {}: {what}", self.line)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

#[cfg(all(test, not(feature = "std")))]
#[macro_use]
extern crate std;
