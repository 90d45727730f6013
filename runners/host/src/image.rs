use std::path::Path;

use anyhow::{bail, Context as _, Result};
use log::{info, warn};
use partition_table::{FsPartition, PartitionTable};
use wl_image::{
    unwrap_image, Advisory, Layout, Unwrapped, WlConfig, DEFAULT_SECTOR_SIZE,
};

use crate::{artifact, mkfs::ImageBuilder};

/// Where the raw filesystem image of a build comes from.
pub enum Source<'a> {
    Raw(&'a Path),
    Dir {
        dir: &'a Path,
        builder: &'a dyn ImageBuilder,
    },
}

/// Partition an image is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Target {
    pub size: u32,
    /// filesystem partition from the partition table, if one was given
    pub fs: Option<FsPartition>,
}

impl Target {
    /// Container sector size: `explicit` if given, else the partition table's.
    pub fn sector_size(&self, explicit: Option<u32>) -> u32 {
        let from_table = self.fs.map(|fs| fs.sector_size);
        if let (Some(explicit), Some(from_table)) = (explicit, from_table) {
            if explicit != from_table {
                warn!(
                    "Sector size {} overrides {} from the partition table",
                    explicit, from_table
                );
            }
        }
        explicit.or(from_table).unwrap_or(DEFAULT_SECTOR_SIZE)
    }
}

/// Partition to build for, from a partition table or given directly.
pub fn resolve(partitions: Option<&Path>, size: Option<u32>) -> Result<Target> {
    match (partitions, size) {
        (Some(_), Some(_)) => bail!("--partitions and --size are mutually exclusive"),
        (None, Some(size)) => Ok(Target { size, fs: None }),
        (None, None) => bail!("either --partitions or --size is required"),
        (Some(path), None) => {
            let csv = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let table = PartitionTable::parse(&csv)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            let Some(fs) = table.filesystem() else {
                bail!("{} declares no filesystem partition", path.display());
            };
            info!(
                "Using {} partition at {:#x}..{:#x}, sectors of {} bytes, pages of {} bytes",
                fs.kind.as_str(),
                fs.offset,
                u64::from(fs.offset) + u64::from(fs.size),
                fs.sector_size,
                fs.page_size
            );
            if !fs.kind.needs_wear_leveling() {
                warn!(
                    "{} partitions are not mounted through wear leveling",
                    fs.kind.as_str()
                );
            }
            Ok(Target {
                size: fs.size,
                fs: Some(fs),
            })
        }
    }
}

/// Produce the complete partition image for `source`.
pub fn build(source: Source<'_>, partition_size: u32, config: &WlConfig) -> Result<Vec<u8>> {
    config.validate().context("invalid wear-leveling parameters")?;
    let layout = Layout::for_partition(partition_size, config.sector_size)?;

    let raw = match source {
        Source::Raw(path) => artifact::read(path)?,
        Source::Dir { dir, builder } => builder.build(dir, layout.data_capacity())?,
    };
    let wrapped = wl_image::pack(&raw, partition_size, config)
        .with_context(|| format!("failed to wrap {} byte image", raw.len()))?;
    info!(
        "Wrapped {} byte image into {} sectors of {} bytes",
        raw.len(),
        layout.total_sectors(),
        config.sector_size
    );
    Ok(wrapped)
}

/// Raw filesystem image recovered from a partition dump.
pub struct Recovered<'a> {
    pub payload: &'a [u8],
    /// `None` if the dump was not a container and is used verbatim
    pub unwrapped: Option<Unwrapped<'a>>,
}

/// Strip the container from `dump`, falling back to the dump itself.
pub fn recover(dump: &[u8], sector_size: u32) -> Recovered<'_> {
    match unwrap_image(dump, sector_size) {
        Ok(unwrapped) => {
            for advisory in &unwrapped.advisories {
                match advisory {
                    Advisory::UnsupportedVersion(_) => warn!("{}", advisory),
                    Advisory::InconsistentTrailingState => {
                        warn!("{}, using the leading copy", advisory)
                    }
                }
            }
            info!(
                "Found container with {} data sectors",
                unwrapped.state.max_pos
            );
            Recovered {
                payload: unwrapped.payload,
                unwrapped: Some(unwrapped),
            }
        }
        Err(err) => {
            warn!("{}, using the dump as raw image", err);
            Recovered {
                payload: dump,
                unwrapped: None,
            }
        }
    }
}
