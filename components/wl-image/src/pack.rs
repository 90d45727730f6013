use alloc::vec::Vec;

use crate::config::WlConfig;
use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::record::WlStateRecord;
use crate::ERASED_BYTE;

/// Wrap `raw_image` into a container filling a `partition_size` byte partition.
///
/// The output is a pure function of the inputs and always exactly
/// `partition_size` bytes long.
pub fn pack(raw_image: &[u8], partition_size: u32, config: &WlConfig) -> Result<Vec<u8>> {
    config.validate()?;
    let layout = Layout::for_partition(partition_size, config.sector_size)?;

    let capacity = layout.data_capacity();
    if raw_image.len() > capacity {
        return Err(Error::ImageTooLarge {
            len: raw_image.len(),
            capacity,
        });
    }

    let max_pos = layout.data_sectors();
    // the record itself wraps on overflow, refuse such a max_count here
    config.max_count(max_pos)?;
    let record = WlStateRecord::new(max_pos, config.sector_size, config.update_rate);
    debug_now!(
        "wl: {} sectors of {} bytes, {} data sectors, image {} bytes",
        layout.total_sectors(),
        config.sector_size,
        max_pos,
        raw_image.len()
    );

    let state = record.to_sector(config.sector_size as usize);
    let mut wrapped = Vec::with_capacity(layout.len());
    wrapped.extend_from_slice(&state);
    wrapped.extend_from_slice(&state);
    wrapped.extend_from_slice(raw_image);
    // data padding and the temp sector are both erased flash
    wrapped.resize(layout.temp().end, ERASED_BYTE);
    wrapped.extend_from_slice(&state);
    wrapped.extend_from_slice(&state);

    if wrapped.len() != layout.len() {
        error_now!("wl: assembled {} bytes, layout says {}", wrapped.len(), layout.len());
        return Err(Error::SizeMismatch {
            expected: layout.len(),
            actual: wrapped.len(),
        });
    }
    Ok(wrapped)
}
