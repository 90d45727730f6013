use heapless::Vec;

use crate::error::{Advisory, Error, Result};
use crate::layout::{Layout, OVERHEAD_SECTORS};
use crate::record::{WlStateRecord, STATE_RECORD_SIZE};

/// Raw filesystem image found inside a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unwrapped<'a> {
    /// data sectors verbatim, including any trailing `0xFF` padding
    pub payload: &'a [u8],
    /// leading state record
    pub state: WlStateRecord,
    pub layout: Layout,
    pub advisories: Vec<Advisory, { Advisory::COUNT }>,
}

/// Check whether `blob` looks like a container and return its leading record.
///
/// Unlike `is_wrapped` this reports why a blob was rejected: a bad record at
/// offset 0 comes back as `MalformedLength`/`ChecksumMismatch`, any geometry
/// disagreement as `NotWrapped`.
pub fn detect(blob: &[u8], sector_size: u32) -> Result<(Layout, WlStateRecord)> {
    let layout = Layout::for_image(blob.len(), sector_size)?;
    let state = WlStateRecord::decode(&blob[..STATE_RECORD_SIZE])?;

    if state.block_size != sector_size {
        debug_now!(
            "wl: record block size {} != sector size {}",
            state.block_size,
            sector_size
        );
        return Err(Error::NotWrapped);
    }
    // the record must account for every sector of the blob, otherwise a raw
    // image that happens to start with a valid record would be accepted
    let expected =
        (u64::from(state.max_pos) + u64::from(OVERHEAD_SECTORS)) * u64::from(sector_size);
    if expected != blob.len() as u64 {
        debug_now!(
            "wl: record covers {} bytes, blob has {}",
            expected,
            blob.len()
        );
        return Err(Error::NotWrapped);
    }
    Ok((layout, state))
}

/// Whether `blob` carries a valid container for `sector_size` byte sectors.
pub fn is_wrapped(blob: &[u8], sector_size: u32) -> bool {
    detect(blob, sector_size).is_ok()
}

/// Extract the raw filesystem image from a container.
///
/// Fails with `Error::NotWrapped` whenever `is_wrapped` does not hold. The
/// payload borrows from `blob`.
pub fn unwrap_image(blob: &[u8], sector_size: u32) -> Result<Unwrapped<'_>> {
    let (layout, state) = detect(blob, sector_size).map_err(|_err| {
        debug_now!("wl: not a container: {:?}", _err);
        Error::NotWrapped
    })?;

    let data = layout.data();
    if data.len() != state.max_pos as usize * sector_size as usize || data.end > blob.len() {
        return Err(Error::SizeMismatch {
            expected: layout.len(),
            actual: blob.len(),
        });
    }

    let mut advisories = Vec::new();
    if let Some(advisory) = state.advisory() {
        warn_now!("wl: {}", advisory);
        advisories.push(advisory).ok();
    }
    if blob[layout.leading_state()] != blob[layout.trailing_state()] {
        warn_now!("wl: {}", Advisory::InconsistentTrailingState);
        advisories.push(Advisory::InconsistentTrailingState).ok();
    }

    Ok(Unwrapped {
        payload: &blob[data],
        state,
        layout,
        advisories,
    })
}
