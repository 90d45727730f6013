use std::path::Path;

use anyhow::{Context as _, Result};
use dialoguer::Confirm;
use wl_image::{Layout, WlStateRecord, STATE_RECORD_SIZE};

pub fn confirm_overwrite(path: &Path) -> Result<bool> {
    Confirm::new()
        .with_prompt(format!("{} exists. Overwrite?", path.display()))
        .default(false)
        .interact()
        .context("failed to read confirmation")
}

/// Human-readable report for `wl-image inspect`.
pub struct Report<'a> {
    pub blob: &'a [u8],
    pub sector_size: u32,
}

impl Report<'_> {
    pub fn render(&self) -> String {
        let mut out = format!("size: {} bytes\n", self.blob.len());
        let layout = match Layout::for_image(self.blob.len(), self.sector_size) {
            Ok(layout) => layout,
            Err(err) => {
                out.push_str(&format!("layout: {err} for {} byte sectors\n", self.sector_size));
                return out;
            }
        };

        out.push_str(&format!(
            "layout: {} sectors of {} bytes, {} data sectors ({} bytes)\n",
            layout.total_sectors(),
            layout.sector_size(),
            layout.data_sectors(),
            layout.data_capacity()
        ));
        let sector = layout.sector_size() as usize;
        let copies = layout
            .leading_state()
            .step_by(sector)
            .chain(layout.trailing_state().step_by(sector));
        for (idx, start) in copies.enumerate() {
            let raw = &self.blob[start..start + STATE_RECORD_SIZE];
            out.push_str(&format!("state {idx} @ {start:#x}: "));
            match WlStateRecord::decode(raw) {
                Ok(record) => out.push_str(&describe(&record)),
                Err(err) => out.push_str(&err.to_string()),
            }
            out.push('\n');
        }
        out
    }
}

fn describe(record: &WlStateRecord) -> String {
    let mut line = format!(
        "pos={} max_pos={} move_count={} access_count={} max_count={} block_size={} version={} crc32={:#010x}",
        record.pos,
        record.max_pos,
        record.move_count,
        record.access_count,
        record.max_count,
        record.block_size,
        record.version,
        record.crc32
    );
    if let Some(advisory) = record.advisory() {
        line.push_str(&format!(" ({advisory})"));
    }
    line
}
