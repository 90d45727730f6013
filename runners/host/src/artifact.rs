use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Write as _},
    path::Path,
};

use anyhow::{bail, ensure, Context as _, Result};
use log::{debug, info};

use crate::ui;

/// What to do when the output file already exists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overwrite {
    Refuse,
    Force,
    Ask,
}

impl Overwrite {
    pub fn from_flags(force: bool, interactive: bool) -> Self {
        if force {
            Self::Force
        } else if interactive {
            Self::Ask
        } else {
            Self::Refuse
        }
    }
}

pub fn read(path: &Path) -> Result<Vec<u8>> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    debug!("Read {} bytes from {}", data.len(), path.display());
    Ok(data)
}

/// Write `data` to `path`, `expected_len` bytes exactly.
pub fn write(path: &Path, data: &[u8], expected_len: usize, overwrite: Overwrite) -> Result<()> {
    ensure!(
        data.len() == expected_len,
        "refusing to write {}: {} bytes instead of {}",
        path.display(),
        data.len(),
        expected_len
    );

    let mut file = match create(path, overwrite)? {
        Some(file) => file,
        None => bail!("{} exists, not overwriting", path.display()),
    };
    file.write_all(data)
        .and_then(|()| file.flush())
        .with_context(|| format!("failed to write {}", path.display()))?;

    let written = file
        .metadata()
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    ensure!(
        written == expected_len as u64,
        "{} has {} bytes after writing, expected {}",
        path.display(),
        written,
        expected_len
    );
    info!("Wrote {} bytes to {}", written, path.display());
    Ok(())
}

fn create(path: &Path, overwrite: Overwrite) -> Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => return Ok(Some(file)),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to create {}", path.display()))
        }
    }

    let replace = match overwrite {
        Overwrite::Refuse => false,
        Overwrite::Force => true,
        Overwrite::Ask => ui::confirm_overwrite(path)?,
    };
    if !replace {
        return Ok(None);
    }
    debug!("Overwriting {}", path.display());
    File::create(path)
        .map(Some)
        .with_context(|| format!("failed to truncate {}", path.display()))
}
