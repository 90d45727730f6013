use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{bail, Context as _, Result};
use log::{debug, info};
use partition_table::{FsKind, FsPartition};

/// Produces a raw filesystem image from a directory tree.
pub trait ImageBuilder {
    /// The returned image must not be larger than `capacity` bytes.
    fn build(&self, dir: &Path, capacity: usize) -> Result<Vec<u8>>;
}

/// Unpacks a raw filesystem image into a directory tree.
pub trait ImageExtractor {
    fn extract(&self, image: &[u8], dir: &Path) -> Result<()>;
}

/// External filesystem tool with the `mkspiffs`/`mkfatfs`/`mklittlefs`
/// command line.
#[derive(Clone, Debug)]
pub struct MkfsTool {
    program: PathBuf,
    partition: Option<FsPartition>,
}

impl MkfsTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            partition: None,
        }
    }

    /// Build images for `partition`.
    ///
    /// SPIFFS and LittleFS tools then get the partition's page and block size
    /// instead of falling back to their own defaults.
    pub fn for_partition(self, partition: FsPartition) -> Self {
        Self {
            partition: Some(partition),
            ..self
        }
    }

    /// Command line building `dir` into a `capacity` byte image at `target`.
    pub fn build_command(&self, dir: &Path, capacity: usize, target: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("-c").arg(dir).arg("-s").arg(capacity.to_string());
        if let Some(partition) = self.partition {
            if matches!(partition.kind, FsKind::Spiffs | FsKind::Littlefs) {
                command
                    .arg("-p")
                    .arg(partition.page_size.to_string())
                    .arg("-b")
                    .arg(partition.sector_size.to_string());
            }
        }
        command.arg(target);
        command
    }

    fn run(&self, command: &mut Command) -> Result<()> {
        debug!("Running {:?}", command);
        let status = command
            .status()
            .with_context(|| format!("failed to start {}", self.program.display()))?;
        if !status.success() {
            bail!("{} failed: {}", self.program.display(), status);
        }
        Ok(())
    }
}

impl ImageBuilder for MkfsTool {
    fn build(&self, dir: &Path, capacity: usize) -> Result<Vec<u8>> {
        let work = tempfile::tempdir().context("failed to create work directory")?;
        let target = work.path().join("fs.bin");
        info!(
            "Building filesystem image from {} ({} bytes)",
            dir.display(),
            capacity
        );
        self.run(&mut self.build_command(dir, capacity, &target))?;
        fs::read(&target)
            .with_context(|| format!("{} did not produce an image", self.program.display()))
    }
}

impl ImageExtractor for MkfsTool {
    fn extract(&self, image: &[u8], dir: &Path) -> Result<()> {
        let work = tempfile::tempdir().context("failed to create work directory")?;
        let source = work.path().join("fs.bin");
        fs::write(&source, image).context("failed to stage raw image")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        info!("Extracting filesystem image to {}", dir.display());
        self.run(Command::new(&self.program).arg("-u").arg(dir).arg(&source))
    }
}
