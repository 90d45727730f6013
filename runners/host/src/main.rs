mod artifact;
mod image;
mod mkfs;
mod ui;


use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use clap_num::maybe_hex;
use log::info;
use wl_image::{WlConfig, DEFAULT_SECTOR_SIZE, DEFAULT_UPDATE_RATE};

use artifact::Overwrite;
use image::Source;
use mkfs::{ImageExtractor as _, MkfsTool};

/// Build and unpack wear-leveled flash filesystem partition images.
#[derive(Parser, Debug)]
#[command(about, author, disable_version_flag = true)]
struct Args {
    /// Print version information.
    #[arg(short = 'V', long)]
    version: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Wrap a filesystem image so that it can be flashed to a partition.
    Build(BuildArgs),
    /// Recover the raw filesystem image from a partition dump.
    Unpack(UnpackArgs),
    /// Show the container layout and state records of an image.
    Inspect(InspectArgs),
}

#[derive(ClapArgs, Debug)]
struct Geometry {
    /// Flash sector size in bytes.
    #[arg(long, value_parser = maybe_hex::<u32>, default_value_t = DEFAULT_SECTOR_SIZE)]
    sector_size: u32,
}

#[derive(ClapArgs, Debug)]
struct BuildArgs {
    /// Raw filesystem image to wrap.
    #[arg(long, conflicts_with = "dir", required_unless_present = "dir")]
    raw: Option<PathBuf>,

    /// Directory to build the filesystem image from, requires --mkfs.
    #[arg(long, requires = "mkfs")]
    dir: Option<PathBuf>,

    /// Filesystem tool, invoked as `<mkfs> -c <dir> -s <size> <image>`.
    #[arg(long)]
    mkfs: Option<PathBuf>,

    /// Partition table to take the filesystem partition size from.
    #[arg(long)]
    partitions: Option<PathBuf>,

    /// Partition size in bytes.
    #[arg(long, value_parser = maybe_hex::<u32>)]
    size: Option<u32>,

    /// Flash sector size in bytes (default: from the partition table, else 4096).
    #[arg(long, value_parser = maybe_hex::<u32>)]
    sector_size: Option<u32>,

    /// Writes between sector moves on the device.
    #[arg(long, value_parser = maybe_hex::<u32>, default_value_t = DEFAULT_UPDATE_RATE)]
    update_rate: u32,

    /// Partition image to write.
    #[arg(short, long)]
    output: PathBuf,

    /// Overwrite an existing output file.
    #[arg(short, long)]
    force: bool,

    /// Ask before overwriting an existing output file.
    #[arg(short, long)]
    interactive: bool,
}

#[derive(ClapArgs, Debug)]
struct UnpackArgs {
    /// Partition dump read from the device.
    dump: PathBuf,

    /// Raw filesystem image to write.
    #[arg(short, long, required_unless_present = "extract")]
    output: Option<PathBuf>,

    /// Directory to extract the filesystem into, requires --mkfs.
    #[arg(long, requires = "mkfs")]
    extract: Option<PathBuf>,

    /// Filesystem tool, invoked as `<mkfs> -u <dir> <image>`.
    #[arg(long)]
    mkfs: Option<PathBuf>,

    #[command(flatten)]
    geometry: Geometry,

    /// Overwrite an existing output file.
    #[arg(short, long)]
    force: bool,

    /// Ask before overwriting an existing output file.
    #[arg(short, long)]
    interactive: bool,
}

#[derive(ClapArgs, Debug)]
struct InspectArgs {
    /// Partition image or dump.
    file: PathBuf,

    #[command(flatten)]
    geometry: Geometry,
}

fn main() {
    pretty_env_logger::init();

    if let Err(error) = run(Args::parse()) {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    if args.version {
        print_version();
        return Ok(());
    }
    match args.command {
        Some(Command::Build(args)) => build(args),
        Some(Command::Unpack(args)) => unpack(args),
        Some(Command::Inspect(args)) => inspect(args),
        None => bail!("no command given, see --help"),
    }
}

fn print_version() {
    let crate_name = clap::crate_name!();
    let crate_version = clap::crate_version!();
    println!("{} {}", crate_name, crate_version);
}

fn build(args: BuildArgs) -> Result<()> {
    let target = image::resolve(args.partitions.as_deref(), args.size)?;
    let config =
        WlConfig::new(target.sector_size(args.sector_size)).with_update_rate(args.update_rate);

    let tool = args.mkfs.as_deref().map(|mkfs| match target.fs {
        Some(fs) => MkfsTool::new(mkfs).for_partition(fs),
        None => MkfsTool::new(mkfs),
    });
    let source = match (&args.raw, &args.dir, &tool) {
        (Some(raw), _, _) => Source::Raw(raw),
        (None, Some(dir), Some(tool)) => Source::Dir { dir, builder: tool },
        _ => bail!("either --raw or --dir with --mkfs is required"),
    };

    let wrapped = image::build(source, target.size, &config)?;
    artifact::write(
        &args.output,
        &wrapped,
        target.size as usize,
        Overwrite::from_flags(args.force, args.interactive),
    )
}

fn unpack(args: UnpackArgs) -> Result<()> {
    let dump = artifact::read(&args.dump)?;
    let recovered = image::recover(&dump, args.geometry.sector_size);
    let overwrite = Overwrite::from_flags(args.force, args.interactive);

    if let Some(output) = &args.output {
        artifact::write(output, recovered.payload, recovered.payload.len(), overwrite)?;
    }
    if let (Some(dir), Some(mkfs)) = (&args.extract, &args.mkfs) {
        MkfsTool::new(mkfs).extract(recovered.payload, dir)?;
    }
    if recovered.unwrapped.is_none() {
        info!("{} was used verbatim", args.dump.display());
    }
    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let blob = artifact::read(&args.file)?;
    let sector_size = args.geometry.sector_size;
    print!("{}", ui::Report { blob: &blob, sector_size }.render());

    match wl_image::detect(&blob, sector_size) {
        Ok(_) => {
            let unwrapped = wl_image::unwrap_image(&blob, sector_size)?;
            println!("wrapped: yes");
            for advisory in &unwrapped.advisories {
                println!("advisory: {advisory}");
            }
        }
        Err(err) => println!("wrapped: no ({err})"),
    }
    Ok(())
}
