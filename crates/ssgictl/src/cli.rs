use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ssgi::Extent;

#[derive(Parser, Debug)]
#[command(
    name = "ssgictl",
    author,
    version,
    about = "Inspect ssgi frame schedules and settings files"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build frames with a recording host and print their command batches.
    Plan(PlanArgs),
    /// Validate a settings file and print the resolved settings.
    Check(CheckArgs),
    /// Print a settings file containing every default.
    Defaults,
    /// Print the resolved configuration directory.
    Where,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Settings file; defaults to `ssgi.toml` in the config directory when present.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Camera output size.
    #[arg(
        long,
        value_name = "WIDTHxHEIGHT",
        value_parser = parse_extent,
        default_value = "1920x1080"
    )]
    pub size: Extent,

    /// Number of consecutive frames to build.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub frames: u32,

    /// Override the blur iteration count (0-8).
    #[arg(long, value_name = "N")]
    pub iterations: Option<u32>,

    /// Override the blur radius (0-2).
    #[arg(long, value_name = "TEXELS")]
    pub radius: Option<f32>,

    /// Override the ray-march resolution scale (0.25-1.0).
    #[arg(long, value_name = "SCALE")]
    pub scale: Option<f32>,

    /// Cap transient target memory, in MiB.
    #[arg(long, value_name = "MIB")]
    pub budget_mib: Option<u64>,

    /// Emit JSON instead of a text listing.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_extent(value: &str) -> Result<Extent, String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{trimmed}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width in '{trimmed}'"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height in '{trimmed}'"))?;
    if width == 0 || height == 0 {
        return Err(format!("size must be non-zero, got '{trimmed}'"));
    }
    Ok(Extent::new(width, height))
}
