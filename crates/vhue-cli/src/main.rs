//! vhue - animated hue rotation on a persistent worker pool

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "vhue")]
#[command(author, version, about = "Animated hue rotation on a persistent worker pool")]
#[command(long_about = "
Rotates the hue of an image frame by frame. Each frame is split into row
chunks that a fixed pool of worker threads transforms in parallel.

Examples:
  vhue rotate photo.png -o frames/                 # 100 frames, 3.6 deg apart
  vhue rotate photo.png -o frames/ --frames 36 --step 10
  vhue rotate photo.png -o frames/ -j 8 --timeout-ms 2000
  vhue rotate photo.png -o frames/ --config pipeline.yaml
  vhue shift photo.png -o shifted.png --angle 120
  vhue -vv shift photo.png -o shifted.png --angle 120 --serial
")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Number of workers (0 = one per hardware thread)
    #[arg(short = 'j', long, global = true, default_value = "0")]
    threads: usize,

    /// Pipeline config (YAML); command line flags override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render an animation of successive hue rotations
    #[command(visible_alias = "r")]
    Rotate(RotateArgs),

    /// Shift the hue of a single image
    #[command(visible_alias = "s")]
    Shift(ShiftArgs),
}

#[derive(Args)]
pub struct RotateArgs {
    /// Input image
    input: PathBuf,

    /// Output directory for frame_NNNNN.png files
    #[arg(short, long)]
    output: PathBuf,

    /// Number of frames to render
    #[arg(short = 'n', long, conflicts_with = "forever")]
    frames: Option<u64>,

    /// Render until interrupted
    #[arg(long)]
    forever: bool,

    /// Degrees added per frame
    #[arg(long)]
    step: Option<f32>,

    /// Angle of the first frame in degrees
    #[arg(short, long)]
    angle: Option<f32>,

    /// Give up on a frame after this many milliseconds
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Require rows to divide evenly across workers
    #[arg(long)]
    exact: bool,

    /// Transform on the calling thread instead of the worker pool
    #[arg(long)]
    serial: bool,
}

#[derive(Args)]
pub struct ShiftArgs {
    /// Input image
    input: PathBuf,

    /// Output image
    #[arg(short, long)]
    output: PathBuf,

    /// Hue shift in degrees
    #[arg(short, long, allow_hyphen_values = true)]
    angle: f32,

    /// Transform on the calling thread instead of the worker pool
    #[arg(long)]
    serial: bool,
}

/// Installs the global subscriber. The returned guard flushes the log file
/// on drop and must outlive every log call.
fn init_logging(verbose: u8, log: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let Some(path) = log else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid log path: {}", path.display()))?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log.as_ref())?;

    match &cli.command {
        Commands::Rotate(args) => commands::rotate::run(args, &cli),
        Commands::Shift(args) => commands::shift::run(args, &cli),
    }
}
