use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use tracing::info;

use raw2dng_rs::dng_pipeline::{
    CometMode, ConversionConfig, PixelBuffer, RawLoaderSource, RawToDngPipeline, StackMode, StageOneEncoding,
    stack_frames,
};
use raw2dng_rs::logger;

/// Resolves a path that may not exist yet through its parent directory.
fn resolved(path: &Path) -> PathBuf {
    if let Ok(path) = path.canonicalize() {
        return path;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
            parent
                .canonicalize()
                .map(|p| p.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Refuses to write the DNG over one of the inputs.
fn ensure_distinct_output(output: &Path, inputs: &[PathBuf]) -> Result<()> {
    let target = resolved(output);
    if let Some(input) = inputs.iter().find(|input| resolved(input) == target) {
        bail!(
            "output {} would overwrite input {}; pass --output",
            output.display(),
            input.display()
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Max,
    Add,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Comet {
    Falling,
    Raising,
    Normal,
}

/// Converts one or more RAW captures into a single DNG.
///
/// Several inputs are stacked first; camera metadata comes from the first one.
#[derive(Parser, Debug)]
#[command(name = "raw2dng")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// RAW files to convert
    #[arg(required = true, value_name = "INPUT")]
    inputs: Vec<PathBuf>,

    /// Output DNG (default: first input with a .dng extension)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// DNG camera profile overriding the raw file's color matrix
    #[arg(short, long, value_name = "DCP")]
    profile: Option<PathBuf>,

    /// How stacked frames are merged
    #[arg(short, long, value_enum, default_value = "max")]
    mode: Mode,

    /// Intensity ramp across stacked frames
    #[arg(short, long, value_enum, default_value = "normal")]
    comet: Comet,

    /// Store demosaiced LinearRaw data instead of the CFA mosaic
    #[arg(long)]
    linearize: bool,
}

fn main() -> Result<()> {
    logger::init();
    let cli = Cli::parse();

    let mode = match cli.mode {
        Mode::Max => StackMode::Max,
        Mode::Add => StackMode::Add,
    };
    let comet = match cli.comet {
        Comet::Falling => CometMode::Falling,
        Comet::Raising => CometMode::Raising,
        Comet::Normal => CometMode::Normal,
    };

    let (first_path, rest) = cli
        .inputs
        .split_first()
        .context("at least one input is required")?;
    let output = cli.output.clone().unwrap_or_else(|| first_path.with_extension("dng"));
    ensure_distinct_output(&output, &cli.inputs)?;

    let mut source = RawLoaderSource::open(first_path)
        .with_context(|| format!("failed to read {}", first_path.display()))?;
    let mut frames = vec![source.take_pixel_buffer()?];
    let others: Vec<PixelBuffer> = rest
        .par_iter()
        .map(|path| {
            RawLoaderSource::decode_pixels(path).with_context(|| format!("failed to read {}", path.display()))
        })
        .collect::<Result<_>>()?;
    frames.extend(others);
    info!("Decoded {} frame(s)", frames.len());

    let stacked = stack_frames(frames, mode, comet)?;
    let (width, height) = (stacked.width(), stacked.height());

    let config = ConversionConfig::builder()
        .stage_one(if cli.linearize {
            StageOneEncoding::Linearized
        } else {
            StageOneEncoding::Original
        })
        .build();
    let pipeline = RawToDngPipeline::new(config);
    info!("Stage-1 encoding: {:?}", pipeline.config().stage_one);

    pipeline
        .convert(&source, stacked, width, height, cli.profile.as_deref(), &output)
        .with_context(|| format!("failed to convert into {}", output.display()))?;

    info!("Wrote {}", output.display());
    Ok(())
}
