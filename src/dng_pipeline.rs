//! DNG conversion pipeline
//!
//! Sensor samples and camera metadata flow through four stages, each feeding
//! the next: the negative builder, the image renderer, the preview generator
//! and the container writer.

pub mod common;
pub mod config;
pub mod container;
pub mod conversions;
pub mod negative;
pub mod preview;
pub mod raw;
pub mod render;

use std::path::{Path, PathBuf};

pub use common::{ConversionError, ErrorKind, Result};

pub use config::{ConversionConfig, ConversionConfigBuilder, StageOneEncoding};

pub use container::{ContainerContents, ContainerWriter, DngWriter, read_container};

pub use conversions::{PipelineTimings, RawToDngPipeline, Stage};

pub use negative::{CameraMetadata, ColorMatrix, ColorProfile, Negative, NegativeBuilder, Orientation, PixelBuffer};

pub use preview::{Preview, PreviewEncoding, PreviewGenerator, PreviewSpec};

pub use raw::{CometMode, MetadataSource, RawLoaderSource, SourceMetadata, StackMode, StaticMetadataSource, stack_frames};

pub use render::{CpuRenderer, ImageRenderer, RenderedImage};

/// Converts a single-sample sensor buffer into a DNG with the default
/// configuration and returns the path of the written file.
///
/// Metadata is read from the raw file at `raw_source_path`. An empty or
/// absent `color_profile_path` keeps the color transform found there.
pub fn convert(
    pixel_data: Vec<u16>,
    width: usize,
    height: usize,
    raw_source_path: impl AsRef<Path>,
    color_profile_path: Option<&Path>,
    destination_path: impl AsRef<Path>,
) -> Result<PathBuf> {
    let destination = destination_path.as_ref();
    RawToDngPipeline::new(ConversionConfig::default()).convert_file(
        pixel_data,
        width,
        height,
        raw_source_path.as_ref(),
        color_profile_path,
        destination,
    )?;
    Ok(destination.to_path_buf())
}
