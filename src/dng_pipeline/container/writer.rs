//! DNG serialization of a negative and its previews.

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use tiff::tags::{CompressionMethod, PhotometricInterpretation, PlanarConfiguration};
use tracing::{debug, info};

use super::atomic::commit_atomically;
use super::directory::{Directory, Rational, SRational, Value};
use super::layout::ContainerLayout;
use super::tags::*;
use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::config::{ConversionConfig, StageOneEncoding};
use crate::dng_pipeline::negative::types::{CameraMetadata, Negative, PixelBuffer};
use crate::dng_pipeline::preview::{Preview, PreviewEncoding};
use crate::dng_pipeline::render::demosaic::demosaic;

/// Target size of one stage-1 strip when the configuration leaves it open.
const AUTO_STRIP_BYTES: usize = 64 * 1024;
const COLOR_MATRIX_DENOMINATOR: i32 = 10_000;
const NEUTRAL_DENOMINATOR: u32 = 100_000;

/// Trait for writing a negative and its previews to a container file
pub trait ContainerWriter {
    /// Writes the container at `destination`, replacing it only on success
    fn write_container(
        &self,
        negative: &Negative,
        previews: &[Preview],
        destination: &Path,
        config: &ConversionConfig,
    ) -> Result<()>;
}

/// Little-endian DNG writer
#[derive(Debug, Default, Clone, Copy)]
pub struct DngWriter;

impl DngWriter {
    pub fn new() -> Self {
        Self
    }

    /// Lays the whole container out in memory.
    pub fn serialize(&self, negative: &Negative, previews: &[Preview], config: &ConversionConfig) -> Result<Vec<u8>> {
        let (image, metadata) = negative.require_complete()?;
        let stage_one = stage_one_image(image, metadata, config.stage_one)?;

        let mut layout = ContainerLayout::new();
        let mut raw_dir = write_stage_one(&mut layout, &stage_one, metadata, config.rows_per_strip)?;

        let exif_offset = {
            let mut exif = Directory::new();
            exif.add_tag(ExtTag::ExifVersion, Value::Undefined(EXIF_VERSION_2_3.to_vec()));
            if let Some(time) = &metadata.capture_time {
                exif.add_tag(ExtTag::DateTimeOriginal, time.as_str());
            }
            layout.write_directory(&exif)?
        };

        let root_offset = match previews.split_first() {
            None => {
                add_root_tags(&mut raw_dir, metadata, config);
                raw_dir.add_tag(ExtTag::ExifIfd, exif_offset);
                layout.write_directory(&raw_dir)?
            }
            Some((first, rest)) => {
                let mut sub_ifds = vec![layout.write_directory(&raw_dir)?];
                for preview in rest {
                    let dir = write_preview(&mut layout, preview)?;
                    sub_ifds.push(layout.write_directory(&dir)?);
                }
                let mut root = write_preview(&mut layout, first)?;
                add_root_tags(&mut root, metadata, config);
                root.add_tag(ExtTag::ExifIfd, exif_offset);
                root.add_tag(ExtTag::SubIfds, sub_ifds);
                layout.write_directory(&root)?
            }
        };

        let bytes = layout.finish(root_offset)?;
        debug!("Serialized container: {} bytes, {} previews", bytes.len(), previews.len());
        Ok(bytes)
    }
}

impl ContainerWriter for DngWriter {
    fn write_container(
        &self,
        negative: &Negative,
        previews: &[Preview],
        destination: &Path,
        config: &ConversionConfig,
    ) -> Result<()> {
        info!("Writing DNG: {}", destination.display());
        let bytes = self.serialize(negative, previews, config)?;
        commit_atomically(destination, |w| {
            w.write_all(&bytes).map_err(|e| {
                ConversionError::OutputWriteError(format!("Failed to write {}: {}", destination.display(), e))
            })
        })?;
        info!("Successfully wrote {} bytes", bytes.len());
        Ok(())
    }
}

fn stage_one_image<'a>(
    image: &'a PixelBuffer,
    metadata: &CameraMetadata,
    encoding: StageOneEncoding,
) -> Result<Cow<'a, PixelBuffer>> {
    match (encoding, image.samples_per_pixel()) {
        (StageOneEncoding::Linearized, 1) => {
            debug!("Linearizing stage-1 mosaic");
            let rgb = demosaic(image, metadata.cfa)?;
            Ok(Cow::Owned(PixelBuffer::new(rgb, image.width(), image.height(), 3)?))
        }
        _ => Ok(Cow::Borrowed(image)),
    }
}

fn rows_per_strip(image: &PixelBuffer, configured: Option<u32>) -> usize {
    let rows = match configured {
        Some(rows) => rows as usize,
        None => AUTO_STRIP_BYTES / (image.row_len() * 2).max(1),
    };
    rows.clamp(1, image.height())
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| ConversionError::SerializationError(format!("{} {} does not fit a LONG", what, value)))
}

/// Writes the stage-1 strips and returns the directory describing them.
fn write_stage_one(
    layout: &mut ContainerLayout,
    image: &PixelBuffer,
    metadata: &CameraMetadata,
    configured_rows: Option<u32>,
) -> Result<Directory> {
    let spp = image.samples_per_pixel();
    let rows = rows_per_strip(image, configured_rows);
    let strip_len = rows * image.row_len();

    let mut offsets = Vec::new();
    let mut counts = Vec::new();
    for strip in image.data().chunks(strip_len) {
        offsets.push(layout.write_samples(strip)?);
        counts.push(to_u32(strip.len() * 2, "strip size")?);
    }
    debug!("Stage-1 image in {} strips of {} rows", offsets.len(), rows);

    let photometric = if spp == 1 { PHOTOMETRIC_CFA } else { PHOTOMETRIC_LINEAR_RAW };
    let mut dir = Directory::new();
    dir.add_tag(ExtTag::NewSubFileType, SUBFILE_MAIN_IMAGE);
    dir.add_tag(Tag::ImageWidth, to_u32(image.width(), "width")?);
    dir.add_tag(Tag::ImageLength, to_u32(image.height(), "height")?);
    dir.add_tag(Tag::BitsPerSample, vec![16u16; spp]);
    dir.add_tag(Tag::Compression, CompressionMethod::None.to_u16());
    dir.add_tag(Tag::PhotometricInterpretation, photometric);
    dir.add_tag(Tag::SamplesPerPixel, spp as u16);
    dir.add_tag(Tag::PlanarConfiguration, PlanarConfiguration::Chunky.to_u16());
    dir.add_tag(Tag::RowsPerStrip, to_u32(rows, "rows per strip")?);
    dir.add_tag(Tag::StripOffsets, offsets);
    dir.add_tag(Tag::StripByteCounts, counts);

    if spp == 1 {
        dir.add_tag(ExtTag::CfaRepeatPatternDim, [2u16, 2]);
        dir.add_tag(ExtTag::CfaPattern, metadata.cfa.colors());
        dir.add_tag(DngTag::CfaPlaneColor, [0u8, 1, 2]);
        dir.add_tag(DngTag::CfaLayout, 1u16);
    }
    dir.add_tag(DngTag::BlackLevelRepeatDim, [1u16, 1]);
    dir.add_tag(DngTag::BlackLevel, vec![metadata.black_level; spp]);
    dir.add_tag(DngTag::WhiteLevel, vec![metadata.white_level; spp]);
    Ok(dir)
}

/// Writes a preview's pixels and returns its directory.
fn write_preview(layout: &mut ContainerLayout, preview: &Preview) -> Result<Directory> {
    let (compression, photometric) = match preview.encoding {
        PreviewEncoding::Uncompressed => {
            let expected = preview.width * preview.height * 3;
            if preview.data.len() != expected {
                return Err(ConversionError::SerializationError(format!(
                    "preview '{}' holds {} bytes, {}x{} RGB needs {}",
                    preview.name,
                    preview.data.len(),
                    preview.width,
                    preview.height,
                    expected
                )));
            }
            (CompressionMethod::None, PhotometricInterpretation::RGB)
        }
        PreviewEncoding::Jpeg { .. } => {
            if preview.data.is_empty() {
                return Err(ConversionError::SerializationError(format!(
                    "preview '{}' has no JPEG data",
                    preview.name
                )));
            }
            (CompressionMethod::ModernJPEG, PhotometricInterpretation::YCbCr)
        }
    };
    if preview.width == 0 || preview.height == 0 {
        return Err(ConversionError::SerializationError(format!(
            "preview '{}' is {}x{}",
            preview.name, preview.width, preview.height
        )));
    }

    let offset = layout.write_data(&preview.data)?;

    let mut dir = Directory::new();
    dir.add_tag(ExtTag::NewSubFileType, SUBFILE_PREVIEW);
    dir.add_tag(Tag::ImageWidth, to_u32(preview.width, "width")?);
    dir.add_tag(Tag::ImageLength, to_u32(preview.height, "height")?);
    dir.add_tag(Tag::BitsPerSample, [8u16, 8, 8]);
    dir.add_tag(Tag::Compression, compression.to_u16());
    dir.add_tag(Tag::PhotometricInterpretation, photometric.to_u16());
    dir.add_tag(Tag::SamplesPerPixel, 3u16);
    dir.add_tag(Tag::PlanarConfiguration, PlanarConfiguration::Chunky.to_u16());
    dir.add_tag(Tag::RowsPerStrip, to_u32(preview.height, "height")?);
    dir.add_tag(Tag::StripOffsets, vec![offset]);
    dir.add_tag(Tag::StripByteCounts, vec![to_u32(preview.data.len(), "preview size")?]);
    dir.add_tag(ExtTag::Orientation, preview.orientation.to_tiff());
    dir.add_tag(DngTag::PreviewColorSpace, PREVIEW_COLOR_SPACE_SRGB);
    Ok(dir)
}

/// Camera-level tags carried by IFD0.
fn add_root_tags(dir: &mut Directory, metadata: &CameraMetadata, config: &ConversionConfig) {
    dir.add_tag(DngTag::DngVersion, DNG_VERSION_V1_4);
    dir.add_tag(DngTag::DngBackwardVersion, DNG_BACKWARD_VERSION_V1_1);
    dir.add_tag(Tag::Make, metadata.make.as_str());
    dir.add_tag(Tag::Model, metadata.model.as_str());
    dir.add_tag(DngTag::UniqueCameraModel, metadata.unique_camera_model());
    dir.add_tag(ExtTag::Orientation, metadata.orientation.to_tiff());
    dir.add_tag(Tag::Software, config.software.as_str());
    if let Some(time) = &metadata.capture_time {
        dir.add_tag(Tag::DateTime, time.as_str());
    }

    let matrix: Vec<SRational> = metadata
        .color_matrix
        .flatten()
        .iter()
        .map(|v| SRational::new_f32(*v, COLOR_MATRIX_DENOMINATOR))
        .collect();
    dir.add_tag(DngTag::ColorMatrix1, matrix);
    dir.add_tag(DngTag::CalibrationIlluminant1, metadata.calibration_illuminant);

    let neutral: Vec<Rational> = metadata
        .white_balance
        .iter()
        .map(|wb| Rational::new_f32(1.0 / wb, NEUTRAL_DENOMINATOR))
        .collect();
    dir.add_tag(DngTag::AsShotNeutral, neutral);

    if let Some(name) = &metadata.profile_name {
        dir.add_tag(DngTag::ProfileName, name.as_str());
    }
    if let Some(name) = &metadata.original_file_name {
        dir.add_tag(DngTag::OriginalRawFileName, name.as_str());
    }
}
