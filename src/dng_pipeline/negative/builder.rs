use std::path::Path;

use tracing::{debug, info, warn};

use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::negative::profile::ColorProfile;
use crate::dng_pipeline::negative::types::{CameraMetadata, ILLUMINANT_D65, Negative, PixelBuffer};
use crate::dng_pipeline::raw::MetadataSource;
use crate::dng_pipeline::raw::types::SourceMetadata;

/// Default bit depth when the white level does not narrow it down.
const DEFAULT_BITS_PER_SAMPLE: u32 = 16;

/// The bit width of the u16 data type, used for calculating actual bits per sample.
const U16_BITS: u32 = 16;

const UNKNOWN_CAMERA: &str = "Unknown";

/// Populates a negative from a pixel buffer and the metadata of one raw capture.
///
/// A builder belongs to a single conversion; it holds no state besides its source.
pub struct NegativeBuilder<'a> {
    source: &'a dyn MetadataSource,
}

impl<'a> NegativeBuilder<'a> {
    pub fn new(source: &'a dyn MetadataSource) -> Self {
        Self { source }
    }

    /// Builds a complete negative, taking ownership of `pixels`.
    ///
    /// `width` and `height` are authoritative: they must match the buffer
    /// and, when the source reports its own sensor geometry, that too.
    /// A non-empty `color_profile` path overrides the source's color matrix.
    pub fn build_negative(
        &self,
        color_profile: Option<&Path>,
        pixels: PixelBuffer,
        width: usize,
        height: usize,
    ) -> Result<Negative> {
        if width == 0 || height == 0 {
            return Err(ConversionError::DimensionMismatch(format!(
                "width={} and height={} must be positive",
                width, height
            )));
        }
        if pixels.width() != width || pixels.height() != height {
            return Err(ConversionError::DimensionMismatch(format!(
                "requested {}x{} but pixel buffer is {}x{}",
                width,
                height,
                pixels.width(),
                pixels.height()
            )));
        }

        let source = self.source.read_metadata()?;
        if let Some((source_width, source_height)) = source.dimensions {
            if (source_width, source_height) != (width, height) {
                return Err(ConversionError::DimensionMismatch(format!(
                    "raw source is {}x{} but {}x{} was requested",
                    source_width, source_height, width, height
                )));
            }
        }

        let metadata = resolve_metadata(source, color_profile)?;
        let bits_per_sample = bits_per_sample(metadata.white_level);
        debug!(
            "Calculated bits_per_sample: {} (white level: {})",
            bits_per_sample, metadata.white_level
        );

        info!(
            width,
            height,
            samples_per_pixel = pixels.samples_per_pixel(),
            make = %metadata.make,
            model = %metadata.model,
            "Negative built"
        );

        let mut negative = Negative::empty();
        negative.assign(pixels, metadata, bits_per_sample);
        Ok(negative)
    }
}

fn resolve_metadata(source: SourceMetadata, color_profile: Option<&Path>) -> Result<CameraMetadata> {
    let override_profile = match color_profile.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) => {
            info!(profile = %path.display(), "Using external color profile");
            Some(ColorProfile::load(path)?)
        }
        None => None,
    };

    let (color_matrix, calibration_illuminant, profile_name) =
        match override_profile.or(source.embedded_profile) {
            Some(profile) => (profile.color_matrix, profile.calibration_illuminant, profile.name),
            None => {
                let matrix = source.color_matrix.ok_or_else(|| {
                    ConversionError::NegativeConstructionError(
                        "raw source has no color matrix and no profile was given".to_string(),
                    )
                })?;
                (matrix, ILLUMINANT_D65, None)
            }
        };

    if source.black_level >= source.white_level {
        return Err(ConversionError::NegativeConstructionError(format!(
            "black level {} is not below white level {}",
            source.black_level, source.white_level
        )));
    }

    let white_balance = match source.white_balance {
        Some(wb) if wb.iter().all(|c| c.is_finite() && *c > 0.0) => wb,
        Some(wb) => {
            return Err(ConversionError::NegativeConstructionError(format!(
                "white balance {:?} has non-positive multipliers",
                wb
            )));
        }
        None => {
            warn!("Raw source has no as-shot white balance, using neutral");
            [1.0, 1.0, 1.0]
        }
    };

    Ok(CameraMetadata {
        make: source.make.unwrap_or_else(|| UNKNOWN_CAMERA.to_string()),
        model: source.model.unwrap_or_else(|| UNKNOWN_CAMERA.to_string()),
        capture_time: source.capture_time,
        orientation: source.orientation,
        white_balance,
        color_matrix,
        calibration_illuminant,
        black_level: source.black_level,
        white_level: source.white_level,
        cfa: source.cfa,
        profile_name,
        original_file_name: source.file_name,
    })
}

/// Bits needed to represent the white level, e.g. 4095 -> 12, 16383 -> 14.
fn bits_per_sample(white_level: u16) -> u32 {
    if white_level == 0 {
        DEFAULT_BITS_PER_SAMPLE
    } else {
        U16_BITS - white_level.leading_zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dng_pipeline::container::directory::{Directory, SRational};
    use crate::dng_pipeline::container::layout::{ContainerLayout, DCP_MAGIC};
    use crate::dng_pipeline::container::tags::DngTag;
    use crate::dng_pipeline::negative::types::{ColorMatrix, Orientation};
    use crate::dng_pipeline::raw::StaticMetadataSource;

    fn source_metadata() -> SourceMetadata {
        SourceMetadata {
            make: Some("Canon".into()),
            model: Some("EOS 6D".into()),
            capture_time: Some("2017:11:03 23:31:29".into()),
            orientation: Orientation::Rotate90,
            white_balance: Some([2.0, 1.0, 1.5]),
            color_matrix: Some(ColorMatrix::identity()),
            black_level: 2048,
            white_level: 15000,
            ..SourceMetadata::default()
        }
    }

    fn zeros(width: usize, height: usize) -> PixelBuffer {
        PixelBuffer::mosaic(vec![0; width * height], width, height).unwrap()
    }

    #[test]
    fn geometry_matches_request() {
        let source = StaticMetadataSource::new(source_metadata());
        let negative = NegativeBuilder::new(&source)
            .build_negative(None, zeros(12, 8), 12, 8)
            .unwrap();
        let geometry = negative.geometry().unwrap();
        assert_eq!((geometry.width, geometry.height), (12, 8));
        assert_eq!(geometry.samples_per_pixel, 1);
        assert_eq!(geometry.bits_per_sample, 14);
        let metadata = negative.metadata().unwrap();
        assert_eq!(metadata.orientation, Orientation::Rotate90);
        assert_eq!(metadata.profile_name, None);
    }

    #[test]
    fn zero_width_is_a_dimension_mismatch() {
        let source = StaticMetadataSource::new(source_metadata());
        let err = NegativeBuilder::new(&source)
            .build_negative(None, zeros(4, 4), 0, 4)
            .unwrap_err();
        assert!(matches!(err, ConversionError::DimensionMismatch(_)));
    }

    #[test]
    fn buffer_geometry_must_match_request() {
        let source = StaticMetadataSource::new(source_metadata());
        let err = NegativeBuilder::new(&source)
            .build_negative(None, zeros(4, 4), 2, 8)
            .unwrap_err();
        assert!(matches!(err, ConversionError::DimensionMismatch(_)));
    }

    #[test]
    fn source_geometry_is_validated_against_request() {
        let mut metadata = source_metadata();
        metadata.dimensions = Some((6, 4));
        let source = StaticMetadataSource::new(metadata);
        let err = NegativeBuilder::new(&source)
            .build_negative(None, zeros(4, 4), 4, 4)
            .unwrap_err();
        assert!(matches!(err, ConversionError::DimensionMismatch(_)));
    }

    #[test]
    fn missing_matrix_without_override_fails() {
        let mut metadata = source_metadata();
        metadata.color_matrix = None;
        let source = StaticMetadataSource::new(metadata);
        let err = NegativeBuilder::new(&source)
            .build_negative(None, zeros(4, 4), 4, 4)
            .unwrap_err();
        assert!(matches!(err, ConversionError::NegativeConstructionError(_)));
    }

    #[test]
    fn empty_profile_path_means_embedded_metadata() {
        let source = StaticMetadataSource::new(source_metadata());
        let negative = NegativeBuilder::new(&source)
            .build_negative(Some(Path::new("")), zeros(4, 4), 4, 4)
            .unwrap();
        assert_eq!(negative.metadata().unwrap().color_matrix, ColorMatrix::identity());
    }

    fn write_profile(dir: &Path, name: &str, diagonal: f32) -> std::path::PathBuf {
        let mut layout = ContainerLayout::with_magic(DCP_MAGIC);
        let mut profile = Directory::new();
        let m = [diagonal, 0.0, 0.0, 0.0, diagonal, 0.0, 0.0, 0.0, diagonal];
        profile.add_tag(
            DngTag::ColorMatrix1,
            m.iter().map(|v| SRational::new_f32(*v, 10_000)).collect::<Vec<_>>(),
        );
        profile.add_tag(DngTag::ProfileName, name);
        let offset = layout.write_directory(&profile).unwrap();
        let path = dir.join(format!("{}.dcp", name));
        std::fs::write(&path, layout.finish(offset).unwrap()).unwrap();
        path
    }

    fn embedded(name: &str, diagonal: f32) -> ColorProfile {
        let mut matrix = ColorMatrix::identity();
        for i in 0..3 {
            matrix.0[i][i] = diagonal;
        }
        ColorProfile {
            name: Some(name.to_string()),
            color_matrix: matrix,
            calibration_illuminant: 17,
        }
    }

    #[test]
    fn profile_override_replaces_missing_matrix() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_profile(tmp.path(), "Override", 0.5);

        let mut metadata = source_metadata();
        metadata.color_matrix = None;
        let source = StaticMetadataSource::new(metadata);
        let negative = NegativeBuilder::new(&source)
            .build_negative(Some(&path), zeros(4, 4), 4, 4)
            .unwrap();
        let metadata = negative.metadata().unwrap();
        assert_eq!(metadata.profile_name.as_deref(), Some("Override"));
        assert_eq!(metadata.color_matrix.0[1][1], 0.5);
    }

    #[test]
    fn profile_override_beats_embedded_profile() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_profile(tmp.path(), "Override", 0.5);

        let mut metadata = source_metadata();
        metadata.embedded_profile = Some(embedded("Embedded", 0.25));
        let source = StaticMetadataSource::new(metadata);
        let negative = NegativeBuilder::new(&source)
            .build_negative(Some(&path), zeros(4, 4), 4, 4)
            .unwrap();
        let metadata = negative.metadata().unwrap();
        assert_eq!(metadata.profile_name.as_deref(), Some("Override"));
        assert_eq!(metadata.color_matrix.0[0][0], 0.5);
        assert_eq!(metadata.calibration_illuminant, ILLUMINANT_D65);
    }

    #[test]
    fn embedded_profile_beats_source_matrix() {
        let mut metadata = source_metadata();
        metadata.embedded_profile = Some(embedded("Embedded", 0.25));
        let source = StaticMetadataSource::new(metadata);
        let negative = NegativeBuilder::new(&source)
            .build_negative(None, zeros(4, 4), 4, 4)
            .unwrap();
        let metadata = negative.metadata().unwrap();
        assert_eq!(metadata.profile_name.as_deref(), Some("Embedded"));
        assert_eq!(metadata.color_matrix.0[2][2], 0.25);
        assert_eq!(metadata.calibration_illuminant, 17);
    }

    #[test]
    fn missing_white_balance_defaults_to_neutral() {
        let mut metadata = source_metadata();
        metadata.white_balance = None;
        let source = StaticMetadataSource::new(metadata);
        let negative = NegativeBuilder::new(&source)
            .build_negative(None, zeros(4, 4), 4, 4)
            .unwrap();
        assert_eq!(negative.metadata().unwrap().white_balance, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn bits_from_white_level() {
        assert_eq!(bits_per_sample(4095), 12);
        assert_eq!(bits_per_sample(16383), 14);
        assert_eq!(bits_per_sample(u16::MAX), 16);
        assert_eq!(bits_per_sample(0), 16);
    }
}
