//! Digital negative data types

use crate::dng_pipeline::common::error::{ConversionError, Result};

/// Owned, contiguous sample grid handed to the negative builder.
///
/// The length always equals `width * height * samples_per_pixel` and both
/// axes are non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    samples_per_pixel: usize,
    data: Vec<u16>,
}

impl PixelBuffer {
    pub fn new(data: Vec<u16>, width: usize, height: usize, samples_per_pixel: usize) -> Result<Self> {
        if width == 0 || height == 0 || samples_per_pixel == 0 {
            return Err(ConversionError::DimensionMismatch(format!(
                "width={}, height={}, samples_per_pixel={} must all be non-zero",
                width, height, samples_per_pixel
            )));
        }

        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(samples_per_pixel))
            .ok_or_else(|| {
                ConversionError::DimensionMismatch(format!("{}x{}x{} overflows", width, height, samples_per_pixel))
            })?;

        if data.len() != expected {
            return Err(ConversionError::DimensionMismatch(format!(
                "buffer holds {} samples, {}x{}x{} requires {}",
                data.len(),
                width,
                height,
                samples_per_pixel,
                expected
            )));
        }

        Ok(Self {
            width,
            height,
            samples_per_pixel,
            data,
        })
    }

    /// Single-sample (CFA mosaic) buffer.
    pub fn mosaic(data: Vec<u16>, width: usize, height: usize) -> Result<Self> {
        Self::new(data, width, height, 1)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.samples_per_pixel
    }

    pub fn data(&self) -> &[u16] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u16> {
        self.data
    }

    pub fn row_len(&self) -> usize {
        self.width * self.samples_per_pixel
    }
}

/// 2x2 Bayer layouts, named by the colors of the top-left quad read row by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfaPattern {
    Rggb,
    Bggr,
    Grbg,
    Gbrg,
}

impl CfaPattern {
    /// Builds a pattern from the color indices (0 = red, 1 = green, 2 = blue)
    /// at (0,0), (0,1), (1,0), (1,1).
    pub fn from_colors(colors: [usize; 4]) -> Option<Self> {
        // Some sensors label the second green as color 3.
        let c = colors.map(|c| if c == 3 { 1 } else { c });
        match c {
            [0, 1, 1, 2] => Some(CfaPattern::Rggb),
            [2, 1, 1, 0] => Some(CfaPattern::Bggr),
            [1, 0, 2, 1] => Some(CfaPattern::Grbg),
            [1, 2, 0, 1] => Some(CfaPattern::Gbrg),
            _ => None,
        }
    }

    /// Color indices in the order written to the CFAPattern tag.
    pub fn colors(&self) -> [u8; 4] {
        match self {
            CfaPattern::Rggb => [0, 1, 1, 2],
            CfaPattern::Bggr => [2, 1, 1, 0],
            CfaPattern::Grbg => [1, 0, 2, 1],
            CfaPattern::Gbrg => [1, 2, 0, 1],
        }
    }

    /// Color index of the photosite at column `x`, row `y`.
    pub fn color_at(&self, x: usize, y: usize) -> usize {
        self.colors()[(y % 2) * 2 + x % 2] as usize
    }
}

/// EXIF/TIFF orientation, values 1 through 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Normal,
    MirrorHorizontal,
    Rotate180,
    MirrorVertical,
    Transpose,
    Rotate90,
    Transverse,
    Rotate270,
}

impl Orientation {
    pub fn to_tiff(self) -> u16 {
        match self {
            Orientation::Normal => 1,
            Orientation::MirrorHorizontal => 2,
            Orientation::Rotate180 => 3,
            Orientation::MirrorVertical => 4,
            Orientation::Transpose => 5,
            Orientation::Rotate90 => 6,
            Orientation::Transverse => 7,
            Orientation::Rotate270 => 8,
        }
    }

    pub fn from_tiff(value: u16) -> Option<Self> {
        Some(match value {
            1 => Orientation::Normal,
            2 => Orientation::MirrorHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::MirrorVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => return None,
        })
    }
}

/// XYZ to camera-native matrix, row major, in DNG `ColorMatrix` semantics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMatrix(pub [[f32; 3]; 3]);

impl ColorMatrix {
    pub fn identity() -> Self {
        ColorMatrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
    }

    pub fn from_slice(values: &[f32]) -> Option<Self> {
        if values.len() < 9 || values.iter().take(9).any(|v| !v.is_finite()) {
            return None;
        }
        let mut m = [[0.0f32; 3]; 3];
        for (i, v) in values.iter().take(9).enumerate() {
            m[i / 3][i % 3] = *v;
        }
        Some(ColorMatrix(m))
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().flatten().all(|v| *v == 0.0)
    }

    pub fn flatten(&self) -> [f32; 9] {
        let m = &self.0;
        [
            m[0][0], m[0][1], m[0][2],
            m[1][0], m[1][1], m[1][2],
            m[2][0], m[2][1], m[2][2],
        ]
    }
}

/// EXIF LightSource code for D65, the default calibration illuminant.
pub const ILLUMINANT_D65: u16 = 21;

/// Resolved, read-only camera description attached to a negative.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraMetadata {
    pub make: String,
    pub model: String,
    /// EXIF `YYYY:MM:DD HH:MM:SS`
    pub capture_time: Option<String>,
    pub orientation: Orientation,
    /// As-shot multipliers for red, green and blue, normalized to green.
    pub white_balance: [f32; 3],
    pub color_matrix: ColorMatrix,
    pub calibration_illuminant: u16,
    pub black_level: u16,
    pub white_level: u16,
    pub cfa: CfaPattern,
    /// Set when an external profile supplied the color transform.
    pub profile_name: Option<String>,
    pub original_file_name: Option<String>,
}

impl CameraMetadata {
    pub fn unique_camera_model(&self) -> String {
        if self.model.starts_with(&self.make) {
            self.model.clone()
        } else {
            format!("{} {}", self.make, self.model)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
    pub samples_per_pixel: usize,
    pub bits_per_sample: u32,
}

/// In-memory digital negative.
///
/// A negative is either empty or complete; only the negative builder can
/// assign its stage-1 image, and does so together with the metadata and
/// geometry derived from it.
#[derive(Debug, Default)]
pub struct Negative {
    stage1: Option<Stage1>,
}

#[derive(Debug)]
struct Stage1 {
    image: PixelBuffer,
    metadata: CameraMetadata,
    geometry: Geometry,
}

impl Negative {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn assign(&mut self, image: PixelBuffer, metadata: CameraMetadata, bits_per_sample: u32) {
        let geometry = Geometry {
            width: image.width(),
            height: image.height(),
            samples_per_pixel: image.samples_per_pixel(),
            bits_per_sample,
        };
        self.stage1 = Some(Stage1 {
            image,
            metadata,
            geometry,
        });
    }

    pub fn is_complete(&self) -> bool {
        self.stage1.is_some()
    }

    pub fn metadata(&self) -> Option<&CameraMetadata> {
        self.stage1.as_ref().map(|s| &s.metadata)
    }

    pub fn geometry(&self) -> Option<Geometry> {
        self.stage1.as_ref().map(|s| s.geometry)
    }

    /// Stage-1 image and metadata of a complete negative.
    pub fn require_complete(&self) -> Result<(&PixelBuffer, &CameraMetadata)> {
        self.stage1
            .as_ref()
            .map(|s| (&s.image, &s.metadata))
            .ok_or(ConversionError::NegativeNotReady)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_buffer_rejects_zero_axes() {
        let err = PixelBuffer::mosaic(vec![], 0, 10).unwrap_err();
        assert!(matches!(err, ConversionError::DimensionMismatch(_)));
        let err = PixelBuffer::mosaic(vec![], 10, 0).unwrap_err();
        assert!(matches!(err, ConversionError::DimensionMismatch(_)));
    }

    #[test]
    fn pixel_buffer_rejects_length_mismatch() {
        let err = PixelBuffer::new(vec![0; 299], 10, 10, 3).unwrap_err();
        assert!(matches!(err, ConversionError::DimensionMismatch(_)));
        assert!(PixelBuffer::new(vec![0; 300], 10, 10, 3).is_ok());
    }

    #[test]
    fn cfa_pattern_round_trips_colors() {
        for pattern in [CfaPattern::Rggb, CfaPattern::Bggr, CfaPattern::Grbg, CfaPattern::Gbrg] {
            let c = pattern.colors().map(|c| c as usize);
            assert_eq!(CfaPattern::from_colors(c), Some(pattern));
        }
        assert_eq!(CfaPattern::from_colors([0, 3, 1, 2]), Some(CfaPattern::Rggb));
        assert_eq!(CfaPattern::from_colors([0, 0, 0, 0]), None);
    }

    #[test]
    fn orientation_codes() {
        for code in 1..=8 {
            assert_eq!(Orientation::from_tiff(code).map(Orientation::to_tiff), Some(code));
        }
        assert_eq!(Orientation::from_tiff(0), None);
        assert_eq!(Orientation::from_tiff(9), None);
    }

    #[test]
    fn empty_negative_is_not_ready() {
        let negative = Negative::empty();
        assert!(!negative.is_complete());
        assert!(negative.geometry().is_none());
        assert!(matches!(negative.require_complete(), Err(ConversionError::NegativeNotReady)));
    }
}
