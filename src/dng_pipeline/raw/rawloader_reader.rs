//! Metadata source implementation using the rawloader library.
//!
//! This module supports any RAW format rawloader can decode (ARW, CR2, NEF, RAF, ...).
//! It extracts the camera description needed to build a negative and keeps the decoded
//! sensor samples so callers can move them into a [`PixelBuffer`].

use std::io::Cursor;
use std::path::Path;

use tracing::debug;
use rawloader::RawImageData as RawloaderImageData;
use crate::dng_pipeline::common::error::{Result, ConversionError};
use crate::dng_pipeline::negative::types::{CfaPattern, ColorMatrix, Orientation, PixelBuffer};
use crate::dng_pipeline::raw::reader::MetadataSource;
use crate::dng_pipeline::raw::types::SourceMetadata;

/// Raw file decoded with rawloader.
///
/// Decoding happens eagerly in [`RawLoaderSource::open`] so an unreadable source
/// fails the conversion before anything is written.
pub struct RawLoaderSource {
    metadata: SourceMetadata,
    pixels: Option<PixelBuffer>,
}

impl RawLoaderSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            ConversionError::InputReadError(format!("{}: {}", path.display(), e))
        })?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Self::from_bytes(&data, file_name)
    }

    /// Decodes an in-memory raw file.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use raw2dng_rs::dng_pipeline::{MetadataSource, RawLoaderSource};
    ///
    /// let raw_bytes = std::fs::read("image.arw").unwrap();
    /// let source = RawLoaderSource::from_bytes(&raw_bytes, Some("image.arw".into())).unwrap();
    /// let metadata = source.read_metadata().unwrap();
    /// ```
    pub fn from_bytes(data: &[u8], file_name: Option<String>) -> Result<Self> {
        debug!("Decoding RAW image, {} bytes", data.len());

        let decoded = rawloader::decode(&mut Cursor::new(data))
            .map_err(|e| ConversionError::DecodeError(e.to_string()))?;

        let width = decoded.width;
        let height = decoded.height;
        debug!("Decoded image: {}x{}, {} sample(s) per pixel", width, height, decoded.cpp);

        let cfa = if decoded.cpp == 1 {
            let colors = [
                decoded.cfa.color_at(0, 0),
                decoded.cfa.color_at(0, 1),
                decoded.cfa.color_at(1, 0),
                decoded.cfa.color_at(1, 1),
            ];
            CfaPattern::from_colors(colors).ok_or_else(|| {
                ConversionError::DecodeError(format!("unsupported CFA layout {:?}", colors))
            })?
        } else {
            CfaPattern::Rggb
        };

        let metadata = SourceMetadata {
            make: non_empty(&decoded.clean_make).or_else(|| non_empty(&decoded.make)),
            model: non_empty(&decoded.clean_model).or_else(|| non_empty(&decoded.model)),
            capture_time: read_capture_time(data),
            orientation: map_orientation(decoded.orientation),
            white_balance: normalize_white_balance(decoded.wb_coeffs),
            color_matrix: color_matrix(&decoded.xyz_to_cam),
            black_level: decoded.blacklevels[0],
            white_level: decoded.whitelevels[0],
            cfa,
            dimensions: Some((width, height)),
            file_name,
            embedded_profile: None,
        };

        // Integer data is used directly, float data (normalized 0.0-1.0) is scaled to u16 range
        let samples: Vec<u16> = match decoded.data {
            RawloaderImageData::Integer(values) => values,
            RawloaderImageData::Float(values) => {
                values.iter().map(|&v| (v * u16::MAX as f32).round().clamp(0.0, u16::MAX as f32) as u16).collect()
            }
        };
        let pixels = PixelBuffer::new(samples, width, height, decoded.cpp)?;

        Ok(Self {
            metadata,
            pixels: Some(pixels),
        })
    }

    /// Moves the decoded sensor samples out of the source.
    pub fn take_pixel_buffer(&mut self) -> Result<PixelBuffer> {
        self.pixels
            .take()
            .ok_or_else(|| ConversionError::DecodeError("pixel data already taken".to_string()))
    }

    /// Decodes a raw file and returns only its sensor samples.
    pub fn decode_pixels<P: AsRef<Path>>(path: P) -> Result<PixelBuffer> {
        Self::open(path)?.take_pixel_buffer()
    }
}

impl MetadataSource for RawLoaderSource {
    fn read_metadata(&self) -> Result<SourceMetadata> {
        Ok(self.metadata.clone())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn map_orientation(orientation: rawloader::Orientation) -> Orientation {
    match orientation {
        rawloader::Orientation::Normal => Orientation::Normal,
        rawloader::Orientation::HorizontalFlip => Orientation::MirrorHorizontal,
        rawloader::Orientation::Rotate180 => Orientation::Rotate180,
        rawloader::Orientation::VerticalFlip => Orientation::MirrorVertical,
        rawloader::Orientation::Transpose => Orientation::Transpose,
        rawloader::Orientation::Rotate90 => Orientation::Rotate90,
        rawloader::Orientation::Transverse => Orientation::Transverse,
        rawloader::Orientation::Rotate270 => Orientation::Rotate270,
        _ => Orientation::Normal,
    }
}

/// rawloader reports NaN coefficients for cameras without as-shot white balance.
fn normalize_white_balance(coeffs: [f32; 4]) -> Option<[f32; 3]> {
    let green = coeffs[1];
    if !green.is_finite() || green <= 0.0 {
        return None;
    }
    let wb = [coeffs[0] / green, 1.0, coeffs[2] / green];
    wb.iter().all(|v| v.is_finite() && *v > 0.0).then_some(wb)
}

fn color_matrix(xyz_to_cam: &[[f32; 3]; 4]) -> Option<ColorMatrix> {
    let matrix = ColorMatrix([xyz_to_cam[0], xyz_to_cam[1], xyz_to_cam[2]]);
    (!matrix.is_zero()).then_some(matrix)
}

fn read_capture_time(data: &[u8]) -> Option<String> {
    let exif = match exif::Reader::new().read_from_container(&mut Cursor::new(data)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!("No EXIF capture time available: {}", e);
            return None;
        }
    };
    let field = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)?;
    match &field.value {
        exif::Value::Ascii(values) => values
            .first()
            .map(|v| String::from_utf8_lossy(v).trim_end_matches('\0').to_string()),
        _ => None,
    }
}
