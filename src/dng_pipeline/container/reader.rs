//! Reader for tag-indexed containers: DNG files written by this crate and
//! DNG camera profiles.
//!
//! Every offset is bounds-checked; a value or strip that points outside the
//! file is reported as a [`ConversionError::DecodeError`].

use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::container::directory::{Directory, Rational, SRational, Value};
use crate::dng_pipeline::container::layout::{DCP_MAGIC, TIFF_MAGIC};
use crate::dng_pipeline::container::tags::{DngTag, ExtTag, Tag, SUBFILE_MAIN_IMAGE};
use crate::dng_pipeline::negative::types::Orientation;

/// Directories larger than this are treated as corrupt.
const MAX_ENTRIES: usize = 4096;

fn malformed(msg: impl Into<String>) -> ConversionError {
    ConversionError::DecodeError(msg.into())
}

/// Parsed container header with access to its directories.
pub struct TiffFile<'a> {
    data: &'a [u8],
    little_endian: bool,
    magic: u16,
    first_directory: u32,
}

/// A directory together with where it was found.
#[derive(Debug, Clone)]
pub struct ParsedDirectory {
    pub offset: u32,
    pub next: u32,
    pub entries: Directory,
}

impl<'a> TiffFile<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(malformed("file too short for a header"));
        }
        let little_endian = match (data[0], data[1]) {
            (0x49, 0x49) => true,
            (0x4D, 0x4D) => false,
            (a, b) => return Err(malformed(format!("invalid byte order marker {:#04x}{:02x}", a, b))),
        };
        let mut file = Self {
            data,
            little_endian,
            magic: 0,
            first_directory: 0,
        };
        file.magic = file.u16_at(2)?;
        if file.magic != TIFF_MAGIC && file.magic != DCP_MAGIC {
            return Err(malformed(format!("invalid magic {:#06x}", file.magic)));
        }
        file.first_directory = file.u32_at(4)?;
        Ok(file)
    }

    pub fn magic(&self) -> u16 {
        self.magic
    }

    pub fn first_directory(&self) -> Result<ParsedDirectory> {
        self.directory_at(self.first_directory)
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .map(|end| &self.data[offset..end])
            .ok_or_else(|| malformed(format!("range {} (+{}) is outside the file", offset, len)))
    }

    fn u16_at(&self, offset: usize) -> Result<u16> {
        let b = self.slice(offset, 2)?;
        Ok(if self.little_endian {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        })
    }

    fn u32_at(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        let bytes = [b[0], b[1], b[2], b[3]];
        Ok(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    pub fn directory_at(&self, offset: u32) -> Result<ParsedDirectory> {
        let base = offset as usize;
        let count = self.u16_at(base)? as usize;
        if count == 0 || count > MAX_ENTRIES {
            return Err(malformed(format!("directory at {} has {} entries", offset, count)));
        }

        let mut entries = Directory::new();
        for i in 0..count {
            let entry = base + 2 + i * 12;
            let tag = self.u16_at(entry)?;
            let field_type = self.u16_at(entry + 2)?;
            let value_count = self.u32_at(entry + 4)? as usize;

            let Some(unit) = type_size(field_type) else {
                // Unknown field types must be skipped
                continue;
            };
            let len = unit
                .checked_mul(value_count)
                .ok_or_else(|| malformed(format!("tag {} value count overflows", tag)))?;
            let bytes = if len <= 4 {
                self.slice(entry + 8, len)?
            } else {
                let value_offset = self.u32_at(entry + 8)? as usize;
                self.slice(value_offset, len)
                    .map_err(|_| malformed(format!("tag {} has a dangling value offset {}", tag, value_offset)))?
            };
            if let Some(value) = self.decode_value(field_type, bytes) {
                entries.add_tag(tag, value);
            }
        }

        let next = self.u32_at(base + 2 + count * 12)?;
        Ok(ParsedDirectory { offset, next, entries })
    }

    fn decode_value(&self, field_type: u16, bytes: &[u8]) -> Option<Value> {
        let u16s = || -> Vec<u16> {
            bytes
                .chunks_exact(2)
                .map(|c| if self.little_endian { u16::from_le_bytes([c[0], c[1]]) } else { u16::from_be_bytes([c[0], c[1]]) })
                .collect()
        };
        let u32s = || -> Vec<u32> {
            bytes
                .chunks_exact(4)
                .map(|c| {
                    let b = [c[0], c[1], c[2], c[3]];
                    if self.little_endian { u32::from_le_bytes(b) } else { u32::from_be_bytes(b) }
                })
                .collect()
        };
        Some(match field_type {
            1 => Value::Byte(bytes.to_vec()),
            2 => Value::Ascii(
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .to_string(),
            ),
            3 => Value::Short(u16s()),
            // LONG and IFD
            4 | 13 => Value::Long(u32s()),
            5 => Value::Rational(u32s().chunks_exact(2).map(|p| Rational::new(p[0], p[1])).collect()),
            7 => Value::Undefined(bytes.to_vec()),
            10 => Value::SRational(
                u32s()
                    .chunks_exact(2)
                    .map(|p| SRational::new(p[0] as i32, p[1] as i32))
                    .collect(),
            ),
            _ => return None,
        })
    }

    /// Concatenated strip bytes of an image directory.
    pub fn strip_data(&self, dir: &Directory) -> Result<Vec<u8>> {
        let offsets = dir
            .u32s(Tag::StripOffsets)
            .ok_or_else(|| malformed("image directory without StripOffsets"))?;
        let counts = dir
            .u32s(Tag::StripByteCounts)
            .ok_or_else(|| malformed("image directory without StripByteCounts"))?;
        if offsets.len() != counts.len() {
            return Err(malformed("strip offsets and byte counts differ in length"));
        }
        let mut out = Vec::with_capacity(counts.iter().map(|c| *c as usize).sum());
        for (offset, count) in offsets.iter().zip(&counts) {
            let strip = self
                .slice(*offset as usize, *count as usize)
                .map_err(|_| malformed(format!("strip at {} (+{}) is dangling", offset, count)))?;
            out.extend_from_slice(strip);
        }
        Ok(out)
    }

    fn samples_u16(&self, bytes: &[u8]) -> Vec<u16> {
        bytes
            .chunks_exact(2)
            .map(|c| if self.little_endian { u16::from_le_bytes([c[0], c[1]]) } else { u16::from_be_bytes([c[0], c[1]]) })
            .collect()
    }
}

fn type_size(field_type: u16) -> Option<usize> {
    Some(match field_type {
        1 | 2 | 6 | 7 => 1,
        3 | 8 => 2,
        4 | 9 | 11 | 13 => 4,
        5 | 10 | 12 => 8,
        _ => return None,
    })
}

/// Stage-1 image recovered from a container.
#[derive(Debug, Clone, PartialEq)]
pub struct MainImage {
    pub width: usize,
    pub height: usize,
    pub samples_per_pixel: usize,
    pub photometric: u16,
    pub samples: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedPreview {
    pub width: usize,
    pub height: usize,
    pub compression: u16,
    pub orientation: Option<Orientation>,
    pub data: Vec<u8>,
}

/// Everything a DNG reader needs from a container written by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerContents {
    pub main_image: MainImage,
    pub dng_version: Option<Vec<u32>>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub unique_camera_model: Option<String>,
    pub software: Option<String>,
    pub date_time: Option<String>,
    pub date_time_original: Option<String>,
    pub orientation: Option<Orientation>,
    pub color_matrix: Option<Vec<f64>>,
    pub calibration_illuminant: Option<u32>,
    pub as_shot_neutral: Option<Vec<f64>>,
    pub profile_name: Option<String>,
    pub original_file_name: Option<String>,
    pub black_level: Option<Vec<u32>>,
    pub white_level: Option<Vec<u32>>,
    /// Previews in the order they were written
    pub previews: Vec<EmbeddedPreview>,
}

/// Parses a DNG container and recovers its main image, metadata and previews.
pub fn read_container(data: &[u8]) -> Result<ContainerContents> {
    let file = TiffFile::parse(data)?;
    if file.magic() != TIFF_MAGIC {
        return Err(malformed("not a DNG container"));
    }
    let root = file.first_directory()?;
    let ifd0 = &root.entries;

    let mut images = vec![root.entries.clone()];
    for offset in ifd0.u32s(ExtTag::SubIfds).unwrap_or_default() {
        images.push(file.directory_at(offset)?.entries);
    }

    let mut main_image = None;
    let mut previews = Vec::new();
    for image in &images {
        let subfile = image.u32(ExtTag::NewSubFileType).unwrap_or(SUBFILE_MAIN_IMAGE);
        if subfile == SUBFILE_MAIN_IMAGE {
            if main_image.is_some() {
                return Err(malformed("more than one main image"));
            }
            main_image = Some(read_main_image(&file, image)?);
        } else {
            previews.push(read_preview(&file, image)?);
        }
    }
    let main_image = main_image.ok_or_else(|| malformed("no main image directory"))?;

    let date_time_original = match ifd0.u32(ExtTag::ExifIfd) {
        Some(offset) => file
            .directory_at(offset)?
            .entries
            .ascii(ExtTag::DateTimeOriginal)
            .map(str::to_string),
        None => None,
    };

    // Per-image tags live with the main image.
    let main_dir = images
        .iter()
        .find(|d| d.u32(ExtTag::NewSubFileType).unwrap_or(SUBFILE_MAIN_IMAGE) == SUBFILE_MAIN_IMAGE)
        .unwrap_or(ifd0);

    Ok(ContainerContents {
        main_image,
        dng_version: ifd0.u32s(DngTag::DngVersion),
        make: ifd0.ascii(Tag::Make).map(str::to_string),
        model: ifd0.ascii(Tag::Model).map(str::to_string),
        unique_camera_model: ifd0.ascii(DngTag::UniqueCameraModel).map(str::to_string),
        software: ifd0.ascii(Tag::Software).map(str::to_string),
        date_time: ifd0.ascii(Tag::DateTime).map(str::to_string),
        date_time_original,
        orientation: ifd0
            .u32(ExtTag::Orientation)
            .and_then(|v| Orientation::from_tiff(v as u16)),
        color_matrix: ifd0.f64s(DngTag::ColorMatrix1),
        calibration_illuminant: ifd0.u32(DngTag::CalibrationIlluminant1),
        as_shot_neutral: ifd0.f64s(DngTag::AsShotNeutral),
        profile_name: ifd0.ascii(DngTag::ProfileName).map(str::to_string),
        original_file_name: ifd0.ascii(DngTag::OriginalRawFileName).map(str::to_string),
        black_level: main_dir.u32s(DngTag::BlackLevel),
        white_level: main_dir.u32s(DngTag::WhiteLevel),
        previews,
    })
}

fn dimensions(dir: &Directory) -> Result<(usize, usize)> {
    let width = dir.u32(Tag::ImageWidth).ok_or_else(|| malformed("missing ImageWidth"))? as usize;
    let height = dir.u32(Tag::ImageLength).ok_or_else(|| malformed("missing ImageLength"))? as usize;
    Ok((width, height))
}

fn read_main_image(file: &TiffFile<'_>, dir: &Directory) -> Result<MainImage> {
    let (width, height) = dimensions(dir)?;
    let samples_per_pixel = dir.u32(Tag::SamplesPerPixel).unwrap_or(1) as usize;
    let photometric = dir.u32(Tag::PhotometricInterpretation).unwrap_or(0) as u16;
    let bits = dir.u32s(Tag::BitsPerSample).unwrap_or_default();
    if bits.iter().any(|b| *b != 16) {
        return Err(malformed(format!("unsupported main image bit depth {:?}", bits)));
    }
    if dir.u32(Tag::Compression).unwrap_or(1) != 1 {
        return Err(malformed("compressed main image"));
    }

    let bytes = file.strip_data(dir)?;
    let expected = width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(samples_per_pixel))
        .and_then(|n| n.checked_mul(2))
        .ok_or_else(|| {
            malformed(format!(
                "main image size {}x{}x{} overflows",
                width, height, samples_per_pixel
            ))
        })?;
    if bytes.len() != expected {
        return Err(malformed(format!(
            "main image holds {} bytes, {}x{}x{} needs {}",
            bytes.len(),
            width,
            height,
            samples_per_pixel,
            expected
        )));
    }

    Ok(MainImage {
        width,
        height,
        samples_per_pixel,
        photometric,
        samples: file.samples_u16(&bytes),
    })
}

fn read_preview(file: &TiffFile<'_>, dir: &Directory) -> Result<EmbeddedPreview> {
    let (width, height) = dimensions(dir)?;
    Ok(EmbeddedPreview {
        width,
        height,
        compression: dir.u32(Tag::Compression).unwrap_or(1) as u16,
        orientation: dir
            .u32(ExtTag::Orientation)
            .and_then(|v| Orientation::from_tiff(v as u16)),
        data: file.strip_data(dir)?,
    })
}
