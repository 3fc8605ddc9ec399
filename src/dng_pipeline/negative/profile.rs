//! External camera color profiles.
//!
//! A profile is a DNG camera profile (`.dcp`, "RC" magic) or any DNG/TIFF
//! whose first directory carries `ColorMatrix1`.

use std::path::Path;

use tracing::debug;

use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::container::reader::TiffFile;
use crate::dng_pipeline::container::tags::DngTag;
use crate::dng_pipeline::negative::types::{ColorMatrix, ILLUMINANT_D65};

#[derive(Debug, Clone, PartialEq)]
pub struct ColorProfile {
    pub name: Option<String>,
    pub color_matrix: ColorMatrix,
    pub calibration_illuminant: u16,
}

impl ColorProfile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            ConversionError::InputReadError(format!("{}: {}", path.display(), e))
        })?;
        let mut profile = Self::from_bytes(&data).map_err(|e| match e {
            ConversionError::DecodeError(msg) => {
                ConversionError::NegativeConstructionError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        if profile.name.is_none() {
            profile.name = path.file_stem().map(|s| s.to_string_lossy().into_owned());
        }
        Ok(profile)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let file = TiffFile::parse(data)?;
        let root = file.first_directory()?.entries;

        let values = root.f64s(DngTag::ColorMatrix1).ok_or_else(|| {
            ConversionError::NegativeConstructionError("profile has no ColorMatrix1".to_string())
        })?;
        let values: Vec<f32> = values.iter().map(|v| *v as f32).collect();
        let color_matrix = ColorMatrix::from_slice(&values).ok_or_else(|| {
            ConversionError::NegativeConstructionError(format!(
                "ColorMatrix1 has {} values, expected 9",
                values.len()
            ))
        })?;

        let calibration_illuminant = root
            .u32(DngTag::CalibrationIlluminant1)
            .map(|v| v as u16)
            .unwrap_or(ILLUMINANT_D65);
        let name = root
            .ascii(DngTag::ProfileName)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        debug!("Loaded color profile {:?} (illuminant {})", name, calibration_illuminant);

        Ok(Self {
            name,
            color_matrix,
            calibration_illuminant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dng_pipeline::container::directory::{Directory, SRational};
    use crate::dng_pipeline::container::layout::{ContainerLayout, DCP_MAGIC};

    fn dcp(with_matrix: bool) -> Vec<u8> {
        let mut layout = ContainerLayout::with_magic(DCP_MAGIC);
        let mut dir = Directory::new();
        if with_matrix {
            let m = [0.5f32, 0.25, 0.0, -0.1, 1.0, 0.1, 0.0, 0.0, 0.75];
            dir.add_tag(
                DngTag::ColorMatrix1,
                m.iter().map(|v| SRational::new_f32(*v, 10_000)).collect::<Vec<_>>(),
            );
        }
        dir.add_tag(DngTag::CalibrationIlluminant1, 17u16);
        dir.add_tag(DngTag::ProfileName, "Studio Standard");
        let offset = layout.write_directory(&dir).unwrap();
        layout.finish(offset).unwrap()
    }

    #[test]
    fn parses_camera_profile() {
        let profile = ColorProfile::from_bytes(&dcp(true)).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Studio Standard"));
        assert_eq!(profile.calibration_illuminant, 17);
        assert!((profile.color_matrix.0[1][0] - -0.1).abs() < 1e-4);
        assert!((profile.color_matrix.0[2][2] - 0.75).abs() < 1e-4);
    }

    #[test]
    fn profile_without_matrix_is_rejected() {
        let err = ColorProfile::from_bytes(&dcp(false)).unwrap_err();
        assert!(matches!(err, ConversionError::NegativeConstructionError(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = ColorProfile::load("/nonexistent/profile.dcp").unwrap_err();
        assert!(matches!(err, ConversionError::InputReadError(_)));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera.dcp");
        std::fs::write(&path, dcp(true)).unwrap();
        let profile = ColorProfile::load(&path).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Studio Standard"));
    }

    #[test]
    fn unparseable_profile_cannot_build_a_negative() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.dcp");
        std::fs::write(&path, b"not a profile").unwrap();
        let err = ColorProfile::load(&path).unwrap_err();
        assert!(matches!(err, ConversionError::NegativeConstructionError(_)));
    }
}
