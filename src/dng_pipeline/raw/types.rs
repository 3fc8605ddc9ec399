//! RAW source metadata types

use crate::dng_pipeline::negative::types::{CfaPattern, ColorMatrix, Orientation};
use crate::dng_pipeline::negative::profile::ColorProfile;

/// Everything a metadata source could extract from a raw capture.
///
/// Fields a source cannot supply are `None`; the negative builder decides
/// which of them are required.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMetadata {
    pub make: Option<String>,
    pub model: Option<String>,
    /// EXIF `YYYY:MM:DD HH:MM:SS`
    pub capture_time: Option<String>,
    pub orientation: Orientation,
    /// As-shot red, green, blue multipliers
    pub white_balance: Option<[f32; 3]>,
    /// XYZ to camera matrix
    pub color_matrix: Option<ColorMatrix>,
    pub black_level: u16,
    pub white_level: u16,
    pub cfa: CfaPattern,
    /// Sensor geometry as stored in the raw file
    pub dimensions: Option<(usize, usize)>,
    pub file_name: Option<String>,
    /// Profile shipped inside the raw container, if any
    pub embedded_profile: Option<ColorProfile>,
}

impl Default for SourceMetadata {
    fn default() -> Self {
        Self {
            make: None,
            model: None,
            capture_time: None,
            orientation: Orientation::Normal,
            white_balance: None,
            color_matrix: None,
            black_level: 0,
            white_level: u16::MAX,
            cfa: CfaPattern::Rggb,
            dimensions: None,
            file_name: None,
            embedded_profile: None,
        }
    }
}
