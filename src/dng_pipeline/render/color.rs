//! 3x3 color matrix helpers.

use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::negative::types::ColorMatrix;

pub type Matrix3 = [[f32; 3]; 3];

/// Standard XYZ to sRGB D65 illuminant matrix
pub const XYZ_TO_SRGB: Matrix3 = [
    [ 3.2404542, -1.5371385, -0.4985314],
    [-0.9692660,  1.8760108,  0.0415560],
    [ 0.0556434, -0.2040259,  1.0572252],
];

/// Linear sRGB to XYZ, D65
pub const SRGB_TO_XYZ: Matrix3 = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.1191920, 0.9503041],
];

pub fn multiply(a: &Matrix3, b: &Matrix3) -> Matrix3 {
    let mut out = [[0.0f32; 3]; 3];
    for r in 0..3 {
        for c in 0..3 {
            out[r][c] = (0..3).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}

pub fn invert(m: &Matrix3) -> Option<Matrix3> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if det.abs() < 1e-8 || !det.is_finite() {
        return None;
    }
    let inv = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv,
        ],
    ])
}

/// Camera-native to linear sRGB.
///
/// Rows of the camera response to the sRGB primaries are normalized to one
/// so that a white-balanced neutral stays neutral after conversion.
pub fn camera_to_srgb(xyz_to_cam: &ColorMatrix) -> Result<Matrix3> {
    let mut cam_rgb = multiply(&xyz_to_cam.0, &SRGB_TO_XYZ);
    for row in cam_rgb.iter_mut() {
        let sum: f32 = row.iter().sum();
        if sum.abs() < 1e-8 || !sum.is_finite() {
            return Err(ConversionError::RenderError(
                "color matrix maps a camera channel to black".to_string(),
            ));
        }
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
    invert(&cam_rgb).ok_or_else(|| ConversionError::RenderError("color matrix is singular".to_string()))
}
