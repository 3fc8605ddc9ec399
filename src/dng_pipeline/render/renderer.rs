//! Stage-1 to sRGB rendering.

use rayon::prelude::*;
use tracing::{debug, info};

use super::color::camera_to_srgb;
use super::demosaic::demosaic;
use super::types::RenderedImage;
use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::common::runtime::srgb_table;
use crate::dng_pipeline::negative::types::Negative;

/// Produces the display-referred rendition of a negative.
pub trait ImageRenderer {
    fn render_image(&self, negative: &Negative) -> Result<RenderedImage>;
}

/// Renderer running entirely on the CPU.
///
/// Black and white levels are normalized out, the as-shot white balance is
/// applied, the negative's color matrix maps camera space to linear sRGB and
/// the result is clamped and gamma encoded to 8 bits.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuRenderer;

impl CpuRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ImageRenderer for CpuRenderer {
    fn render_image(&self, negative: &Negative) -> Result<RenderedImage> {
        let (image, metadata) = negative.require_complete().map_err(|_| {
            ConversionError::RenderError("negative has no stage-1 image to render".to_string())
        })?;
        let width = image.width();
        let height = image.height();
        info!("Rendering {}x{} negative", width, height);

        let rgb: Vec<u16> = match image.samples_per_pixel() {
            1 => demosaic(image, metadata.cfa)?,
            3 => image.data().to_vec(),
            n => {
                return Err(ConversionError::RenderError(format!(
                    "cannot render {} samples per pixel",
                    n
                )));
            }
        };

        let cam_to_srgb = camera_to_srgb(&metadata.color_matrix)?;
        let black = metadata.black_level as f32;
        let range = metadata.white_level as f32 - black;
        if range <= 0.0 {
            return Err(ConversionError::RenderError(format!(
                "white level {} is not above black level {}",
                metadata.white_level, metadata.black_level
            )));
        }
        let wb = metadata.white_balance;
        debug!(?wb, ?cam_to_srgb, black, range, "Color pipeline parameters");

        let table = srgb_table();
        let mut data = vec![0u8; width * height * 3];
        data.par_chunks_exact_mut(3)
            .zip(rgb.par_chunks_exact(3))
            .for_each(|(out, px)| {
                let mut cam = [0.0f32; 3];
                for c in 0..3 {
                    cam[c] = ((px[c] as f32 - black).max(0.0) / range) * wb[c];
                }
                for r in 0..3 {
                    let v = cam_to_srgb[r][0] * cam[0]
                        + cam_to_srgb[r][1] * cam[1]
                        + cam_to_srgb[r][2] * cam[2];
                    let linear = (v.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16;
                    out[r] = table.encode(linear);
                }
            });

        Ok(RenderedImage { width, height, data })
    }
}
