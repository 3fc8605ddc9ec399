//! Bilinear demosaicing of single-sample CFA buffers.

use std::io::Cursor;

use bayer::{BayerDepth, CFA, Demosaic, RasterDepth, RasterMut};
use tracing::debug;

use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::negative::types::{CfaPattern, PixelBuffer};

fn bayer_cfa(pattern: CfaPattern) -> CFA {
    match pattern {
        CfaPattern::Rggb => CFA::RGGB,
        CfaPattern::Bggr => CFA::BGGR,
        CfaPattern::Grbg => CFA::GRBG,
        CfaPattern::Gbrg => CFA::GBRG,
    }
}

/// Interpolates a mosaic into interleaved RGB samples at the same bit depth.
///
/// Sample values are not rescaled, so black and white levels carry over.
pub fn demosaic(image: &PixelBuffer, pattern: CfaPattern) -> Result<Vec<u16>> {
    if image.samples_per_pixel() != 1 {
        return Err(ConversionError::RenderError(format!(
            "demosaicing needs a single-sample mosaic, got {} samples per pixel",
            image.samples_per_pixel()
        )));
    }
    let width = image.width();
    let height = image.height();
    debug!("Demosaicing {}x{} {:?} mosaic", width, height, pattern);
    if width < 2 || height < 2 {
        return Ok(demosaic_strip(image.data(), width, height, pattern));
    }

    let bayer_bytes: Vec<u8> = image.data().iter().flat_map(|&val| val.to_le_bytes()).collect();
    let mut output_buf = vec![0u8; width * height * 3 * 2];

    {
        let mut output_raster = RasterMut::new(width, height, RasterDepth::Depth16, &mut output_buf);
        bayer::run_demosaic(
            &mut Cursor::new(&bayer_bytes[..]),
            BayerDepth::Depth16LE,
            bayer_cfa(pattern),
            Demosaic::Linear,
            &mut output_raster,
        )
        .map_err(|e| ConversionError::RenderError(format!("Demosaic failed: {:?}", e)))?;
    }

    // The 16-bit raster is stored in native byte order.
    Ok(output_buf
        .chunks_exact(2)
        .map(|b| u16::from_ne_bytes([b[0], b[1]]))
        .collect())
}

/// Mosaics one photosite wide or tall hold at most two colors, which the
/// bilinear kernel cannot handle. Each channel averages the matching sites
/// among the pixel and its neighbors; a channel with no such site takes the
/// pixel's own value.
fn demosaic_strip(data: &[u16], width: usize, height: usize, pattern: CfaPattern) -> Vec<u16> {
    let mut rgb = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let mut sum = [0u32; 3];
            let mut count = [0u32; 3];
            for ny in y.saturating_sub(1)..(y + 2).min(height) {
                for nx in x.saturating_sub(1)..(x + 2).min(width) {
                    let c = pattern.color_at(nx, ny);
                    sum[c] += u32::from(data[ny * width + nx]);
                    count[c] += 1;
                }
            }
            let own = data[y * width + x];
            rgb.extend((0..3).map(|c| {
                if count[c] == 0 {
                    own
                } else {
                    ((sum[c] + count[c] / 2) / count[c]) as u16
                }
            }));
        }
    }
    rgb
}
