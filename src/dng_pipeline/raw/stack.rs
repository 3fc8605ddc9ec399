//! Merging of several equally-sized exposures into one stage-1 buffer.
//!
//! Used to build star-trail composites: every frame contributes through a
//! per-frame intensity, and frames are combined sample by sample.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::negative::types::PixelBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    /// Brightest sample wins
    Max,
    /// Saturating sum
    Add,
}

/// Per-frame intensity ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CometMode {
    /// Early frames bright, later frames fade out
    Falling,
    /// Early frames faint, later frames full strength
    Raising,
    Normal,
}

impl CometMode {
    pub fn intensity(self, index: usize, frame_count: usize) -> f32 {
        if frame_count == 0 {
            return 1.0;
        }
        match self {
            CometMode::Falling => 1.0 - index as f32 / frame_count as f32,
            CometMode::Raising => index as f32 / frame_count as f32,
            CometMode::Normal => 1.0,
        }
    }
}

/// Combines `frames` in order into a single buffer of the same geometry.
pub fn stack_frames(frames: Vec<PixelBuffer>, mode: StackMode, comet: CometMode) -> Result<PixelBuffer> {
    let frame_count = frames.len();
    let mut iter = frames.into_iter().enumerate();
    let (_, first) = iter
        .next()
        .ok_or_else(|| ConversionError::DimensionMismatch("no frames to stack".to_string()))?;

    let (width, height, spp) = (first.width(), first.height(), first.samples_per_pixel());
    info!("Stacking {} frame(s) of {}x{} with {:?}/{:?}", frame_count, width, height, mode, comet);

    let mut acc = first.into_data();
    scale(&mut acc, comet.intensity(0, frame_count));

    for (index, frame) in iter {
        if frame.width() != width || frame.height() != height || frame.samples_per_pixel() != spp {
            return Err(ConversionError::DimensionMismatch(format!(
                "frame {} is {}x{}x{}, expected {}x{}x{}",
                index,
                frame.width(),
                frame.height(),
                frame.samples_per_pixel(),
                width,
                height,
                spp
            )));
        }
        let intensity = comet.intensity(index, frame_count);
        debug!("Merging frame {} with intensity {:.3}", index, intensity);

        let frame = frame.into_data();
        acc.par_iter_mut().zip(frame.par_iter()).for_each(|(a, &b)| {
            let b = weighted(b, intensity);
            *a = match mode {
                StackMode::Max => (*a).max(b),
                StackMode::Add => a.saturating_add(b),
            };
        });
    }

    PixelBuffer::new(acc, width, height, spp)
}

fn scale(samples: &mut [u16], intensity: f32) {
    if intensity != 1.0 {
        samples.par_iter_mut().for_each(|v| *v = weighted(*v, intensity));
    }
}

#[inline]
fn weighted(value: u16, intensity: f32) -> u16 {
    (value as f32 * intensity).round().clamp(0.0, u16::MAX as f32) as u16
}
