//! Preview generation from a rendered image.

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, RgbImage};
use tracing::{debug, info};

use super::resample::{downsample, fit_within};
use super::types::{Preview, PreviewEncoding, PreviewSpec};
use crate::dng_pipeline::common::error::{ConversionError, Result};
use crate::dng_pipeline::negative::types::Negative;
use crate::dng_pipeline::render::RenderedImage;

/// Produces the configured previews, in configuration order.
#[derive(Debug, Clone)]
pub struct PreviewGenerator {
    specs: Vec<PreviewSpec>,
}

impl PreviewGenerator {
    pub fn new(specs: Vec<PreviewSpec>) -> Self {
        Self { specs }
    }

    pub fn render_previews(&self, negative: &Negative, rendered: &RenderedImage) -> Result<Vec<Preview>> {
        let (_, metadata) = negative.require_complete()?;
        if rendered.width == 0 || rendered.height == 0 {
            return Err(ConversionError::PreviewError(format!(
                "rendered image is {}x{}",
                rendered.width, rendered.height
            )));
        }
        let source = to_rgb_image(rendered)?;

        let mut previews = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            if spec.max_dimension == 0 {
                return Err(ConversionError::PreviewError(format!(
                    "preview '{}' has a zero size bound",
                    spec.name
                )));
            }
            let bound = u32::try_from(spec.max_dimension).unwrap_or(u32::MAX);
            let (width, height) = fit_within(source.width(), source.height(), bound);
            debug!("Preview '{}': {}x{} {:?}", spec.name, width, height, spec.encoding);
            let pixels = downsample(&source, width, height);
            let data = match spec.encoding {
                PreviewEncoding::Uncompressed => pixels.into_raw(),
                PreviewEncoding::Jpeg { quality } => encode_jpeg(&pixels, quality)?,
            };
            previews.push(Preview {
                name: spec.name.clone(),
                width: width as usize,
                height: height as usize,
                orientation: metadata.orientation,
                encoding: spec.encoding,
                data,
            });
        }

        info!("Generated {} previews", previews.len());
        Ok(previews)
    }
}

fn to_rgb_image(rendered: &RenderedImage) -> Result<RgbImage> {
    let expected = rendered.width * rendered.height * 3;
    if rendered.data.len() != expected {
        return Err(ConversionError::PreviewError(format!(
            "rendered image holds {} bytes, expected {}",
            rendered.data.len(),
            expected
        )));
    }
    u32::try_from(rendered.width)
        .ok()
        .zip(u32::try_from(rendered.height).ok())
        .and_then(|(w, h)| RgbImage::from_raw(w, h, rendered.data.clone()))
        .ok_or_else(|| {
            ConversionError::PreviewError(format!(
                "rendered image {}x{} is too large",
                rendered.width, rendered.height
            ))
        })
}

fn encode_jpeg(pixels: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode(pixels.as_raw(), pixels.width(), pixels.height(), ExtendedColorType::Rgb8)
        .map_err(|e| ConversionError::PreviewError(format!("JPEG encoding failed: {}", e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dng_pipeline::negative::NegativeBuilder;
    use crate::dng_pipeline::negative::types::{ColorMatrix, Orientation, PixelBuffer};
    use crate::dng_pipeline::raw::{SourceMetadata, StaticMetadataSource};

    fn negative(w: usize, h: usize, orientation: Orientation) -> Negative {
        let source = StaticMetadataSource::new(SourceMetadata {
            color_matrix: Some(ColorMatrix::identity()),
            orientation,
            ..Default::default()
        });
        let pixels = PixelBuffer::mosaic(vec![0; w * h], w, h).unwrap();
        NegativeBuilder::new(&source).build_negative(None, pixels, w, h).unwrap()
    }

    fn rendered(w: usize, h: usize, value: u8) -> RenderedImage {
        RenderedImage {
            width: w,
            height: h,
            data: vec![value; w * h * 3],
        }
    }

    fn default_generator() -> PreviewGenerator {
        PreviewGenerator::new(vec![PreviewSpec::thumbnail(), PreviewSpec::medium()])
    }

    #[test]
    fn previews_follow_spec_order_and_size() {
        let neg = negative(2048, 1024, Orientation::Normal);
        let previews = default_generator().render_previews(&neg, &rendered(2048, 1024, 10)).unwrap();
        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].name, "thumbnail");
        assert_eq!((previews[0].width, previews[0].height), (256, 128));
        assert_eq!(previews[0].data.len(), 256 * 128 * 3);
        assert!(previews[0].data.iter().all(|&v| v == 10));
        assert_eq!(previews[1].name, "medium");
        assert_eq!((previews[1].width, previews[1].height), (1024, 512));
        assert_eq!(&previews[1].data[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn uneven_ratio_fills_the_whole_thumbnail() {
        let neg = negative(2000, 1000, Orientation::Normal);
        let generator = PreviewGenerator::new(vec![PreviewSpec::thumbnail()]);
        let previews = generator.render_previews(&neg, &rendered(2000, 1000, 200)).unwrap();
        assert_eq!((previews[0].width, previews[0].height), (256, 128));
        assert_eq!(previews[0].data.len(), 256 * 128 * 3);
        assert!(previews[0].data.iter().all(|&v| (199..=200).contains(&v)));
    }

    #[test]
    fn previews_carry_negative_orientation() {
        let neg = negative(64, 64, Orientation::Rotate90);
        let previews = default_generator().render_previews(&neg, &rendered(64, 64, 0)).unwrap();
        assert!(previews.iter().all(|p| p.orientation == Orientation::Rotate90));
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let neg = negative(100, 100, Orientation::Normal);
        let previews = default_generator().render_previews(&neg, &rendered(100, 100, 0)).unwrap();
        assert!(previews.iter().all(|p| (p.width, p.height) == (100, 100)));
    }

    #[test]
    fn zero_sized_render_is_a_preview_error() {
        let neg = negative(10, 10, Orientation::Normal);
        let err = default_generator().render_previews(&neg, &rendered(0, 10, 0)).unwrap_err();
        assert!(matches!(err, ConversionError::PreviewError(_)));
        let err = default_generator().render_previews(&neg, &rendered(10, 0, 0)).unwrap_err();
        assert!(matches!(err, ConversionError::PreviewError(_)));
    }

    #[test]
    fn empty_negative_is_not_ready() {
        let err = default_generator()
            .render_previews(&Negative::empty(), &rendered(10, 10, 0))
            .unwrap_err();
        assert!(matches!(err, ConversionError::NegativeNotReady));
    }

    #[test]
    fn generation_is_deterministic() {
        let neg = negative(300, 200, Orientation::Normal);
        let img = RenderedImage {
            width: 300,
            height: 200,
            data: (0..300 * 200 * 3).map(|i| (i % 251) as u8).collect(),
        };
        let a = default_generator().render_previews(&neg, &img).unwrap();
        let b = default_generator().render_previews(&neg, &img).unwrap();
        assert_eq!(a, b);
    }
}
