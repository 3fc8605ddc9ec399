use std::path::Path;

use tracing::{debug, info, instrument};

use crate::dng_pipeline::{
    common::error::{ConversionError, Result},
    common::runtime,
    config::ConversionConfig,
    container::{ContainerWriter, DngWriter},
    conversions::timing::{PipelineTimings, Stage},
    negative::{NegativeBuilder, PixelBuffer},
    preview::PreviewGenerator,
    raw::{MetadataSource, RawLoaderSource},
    render::{CpuRenderer, ImageRenderer},
};

/// Straight-line conversion: build the negative, render it, derive the
/// previews and write the container.
pub struct RawToDngPipeline<R: ImageRenderer, W: ContainerWriter> {
    renderer: R,
    writer: W,
    config: ConversionConfig,
}

impl RawToDngPipeline<CpuRenderer, DngWriter> {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            renderer: CpuRenderer,
            writer: DngWriter,
            config,
        }
    }
}

impl<R: ImageRenderer, W: ContainerWriter> RawToDngPipeline<R, W> {
    pub fn with_custom(renderer: R, writer: W, config: ConversionConfig) -> Self {
        Self {
            renderer,
            writer,
            config,
        }
    }

    fn validate_dimensions(&self, width: usize, height: usize) -> Result<()> {
        if !self.config.validate_dimensions {
            return Ok(());
        }

        if width == 0 || height == 0 {
            return Err(ConversionError::DimensionMismatch(format!(
                "{}x{} has a zero axis",
                width, height
            )));
        }

        if let Some(max_dim) = self.config.max_dimension {
            if width > max_dim || height > max_dim {
                return Err(ConversionError::DimensionMismatch(format!(
                    "{}x{} exceeds the {} pixel limit",
                    width, height, max_dim
                )));
            }
        }

        Ok(())
    }

    /// Converts `pixels` into a DNG at `destination`.
    ///
    /// `width` and `height` must describe `pixels`; the color transform comes
    /// from `color_profile` when given, from `source` otherwise.
    pub fn convert(
        &self,
        source: &dyn MetadataSource,
        pixels: PixelBuffer,
        width: usize,
        height: usize,
        color_profile: Option<&Path>,
        destination: &Path,
    ) -> Result<()> {
        self.convert_with_timings(source, pixels, width, height, color_profile, destination)
            .map(|timings| {
                debug!(
                    "Pipeline finished in {:.3}ms",
                    timings.total().as_secs_f64() * 1000.0
                );
            })
    }

    #[instrument(
        skip(self, source, pixels, color_profile, destination),
        fields(output = %destination.display())
    )]
    pub fn convert_with_timings(
        &self,
        source: &dyn MetadataSource,
        pixels: PixelBuffer,
        width: usize,
        height: usize,
        color_profile: Option<&Path>,
        destination: &Path,
    ) -> Result<PipelineTimings> {
        info!("Starting RAW to DNG conversion");
        runtime::initialize();
        let mut timings = PipelineTimings::new();

        timings.time(Stage::ValidateDimensions, || {
            let _span = tracing::info_span!("validate_dimensions", width, height).entered();
            self.validate_dimensions(width, height)
        })?;

        let negative = timings.time(Stage::BuildNegative, || {
            let _span = tracing::info_span!("build_negative").entered();
            NegativeBuilder::new(source).build_negative(color_profile, pixels, width, height)
        })?;

        let previews = if self.config.previews.is_empty() {
            debug!("No previews configured, skipping render");
            Vec::new()
        } else {
            let rendered = timings.time(Stage::RenderImage, || {
                let _span = tracing::info_span!("render_image").entered();
                self.renderer.render_image(&negative)
            })?;
            timings.time(Stage::RenderPreviews, || {
                let _span = tracing::info_span!("render_previews", count = self.config.previews.len()).entered();
                PreviewGenerator::new(self.config.previews.clone()).render_previews(&negative, &rendered)
            })?
        };

        timings.time(Stage::WriteContainer, || {
            let _span = tracing::info_span!("write_container").entered();
            self.writer
                .write_container(&negative, &previews, destination, &self.config)
        })?;

        info!(width, height, previews = previews.len(), "Conversion complete");
        timings.log_summary();
        Ok(timings)
    }

    /// Boundary entry point: metadata comes from the raw file at
    /// `raw_source_path`, pixels from the caller.
    ///
    /// An unreadable raw source fails the conversion before anything is
    /// written.
    #[instrument(skip(self, pixel_data, raw_source_path, color_profile_path, destination_path))]
    pub fn convert_file(
        &self,
        pixel_data: Vec<u16>,
        width: usize,
        height: usize,
        raw_source_path: &Path,
        color_profile_path: Option<&Path>,
        destination_path: &Path,
    ) -> Result<()> {
        info!(
            input = %raw_source_path.display(),
            output = %destination_path.display(),
            "Converting file"
        );

        let source = {
            let _span = tracing::info_span!("read_raw_source").entered();
            RawLoaderSource::open(raw_source_path)?
        };
        let pixels = PixelBuffer::mosaic(pixel_data, width, height)?;

        self.convert(&source, pixels, width, height, color_profile_path, destination_path)
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ConversionConfig) {
        self.config = config;
    }
}
