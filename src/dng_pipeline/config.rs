//! DNG conversion configuration types

use crate::dng_pipeline::preview::PreviewSpec;

/// How the stage-1 image is stored in the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageOneEncoding {
    /// Sensor samples as decoded, CFA mosaic kept intact
    #[default]
    Original,
    /// Demosaiced to three samples per pixel, stored as LinearRaw
    Linearized,
}

/// Configuration for RAW to DNG conversion
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Stage-1 storage mode
    pub stage_one: StageOneEncoding,
    /// Previews to embed, in output order
    pub previews: Vec<PreviewSpec>,
    /// Whether to validate image dimensions before conversion
    pub validate_dimensions: bool,
    /// Largest accepted width or height when validation is enabled
    pub max_dimension: Option<usize>,
    /// Value of the Software tag
    pub software: String,
    /// Strip height of the stage-1 image; `None` picks strips of about 64 KiB
    pub rows_per_strip: Option<u32>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            stage_one: StageOneEncoding::Original,
            previews: vec![PreviewSpec::thumbnail(), PreviewSpec::medium()],
            validate_dimensions: true,
            max_dimension: Some(u16::MAX as usize),
            software: format!("raw2dng_rs {}", env!("CARGO_PKG_VERSION")),
            rows_per_strip: None,
        }
    }
}

impl ConversionConfig {
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder::default()
    }
}

/// Builder for ConversionConfig
#[derive(Default)]
pub struct ConversionConfigBuilder {
    stage_one: Option<StageOneEncoding>,
    previews: Option<Vec<PreviewSpec>>,
    validate_dimensions: Option<bool>,
    max_dimension: Option<Option<usize>>,
    software: Option<String>,
    rows_per_strip: Option<Option<u32>>,
}

impl ConversionConfigBuilder {
    pub fn stage_one(mut self, encoding: StageOneEncoding) -> Self {
        self.stage_one = Some(encoding);
        self
    }

    pub fn previews(mut self, previews: Vec<PreviewSpec>) -> Self {
        self.previews = Some(previews);
        self
    }

    pub fn validate_dimensions(mut self, validate: bool) -> Self {
        self.validate_dimensions = Some(validate);
        self
    }

    pub fn max_dimension(mut self, max: Option<usize>) -> Self {
        self.max_dimension = Some(max);
        self
    }

    pub fn software(mut self, software: impl Into<String>) -> Self {
        self.software = Some(software.into());
        self
    }

    pub fn rows_per_strip(mut self, rows: Option<u32>) -> Self {
        self.rows_per_strip = Some(rows);
        self
    }

    pub fn build(self) -> ConversionConfig {
        let default = ConversionConfig::default();
        ConversionConfig {
            stage_one: self.stage_one.unwrap_or(default.stage_one),
            previews: self.previews.unwrap_or(default.previews),
            validate_dimensions: self.validate_dimensions.unwrap_or(default.validate_dimensions),
            max_dimension: self.max_dimension.unwrap_or(default.max_dimension),
            software: self.software.unwrap_or(default.software),
            rows_per_strip: self.rows_per_strip.unwrap_or(default.rows_per_strip),
        }
    }
}
