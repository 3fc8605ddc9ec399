//! Preview configuration and output types

use crate::dng_pipeline::negative::types::Orientation;

/// How a preview's pixels are stored in the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewEncoding {
    /// 8-bit interleaved RGB
    Uncompressed,
    /// Baseline JPEG at the given quality (1-100)
    Jpeg { quality: u8 },
}

/// Requested preview: a name, a bound on its longest side and an encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSpec {
    pub name: String,
    pub max_dimension: usize,
    pub encoding: PreviewEncoding,
}

impl PreviewSpec {
    pub fn new(name: impl Into<String>, max_dimension: usize, encoding: PreviewEncoding) -> Self {
        Self {
            name: name.into(),
            max_dimension,
            encoding,
        }
    }

    pub fn thumbnail() -> Self {
        Self::new("thumbnail", 256, PreviewEncoding::Uncompressed)
    }

    pub fn medium() -> Self {
        Self::new("medium", 1024, PreviewEncoding::Jpeg { quality: 90 })
    }
}

/// Encoded preview ready to be embedded
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub orientation: Orientation,
    pub encoding: PreviewEncoding,
    /// Interleaved RGB for `Uncompressed`, a JPEG stream otherwise
    pub data: Vec<u8>,
}
