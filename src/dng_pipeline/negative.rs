//! Digital negative module
//!
//! The negative couples the stage-1 sensor image with the camera metadata
//! needed to render and serialize it.

mod builder;
pub mod profile;
pub mod types;

pub use builder::NegativeBuilder;
pub use profile::ColorProfile;
pub use types::{CameraMetadata, CfaPattern, ColorMatrix, Geometry, Negative, Orientation, PixelBuffer};
