//! Preview module
//!
//! Downsizes a rendered image into the ordered set of previews embedded in
//! the output container.

mod generator;
pub mod resample;
pub mod types;

pub use generator::PreviewGenerator;
pub use types::{Preview, PreviewEncoding, PreviewSpec};
