//! Rendering module
//!
//! Turns a complete negative into a display-referred sRGB image used as the
//! source for embedded previews.

pub mod color;
pub mod demosaic;
mod renderer;
pub mod types;

pub use renderer::{CpuRenderer, ImageRenderer};
pub use types::RenderedImage;
