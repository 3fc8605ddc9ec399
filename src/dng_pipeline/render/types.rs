//! Types for rendering operations

/// 8-bit sRGB image rendered from a negative
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    /// Width of the image in pixels
    pub width: usize,
    /// Height of the image in pixels
    pub height: usize,
    /// RGB pixel data interleaved [R, G, B, R, G, B, ...]
    pub data: Vec<u8>,
}

impl RenderedImage {
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}
