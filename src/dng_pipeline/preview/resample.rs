//! Preview sizing and area-averaged downsampling.

use image::RgbImage;
use image::imageops;

/// Output size fitting the longest side into `max_dimension`.
///
/// Images already small enough keep their size. Neither axis collapses to
/// zero.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = |v: u32| {
        let scaled = (u64::from(v) * u64::from(max_dimension) + u64::from(longest) / 2) / u64::from(longest);
        (scaled as u32).max(1)
    };
    (scale(width), scale(height))
}

/// Shrinks `image` to `width` x `height` by area averaging.
pub fn downsample(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::thumbnail(image, width, height)
}
