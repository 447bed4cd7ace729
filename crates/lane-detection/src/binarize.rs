//! Binarization primitives shared by the line search stages

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::map::{map_colors, map_colors2};

use crate::config::AdaptiveThresholdConfig;

/// Value of an "on" pixel in every binary image of the pipeline
pub const ON: u8 = 255;

/// Gaussian adaptive threshold: a pixel is on when it is brighter than its
/// Gaussian-weighted neighbourhood mean minus `offset`.
pub fn adaptive_threshold(image: &GrayImage, config: &AdaptiveThresholdConfig) -> GrayImage {
    let mean = gaussian_blur_f32(image, config.sigma());
    map_colors2(image, &mean, |src, mean| {
        let on = f32::from(src[0]) > f32::from(mean[0]) - config.offset;
        Luma([if on { ON } else { 0 }])
    })
}

/// Pixels above `level` go to 0, everything else to [`ON`]
pub fn threshold_inverted(image: &GrayImage, level: u8) -> GrayImage {
    map_colors(image, |p| Luma([if p[0] > level { 0 } else { ON }]))
}

/// Pixel-wise bitwise AND
pub fn conjunction(a: &GrayImage, b: &GrayImage) -> GrayImage {
    map_colors2(a, b, |p, q| Luma([p[0] & q[0]]))
}

/// Coordinates of every non-zero pixel, row-major
pub fn lit_pixels(image: &GrayImage) -> impl Iterator<Item = (u32, u32)> + '_ {
    image
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] != 0)
        .map(|(x, y, _)| (x, y))
}
