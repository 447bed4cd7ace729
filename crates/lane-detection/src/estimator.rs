//! Robust line estimator
//!
//! Reduces a candidate-line image to a single polar line: marker pixels are
//! sampled along fixed strata, a Huber line is fitted through them, the fit
//! is rendered, and the strongest Hough line of that rendering becomes the
//! estimate.

use std::f32::consts::PI;

use image::{GrayImage, Luma};
use nalgebra::Point2;
use tracing::debug;

use crate::binarize::ON;
use crate::config::{EstimatorConfig, LaneConfig};
use crate::draw::draw_thick_segment;
use crate::fit::{fit_line_huber, FittedLine};
use crate::hough::{HoughAccumulator, PolarLine};
use crate::search::adaptive_line_search;

/// Best-fit polar line of one side in one frame, if any
pub type LaneEstimate = Option<PolarLine>;

/// Collect marker pixels along `strata` sampling lines.
///
/// Stratum `i` sits at offset `(i + 1) * (height / strata)`, measured along
/// x, and is scanned over y for as many pixels as the image is wide.
/// Positions falling outside the image are skipped. At most `height`
/// strata are used, so no two strata share a column.
pub fn sample_strata(candidates: &GrayImage, strata: u32) -> Vec<Point2<f64>> {
    let (width, height) = candidates.dimensions();
    let strata = strata.min(height);
    if strata == 0 {
        return Vec::new();
    }
    let spacing = height / strata;

    let mut samples = Vec::new();
    for i in 0..strata {
        let x = (i + 1) * spacing;
        if x >= width {
            continue;
        }
        for y in 0..width.min(height) {
            if candidates.get_pixel(x, y)[0] == ON {
                samples.push(Point2::new(f64::from(x), f64::from(y)));
            }
        }
    }
    samples
}

/// Render `fit` across a blank image, extended one image width each way
pub fn render_best_fit(size: (u32, u32), fit: &FittedLine, thickness: u32) -> GrayImage {
    let mut image = GrayImage::new(size.0, size.1);
    let (start, end) = fit.endpoints(f64::from(size.0));
    draw_thick_segment(
        &mut image,
        (start.x as f32, start.y as f32),
        (end.x as f32, end.y as f32),
        thickness,
        Luma([ON]),
    );
    image
}

/// Strata sampling plus robust fit
#[derive(Debug, Clone)]
pub struct RobustLineEstimator {
    config: EstimatorConfig,
    rho_resolution: f32,
    theta_resolution: f32,
}

impl RobustLineEstimator {
    pub fn new(config: &LaneConfig) -> Self {
        Self {
            config: config.estimator,
            rho_resolution: config.search.rho_resolution,
            theta_resolution: config.search.theta_resolution_deg.to_radians().min(PI),
        }
    }

    /// Estimate the marker line in a candidate image
    pub fn estimate(&self, candidates: &GrayImage) -> LaneEstimate {
        let samples = sample_strata(candidates, self.config.strata);
        if samples.is_empty() {
            debug!("No marker pixels on any stratum");
            return None;
        }

        let fit = fit_line_huber(&samples, &self.config.huber)?;
        let best_fit = render_best_fit(candidates.dimensions(), &fit, self.config.line_thickness);

        let accumulator = HoughAccumulator::build(&best_fit, self.rho_resolution, self.theta_resolution);
        let outcome = adaptive_line_search(&accumulator, &self.config.votes);
        let estimate = outcome.lines.first().copied();
        debug!(
            "{} samples -> direction ({:.3}, {:.3}), estimate {:?}",
            samples.len(),
            fit.direction.x,
            fit.direction.y,
            estimate
        );
        estimate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strata_offsets_run_along_x() {
        let mut image = GrayImage::new(100, 60);
        // strata at x = 20, 40, 60
        image.put_pixel(40, 10, Luma([ON]));
        image.put_pixel(40, 59, Luma([ON]));
        image.put_pixel(10, 40, Luma([ON]));
        image.put_pixel(41, 10, Luma([ON]));
        image.put_pixel(60, 5, Luma([128]));

        let samples = sample_strata(&image, 3);
        assert_eq!(samples, vec![Point2::new(40.0, 10.0), Point2::new(40.0, 59.0)]);
    }

    #[test]
    fn test_strata_beyond_width_are_skipped() {
        let image = GrayImage::from_pixel(50, 100, Luma([ON]));
        let samples = sample_strata(&image, 4);
        // spacing 25: x = 25 is in bounds, 50 / 75 / 100 are not; scan covers y < 50
        assert_eq!(samples.len(), 50);
        assert!(samples.iter().all(|p| p.x == 25.0 && p.y < 50.0));
    }

    #[test]
    fn test_more_strata_than_rows() {
        let image = GrayImage::from_pixel(10, 5, Luma([ON]));
        let samples = sample_strata(&image, 30);

        // clamped to 5 strata at x = 1..=5, each scanned over y < 5
        assert_eq!(samples.len(), 25);
        assert!(samples.iter().all(|p| (1.0..=5.0).contains(&p.x)));
        let mut unique: Vec<(u64, u64)> = samples.iter().map(|p| (p.x as u64, p.y as u64)).collect();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), samples.len());
    }

    #[test]
    fn test_empty_candidates_give_no_estimate() {
        let estimator = RobustLineEstimator::new(&LaneConfig::default());
        assert!(estimator.estimate(&GrayImage::new(120, 90)).is_none());
    }

    #[test]
    fn test_diagonal_line_angle() {
        let mut image = GrayImage::new(300, 300);
        for i in 0..300 {
            image.put_pixel(i, i, Luma([ON]));
        }

        let estimator = RobustLineEstimator::new(&LaneConfig::default());
        let line = estimator.estimate(&image).unwrap();

        // the line y = x has its normal at 135 degrees through the origin
        assert!((line.theta_degrees() - 135.0).abs() <= 3.0, "theta {}", line.theta_degrees());
        assert!(line.rho.abs() <= 6.0, "rho {}", line.rho);
    }

    #[test]
    fn test_render_best_fit_spans_image() {
        let fit = FittedLine {
            direction: nalgebra::Vector2::new(0.0, 1.0),
            point: Point2::new(30.0, 40.0),
        };
        let image = render_best_fit((60, 80), &fit, 8);
        assert_eq!(image.get_pixel(30, 0)[0], ON);
        assert_eq!(image.get_pixel(30, 79)[0], ON);
        assert_eq!(image.get_pixel(5, 40)[0], 0);
    }
}
