//! Hough line transforms
//!
//! Two flavours are provided:
//! - [`HoughAccumulator`]: the standard (ρ, θ) transform. The accumulator is
//!   filled once per image and peaks can then be extracted at any vote
//!   threshold, which keeps the adaptive vote search cheap.
//! - [`detect_segments`]: the progressive probabilistic transform, returning
//!   finite segments bounded by a minimum length and a maximum gap.
//!
//! Angles are in radians with θ ∈ [0, π). Pixel coordinates follow the image
//! convention (x to the right, y down).

use std::cmp::Reverse;
use std::f32::consts::PI;

use image::GrayImage;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::binarize::lit_pixels;

/// A line in normal form: `x·cos θ + y·sin θ = ρ`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarLine {
    /// Signed distance from the image origin (pixels)
    pub rho: f32,
    /// Normal angle (radians)
    pub theta: f32,
}

impl PolarLine {
    pub fn new(rho: f32, theta: f32) -> Self {
        Self { rho, theta }
    }

    pub fn theta_degrees(&self) -> f32 {
        self.theta.to_degrees()
    }

    /// Column at which the line crosses row `y`; `None` for a horizontal line
    pub fn x_at_row(&self, y: f32) -> Option<f32> {
        let cos = self.theta.cos();
        if cos.abs() < 1e-6 {
            return None;
        }
        let x = (self.rho - y * self.theta.sin()) / cos;
        x.is_finite().then_some(x)
    }

    /// Crossings with the first row and with row `rows`
    pub fn row_intersections(&self, rows: u32) -> Option<[(f32, f32); 2]> {
        let bottom = rows as f32;
        Some([(self.x_at_row(0.0)?, 0.0), (self.x_at_row(bottom)?, bottom)])
    }
}

/// A finite segment between two pixel positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSegment {
    pub start: (i32, i32),
    pub end: (i32, i32),
}

impl LineSegment {
    /// Direction from `end` to `start`, in degrees within [-180, 180]
    pub fn angle_degrees(&self) -> f32 {
        let dy = (self.start.1 - self.end.1) as f32;
        let dx = (self.start.0 - self.end.0) as f32;
        dy.atan2(dx).to_degrees()
    }
}

/// Precomputed accumulator geometry
#[derive(Debug, Clone)]
struct HoughSpace {
    num_rho: usize,
    rho_resolution: f32,
    theta_resolution: f32,
    /// (cos θ / Δρ, sin θ / Δρ) per angle bin
    trig: Vec<(f32, f32)>,
}

impl HoughSpace {
    fn new(width: u32, height: u32, rho_resolution: f32, theta_resolution: f32) -> Self {
        let rho_resolution = rho_resolution.max(f32::EPSILON);
        let theta_resolution = theta_resolution.max(f32::EPSILON);
        let num_angle = ((PI / theta_resolution).round() as usize).max(1);
        let num_rho = ((((width + height) * 2 + 1) as f32 / rho_resolution).round() as usize).max(1);
        let trig = (0..num_angle)
            .map(|n| {
                let angle = n as f32 * theta_resolution;
                (angle.cos() / rho_resolution, angle.sin() / rho_resolution)
            })
            .collect();

        Self {
            num_rho,
            rho_resolution,
            theta_resolution,
            trig,
        }
    }

    fn num_angle(&self) -> usize {
        self.trig.len()
    }

    /// Accumulator column of pixel (x, y) for angle bin `n`
    fn rho_index(&self, n: usize, x: u32, y: u32) -> usize {
        let (c, s) = self.trig[n];
        let r = (x as f32 * c + y as f32 * s).round() as i64 + (self.num_rho as i64 - 1) / 2;
        r.clamp(0, self.num_rho as i64 - 1) as usize
    }

    fn line(&self, n: usize, r: usize) -> PolarLine {
        PolarLine {
            rho: (r as f32 - (self.num_rho as f32 - 1.0) * 0.5) * self.rho_resolution,
            theta: n as f32 * self.theta_resolution,
        }
    }
}

/// Standard Hough accumulator over the non-zero pixels of a binary image
#[derive(Debug, Clone)]
pub struct HoughAccumulator {
    space: HoughSpace,
    votes: Array2<u32>,
}

impl HoughAccumulator {
    pub fn build(image: &GrayImage, rho_resolution: f32, theta_resolution: f32) -> Self {
        let (width, height) = image.dimensions();
        let space = HoughSpace::new(width, height, rho_resolution, theta_resolution);
        let mut votes = Array2::zeros((space.num_angle(), space.num_rho));

        for (x, y) in lit_pixels(image) {
            for n in 0..space.num_angle() {
                votes[[n, space.rho_index(n, x, y)]] += 1;
            }
        }

        Self { space, votes }
    }

    /// Highest vote count in the accumulator
    pub fn max_votes(&self) -> u32 {
        self.votes.iter().copied().max().unwrap_or(0)
    }

    /// Local maxima with more than `threshold` votes, strongest first.
    ///
    /// A bin is a peak when it beats its lower ρ / θ neighbours and is not
    /// beaten by its upper ones, so plateaus yield a single line.
    pub fn lines(&self, threshold: u32) -> Vec<PolarLine> {
        let votes = &self.votes;
        let at = |n: usize, r: usize| votes.get((n, r)).copied().unwrap_or(0);

        let mut peaks: Vec<(u32, usize, usize)> = Vec::new();
        for ((n, r), &v) in votes.indexed_iter() {
            if v <= threshold {
                continue;
            }
            let below_r = if r > 0 { at(n, r - 1) } else { 0 };
            let below_n = if n > 0 { at(n - 1, r) } else { 0 };
            if v > below_r && v >= at(n, r + 1) && v > below_n && v >= at(n + 1, r) {
                peaks.push((v, n, r));
            }
        }

        peaks.sort_by_key(|&(v, n, r)| (Reverse(v), n, r));
        peaks.into_iter().map(|(_, n, r)| self.space.line(n, r)).collect()
    }
}

/// Parameters of the probabilistic segment transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentParams {
    pub rho_resolution: f32,
    pub theta_resolution: f32,
    /// Minimum votes on the dominant line through a pixel
    pub threshold: u32,
    /// Minimum extent along x or y for a segment to be kept
    pub min_length: f32,
    /// Maximum run of missing pixels bridged inside a segment
    pub max_gap: u32,
    /// Seed of the pixel visiting order
    pub seed: u64,
}

/// Progressive probabilistic Hough transform.
///
/// Pixels are visited in a seeded random order. Each one votes; once a line
/// through it collects `threshold` votes, the corridor along that line is
/// walked in both directions (bridging up to `max_gap` missing pixels), the
/// pixels on it are consumed, and the segment is kept if long enough.
pub fn detect_segments(image: &GrayImage, params: &SegmentParams) -> Vec<LineSegment> {
    let (width, height) = image.dimensions();
    let space = HoughSpace::new(width, height, params.rho_resolution, params.theta_resolution);
    let threshold = params.threshold.max(1) as i32;

    let mut accumulator: Array2<i32> = Array2::zeros((space.num_angle(), space.num_rho));
    let mut mask: Array2<bool> = Array2::from_elem((height as usize, width as usize), false);
    let mut points: Vec<(u32, u32)> = lit_pixels(image).collect();
    for &(x, y) in &points {
        mask[[y as usize, x as usize]] = true;
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    points.shuffle(&mut rng);

    let mut segments = Vec::new();
    for (x, y) in points {
        if !mask[[y as usize, x as usize]] {
            continue;
        }

        let mut max_val = threshold - 1;
        let mut max_n = 0;
        for n in 0..space.num_angle() {
            let cell = &mut accumulator[[n, space.rho_index(n, x, y)]];
            *cell += 1;
            if *cell > max_val {
                max_val = *cell;
                max_n = n;
            }
        }
        if max_val < threshold {
            continue;
        }

        let walker = CorridorWalk::new(&space, max_n, x, y);
        let mut ends = [(x as i64, y as i64); 2];
        for (k, end) in ends.iter_mut().enumerate() {
            let mut gap = 0;
            for (px, py) in walker.steps(k == 1, width, height) {
                if mask[[py as usize, px as usize]] {
                    gap = 0;
                    *end = (px, py);
                } else {
                    gap += 1;
                    if gap > params.max_gap {
                        break;
                    }
                }
            }
        }

        let good = (ends[1].0 - ends[0].0).abs() as f32 >= params.min_length
            || (ends[1].1 - ends[0].1).abs() as f32 >= params.min_length;

        for (k, end) in ends.iter().enumerate() {
            for (px, py) in walker.steps(k == 1, width, height) {
                let cell = &mut mask[[py as usize, px as usize]];
                if *cell {
                    if good {
                        for n in 0..space.num_angle() {
                            accumulator[[n, space.rho_index(n, px as u32, py as u32)]] -= 1;
                        }
                    }
                    *cell = false;
                }
                if (px, py) == *end {
                    break;
                }
            }
        }

        if good {
            segments.push(LineSegment {
                start: (ends[0].0 as i32, ends[0].1 as i32),
                end: (ends[1].0 as i32, ends[1].1 as i32),
            });
        }
    }

    segments
}

/// Pixel stepping along the line through a seed pixel, one pixel per step
/// along the dominant axis.
struct CorridorWalk {
    origin: (f64, f64),
    step: (f64, f64),
    x_major: bool,
}

impl CorridorWalk {
    fn new(space: &HoughSpace, n: usize, x: u32, y: u32) -> Self {
        let (c, s) = space.trig[n];
        let (a, b) = (-f64::from(s), f64::from(c));
        let (x, y) = (f64::from(x), f64::from(y));

        if a.abs() > b.abs() {
            Self {
                origin: (x, y + 0.5),
                step: (a.signum(), b / a.abs()),
                x_major: true,
            }
        } else {
            Self {
                origin: (x + 0.5, y),
                step: (a / b.abs(), b.signum()),
                x_major: false,
            }
        }
    }

    /// In-bounds pixels from the seed outward, stopping at the image border
    fn steps(&self, reverse: bool, width: u32, height: u32) -> impl Iterator<Item = (i64, i64)> + '_ {
        let sign = if reverse { -1.0 } else { 1.0 };
        let limit = (width + height) as usize * 2;
        (0..limit)
            .map(move |i| {
                let t = i as f64 * sign;
                let fx = self.origin.0 + t * self.step.0;
                let fy = self.origin.1 + t * self.step.1;
                if self.x_major {
                    (fx.round() as i64, fy.floor() as i64)
                } else {
                    (fx.floor() as i64, fy.round() as i64)
                }
            })
            .take_while(move |&(px, py)| px >= 0 && py >= 0 && px < i64::from(width) && py < i64::from(height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn vertical_line(width: u32, height: u32, x: u32, rows: std::ops::Range<u32>) -> GrayImage {
        let mut image = GrayImage::new(width, height);
        for y in rows {
            image.put_pixel(x, y, Luma([255]));
        }
        image
    }

    #[test]
    fn test_vertical_line_found() {
        let image = vertical_line(60, 60, 20, 0..60);
        let acc = HoughAccumulator::build(&image, 1.0, PI / 180.0);
        assert_eq!(acc.max_votes(), 60);

        let lines = acc.lines(40);
        assert!(!lines.is_empty());
        assert!(lines[0].theta.abs() < 1e-6);
        assert!((lines[0].rho - 20.0).abs() <= 1.0);
    }

    #[test]
    fn test_lines_sorted_by_votes() {
        let mut image = vertical_line(80, 80, 10, 0..80);
        for y in 0..40 {
            image.put_pixel(60, y, Luma([255]));
        }
        let lines = HoughAccumulator::build(&image, 1.0, PI / 180.0).lines(30);
        assert!(lines.len() >= 2);
        assert!((lines[0].rho - 10.0).abs() <= 1.0);
    }

    #[test]
    fn test_threshold_filters_everything() {
        let image = vertical_line(50, 50, 25, 0..50);
        let acc = HoughAccumulator::build(&image, 1.0, PI / 180.0);
        assert!(acc.lines(50).is_empty());
        assert!(HoughAccumulator::build(&GrayImage::new(10, 10), 1.0, PI / 180.0).lines(0).is_empty());
    }

    #[test]
    fn test_row_intersections() {
        let line = PolarLine::new(20.0, 0.0);
        let [top, bottom] = line.row_intersections(100).unwrap();
        assert!((top.0 - 20.0).abs() < 1e-4 && top.1 == 0.0);
        assert!((bottom.0 - 20.0).abs() < 1e-4 && bottom.1 == 100.0);

        assert!(PolarLine::new(5.0, PI / 2.0).row_intersections(100).is_none());
    }

    #[test]
    fn test_segment_on_vertical_line() {
        let image = vertical_line(80, 80, 30, 10..70);
        let params = SegmentParams {
            rho_resolution: 2.5,
            theta_resolution: PI / 180.0,
            threshold: 20,
            min_length: 40.0,
            max_gap: 5,
            seed: 7,
        };
        let segments = detect_segments(&image, &params);
        assert!(!segments.is_empty());

        let longest = segments
            .iter()
            .max_by_key(|s| (s.start.1 - s.end.1).abs())
            .unwrap();
        assert!((longest.start.1 - longest.end.1).abs() >= 40);
        assert!((longest.start.0 - 30).abs() <= 1 && (longest.end.0 - 30).abs() <= 1);
    }

    #[test]
    fn test_short_segments_rejected() {
        let image = vertical_line(80, 80, 30, 10..25);
        let params = SegmentParams {
            rho_resolution: 2.5,
            theta_resolution: PI / 180.0,
            threshold: 5,
            min_length: 40.0,
            max_gap: 2,
            seed: 7,
        };
        assert!(detect_segments(&image, &params).is_empty());
    }

    #[test]
    fn test_segment_angle_convention() {
        let up_right = LineSegment { start: (0, 10), end: (10, 0) };
        assert!((up_right.angle_degrees() - 135.0).abs() < 1e-3);

        let down_right = LineSegment { start: (0, 0), end: (10, 10) };
        assert!((down_right.angle_degrees() + 135.0).abs() < 1e-3);
    }
}
