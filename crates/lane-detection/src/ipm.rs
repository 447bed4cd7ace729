//! Inverse perspective mapping
//!
//! A [`PerspectiveRectifier`] owns the homography derived from four
//! calibration point pairs and two dense coordinate tables: one sized like
//! the rectified (bird's-eye) image that pulls pixels out of the camera
//! image, and one sized like the camera image that pulls pixels back out of
//! the rectified image. Both tables are built once, so per-frame warping is
//! a table lookup plus bilinear interpolation.

use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_into_with, Interpolation};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::LaneError;

/// Marker value stored in the coordinate tables (and returned by callers
/// that need a concrete point) when the homogeneous scale is zero.
pub const INVALID_COORD: f32 = -1.0;

/// Sentinel point used where a mapped point must be emitted regardless
pub fn invalid_point() -> Point2<f64> {
    Point2::new(f64::from(INVALID_COORD), f64::from(INVALID_COORD))
}

/// Direction of a point mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapDirection {
    /// Camera image to rectified image
    Forward,
    /// Rectified image back to camera image
    Inverse,
}

/// Four corresponding points in the camera image and in rectified space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPointSet {
    /// Quad in the camera image
    pub source: [[f32; 2]; 4],
    /// Matching quad in the rectified image
    pub destination: [[f32; 2]; 4],
}

impl CalibrationPointSet {
    pub fn new(source: [[f32; 2]; 4], destination: [[f32; 2]; 4]) -> Self {
        Self { source, destination }
    }

    /// Default road calibration for a `width` x `height` dash camera.
    ///
    /// The destination is the full image rectangle; the source keeps the
    /// bottom corners and pulls the top edge to a trapezoid at y = 700.
    pub fn default_for(width: u32, height: u32) -> Self {
        let w = width as f32;
        let h = height as f32;
        let centre = (width / 2) as f32;
        Self {
            source: [[0.0, h], [w, h], [centre + 150.0, 700.0], [centre - 300.0, 700.0]],
            destination: [[0.0, h], [w, h], [w, 0.0], [0.0, 0.0]],
        }
    }

    /// Reject point sets that cannot define a homography: non-finite
    /// coordinates or three collinear points in either quad.
    pub fn validate(&self) -> Result<(), LaneError> {
        for (name, quad) in [("source", &self.source), ("destination", &self.destination)] {
            if quad.iter().flatten().any(|v| !v.is_finite()) {
                return Err(LaneError::Calibration(format!("{} quad has non-finite coordinates", name)));
            }
            for skip in 0..4 {
                let tri: Vec<[f32; 2]> = (0..4).filter(|&i| i != skip).map(|i| quad[i]).collect();
                let area = twice_area(tri[0], tri[1], tri[2]);
                if area.abs() < 1e-6 {
                    return Err(LaneError::Calibration(format!(
                        "{} quad has three collinear points (excluding point {})",
                        name, skip
                    )));
                }
            }
        }
        Ok(())
    }
}

fn twice_area(a: [f32; 2], b: [f32; 2], c: [f32; 2]) -> f64 {
    let (ax, ay) = (f64::from(a[0]), f64::from(a[1]));
    let (bx, by) = (f64::from(b[0]), f64::from(b[1]));
    let (cx, cy) = (f64::from(c[0]), f64::from(c[1]));
    (bx - ax) * (cy - ay) - (by - ay) * (cx - ax)
}

/// Forward projective transform and its inverse
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    forward: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Homography {
    /// Solve the transform taking `points.source` onto `points.destination`.
    ///
    /// A degenerate point set produces the zero matrix, whose point maps all
    /// come back as `None`.
    pub fn from_points(points: &CalibrationPointSet) -> Self {
        let forward = solve_perspective(&points.source, &points.destination).unwrap_or_else(|| {
            warn!("Calibration points are degenerate, homography is singular");
            Matrix3::zeros()
        });
        let inverse = forward.try_inverse().unwrap_or_else(|| {
            warn!("Homography is not invertible");
            Matrix3::zeros()
        });
        Self { forward, inverse }
    }

    pub fn forward(&self) -> &Matrix3<f64> {
        &self.forward
    }

    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    fn matrix(&self, direction: MapDirection) -> &Matrix3<f64> {
        match direction {
            MapDirection::Forward => &self.forward,
            MapDirection::Inverse => &self.inverse,
        }
    }

    /// Map a single point; `None` when the homogeneous scale is exactly zero
    pub fn map_point(&self, p: Point2<f64>, direction: MapDirection) -> Option<Point2<f64>> {
        project(self.matrix(direction), p.x, p.y)
    }
}

/// Direct linear solve with h33 fixed to 1 (eight unknowns, two equations
/// per correspondence).
fn solve_perspective(src: &[[f32; 2]; 4], dst: &[[f32; 2]; 4]) -> Option<Matrix3<f64>> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for i in 0..4 {
        let (x, y) = (f64::from(src[i][0]), f64::from(src[i][1]));
        let (u, v) = (f64::from(dst[i][0]), f64::from(dst[i][1]));

        a[(i, 0)] = x;
        a[(i, 1)] = y;
        a[(i, 2)] = 1.0;
        a[(i, 6)] = -x * u;
        a[(i, 7)] = -y * u;
        b[i] = u;

        a[(i + 4, 3)] = x;
        a[(i + 4, 4)] = y;
        a[(i + 4, 5)] = 1.0;
        a[(i + 4, 6)] = -x * v;
        a[(i + 4, 7)] = -y * v;
        b[i + 4] = v;
    }

    let h = a.lu().solve(&b)?;
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }

    Some(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
}

fn project(m: &Matrix3<f64>, x: f64, y: f64) -> Option<Point2<f64>> {
    let v = m * Vector3::new(x, y, 1.0);
    if v.z == 0.0 {
        return None;
    }
    Some(Point2::new(v.x / v.z, v.y / v.z))
}

/// Dense per-pixel source coordinates for one warp direction
#[derive(Debug, Clone)]
struct CoordinateMap {
    map_x: Array2<f32>,
    map_y: Array2<f32>,
}

impl CoordinateMap {
    /// For every pixel of a `width` x `height` output, the coordinate `m`
    /// sends it to in the input image.
    fn build(m: &Matrix3<f64>, width: u32, height: u32) -> Self {
        let shape = (height as usize, width as usize);
        let mut map_x = Array2::from_elem(shape, INVALID_COORD);
        let mut map_y = Array2::from_elem(shape, INVALID_COORD);

        for ((row, col), x) in map_x.indexed_iter_mut() {
            if let Some(p) = project(m, col as f64, row as f64) {
                *x = p.x as f32;
                map_y[[row, col]] = p.y as f32;
            }
        }

        Self { map_x, map_y }
    }

    fn size(&self) -> (u32, u32) {
        let (rows, cols) = self.map_x.dim();
        (cols as u32, rows as u32)
    }

    /// Source coordinate for output pixel (x, y), snapped onto the edge
    /// pixel when it lies within half a pixel outside the `source` image
    fn lookup(&self, x: f32, y: f32, source: (u32, u32)) -> (f32, f32) {
        let index = (y as usize, x as usize);
        match (self.map_x.get(index), self.map_y.get(index)) {
            (Some(&mx), Some(&my)) => (snap(mx, source.0), snap(my, source.1)),
            _ => (INVALID_COORD, INVALID_COORD),
        }
    }

    fn remap(&self, image: &GrayImage, border_value: u8) -> GrayImage {
        let (width, height) = self.size();
        let source = image.dimensions();
        let mut out = GrayImage::from_pixel(width, height, Luma([border_value]));
        if source.0 == 0 || source.1 == 0 {
            return out;
        }

        // Bilinear sampling needs a right / lower neighbour, so the last
        // column and row are replicated once.
        let padded = GrayImage::from_fn(source.0 + 1, source.1 + 1, |x, y| {
            *image.get_pixel(x.min(source.0 - 1), y.min(source.1 - 1))
        });
        warp_into_with(
            &padded,
            |x, y| self.lookup(x, y, source),
            Interpolation::Bilinear,
            Luma([border_value]),
            &mut out,
        );
        out
    }
}

fn snap(v: f32, size: u32) -> f32 {
    let last = size as f32 - 1.0;
    if v > -0.5 && v < 0.0 {
        0.0
    } else if v > last && v < last + 0.5 {
        last
    } else if v >= last + 0.5 && v < last + 1.0 {
        // outside the image: keep the padded copy out of the blend
        INVALID_COORD
    } else {
        v
    }
}

/// Bird's-eye rectification between a camera image and a rectified plane
#[derive(Debug, Clone)]
pub struct PerspectiveRectifier {
    original_size: (u32, u32),
    rectified_size: (u32, u32),
    points: CalibrationPointSet,
    homography: Homography,
    forward_map: CoordinateMap,
    inverse_map: CoordinateMap,
    border_value: u8,
}

impl PerspectiveRectifier {
    /// Build the homography and both coordinate tables.
    ///
    /// The point set is not validated here; see
    /// [`CalibrationPointSet::validate`].
    pub fn new(
        original_size: (u32, u32),
        rectified_size: (u32, u32),
        points: CalibrationPointSet,
        border_value: u8,
    ) -> Self {
        info!(
            "Building perspective rectifier {}x{} -> {}x{}",
            original_size.0, original_size.1, rectified_size.0, rectified_size.1
        );

        let homography = Homography::from_points(&points);
        let forward_map = CoordinateMap::build(homography.inverse(), rectified_size.0, rectified_size.1);
        let inverse_map = CoordinateMap::build(homography.forward(), original_size.0, original_size.1);
        debug!("Homography: {:?}", homography.forward());

        Self {
            original_size,
            rectified_size,
            points,
            homography,
            forward_map,
            inverse_map,
            border_value,
        }
    }

    pub fn original_size(&self) -> (u32, u32) {
        self.original_size
    }

    pub fn rectified_size(&self) -> (u32, u32) {
        self.rectified_size
    }

    pub fn points(&self) -> &CalibrationPointSet {
        &self.points
    }

    pub fn homography(&self) -> &Homography {
        &self.homography
    }

    /// Warp a camera image into the rectified plane
    pub fn rectify(&self, frame: &GrayImage) -> Result<GrayImage, LaneError> {
        check_size(frame, self.original_size)?;
        Ok(self.forward_map.remap(frame, self.border_value))
    }

    /// Warp a rectified image back into camera coordinates
    pub fn unrectify(&self, frame: &GrayImage) -> Result<GrayImage, LaneError> {
        check_size(frame, self.rectified_size)?;
        Ok(self.inverse_map.remap(frame, self.border_value))
    }

    pub fn map_point(&self, p: Point2<f64>, direction: MapDirection) -> Option<Point2<f64>> {
        self.homography.map_point(p, direction)
    }
}

fn check_size(frame: &GrayImage, expected: (u32, u32)) -> Result<(), LaneError> {
    let actual = frame.dimensions();
    if actual != expected {
        return Err(LaneError::InvalidFrame { expected, actual });
    }
    Ok(())
}
