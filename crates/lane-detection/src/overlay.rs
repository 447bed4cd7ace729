//! Result overlays on camera frames

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_circle_mut, draw_hollow_ellipse_mut};

use crate::analysis::{LaneAnalysis, LineSource};
use crate::draw::draw_thick_segment;
use crate::ipm::{CalibrationPointSet, INVALID_COORD};
use crate::object::BoundingBox;
use crate::side::LaneSide;

const MEASURED_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const PREDICTED_COLOR: Rgb<u8> = Rgb([255, 160, 0]);
const VEHICLE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const QUAD_COLOR: Rgb<u8> = Rgb([205, 205, 0]);
const MARKER_COLOR: Rgb<u8> = Rgb([238, 238, 0]);
const MARKER_RING_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub const LANE_THICKNESS: u32 = 8;

/// Draw both lane lines; predicted sides use a distinct color
pub fn draw_lanes(image: &mut RgbImage, lanes: &LaneAnalysis) {
    for side in LaneSide::BOTH {
        let result = lanes.side(side);
        if result.endpoints == [[INVALID_COORD; 2]; 2] {
            continue;
        }
        let [[x1, y1], [x2, y2]] = result.endpoints;
        let color = match result.source {
            LineSource::Measured => MEASURED_COLOR,
            LineSource::Predicted => PREDICTED_COLOR,
        };
        draw_thick_segment(image, (x1, y1), (x2, y2), LANE_THICKNESS, color);
    }
}

/// Draw an ellipse inscribed in every vehicle box
pub fn draw_vehicles(image: &mut RgbImage, vehicles: &[BoundingBox]) {
    for vehicle in vehicles {
        let (rx, ry) = vehicle.half_extent();
        if rx == 0 || ry == 0 {
            continue;
        }
        let center = vehicle.center();
        draw_hollow_ellipse_mut(image, center, rx, ry, VEHICLE_COLOR);
        draw_hollow_ellipse_mut(image, center, rx + 1, ry + 1, VEHICLE_COLOR);
    }
}

/// Outline the calibration source quad and mark its corners
pub fn draw_calibration(image: &mut RgbImage, points: &CalibrationPointSet) {
    let quad = points.source;
    for (a, b) in [(0, 3), (2, 3), (0, 1), (2, 1)] {
        let start = (quad[a][0], quad[a][1]);
        let end = (quad[b][0], quad[b][1]);
        draw_thick_segment(image, start, end, 2, QUAD_COLOR);
    }

    for p in &quad {
        let center = (p[0] as i32, p[1] as i32);
        draw_filled_circle_mut(image, center, 2, MARKER_COLOR);
        draw_hollow_circle_mut(image, center, 5, MARKER_RING_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SideResult;
    use crate::hough::PolarLine;

    fn side(source: LineSource, x: f32) -> SideResult {
        SideResult {
            source,
            line: PolarLine::new(x, 0.0),
            endpoints: [[x, 0.0], [x, 99.0]],
        }
    }

    #[test]
    fn test_lane_colors() {
        let mut image = RgbImage::new(100, 100);
        let lanes = LaneAnalysis {
            left: side(LineSource::Measured, 20.0),
            right: side(LineSource::Predicted, 80.0),
        };
        draw_lanes(&mut image, &lanes);

        assert_eq!(*image.get_pixel(20, 50), MEASURED_COLOR);
        assert_eq!(*image.get_pixel(80, 50), PREDICTED_COLOR);
        assert_eq!(*image.get_pixel(50, 50), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_invalid_endpoints_draw_nothing() {
        let mut image = RgbImage::new(50, 50);
        let invalid = SideResult {
            source: LineSource::Predicted,
            line: PolarLine::new(0.0, 0.0),
            endpoints: [[-1.0, -1.0], [-1.0, -1.0]],
        };
        draw_lanes(&mut image, &LaneAnalysis { left: invalid, right: invalid });
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_vehicle_ellipse() {
        let mut image = RgbImage::new(100, 100);
        draw_vehicles(&mut image, &[BoundingBox::new(20, 30, 40, 20), BoundingBox::new(0, 0, 1, 1)]);
        assert_eq!(*image.get_pixel(20, 40), VEHICLE_COLOR);
        assert_eq!(*image.get_pixel(40, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_calibration_markers() {
        let mut image = RgbImage::new(200, 200);
        let points = CalibrationPointSet::default_for(200, 200);
        draw_calibration(&mut image, &CalibrationPointSet {
            source: [[10.0, 190.0], [190.0, 190.0], [150.0, 40.0], [50.0, 40.0]],
            ..points
        });
        assert_eq!(*image.get_pixel(150, 40), MARKER_COLOR);
        assert_eq!(*image.get_pixel(100, 190), QUAD_COLOR);
    }
}
