//! Thick line rasterisation

use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut, Canvas};
use imageproc::point::Point;

use crate::hough::{LineSegment, PolarLine};

/// Draw a segment `thickness` pixels wide with round caps.
///
/// The segment is clipped to the canvas (padded by the stroke width) first,
/// so endpoints far outside the image are fine.
pub fn draw_thick_segment<C: Canvas>(
    canvas: &mut C,
    start: (f32, f32),
    end: (f32, f32),
    thickness: u32,
    color: C::Pixel,
) {
    let half = thickness as f32 / 2.0;
    let (width, height) = canvas.dimensions();
    let bounds = (-half - 1.0, -half - 1.0, width as f32 + half + 1.0, height as f32 + half + 1.0);

    let Some((start, end)) = clip_segment(start, end, bounds) else {
        return;
    };

    if thickness <= 1 {
        draw_line_segment_mut(canvas, start, end, color);
        return;
    }

    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = (dx * dx + dy * dy).sqrt();
    let radius = half.round() as i32;
    if length < 0.5 {
        draw_filled_circle_mut(canvas, to_pixel(start), radius, color);
        return;
    }

    let (nx, ny) = (-dy / length * half, dx / length * half);
    let polygon = [
        Point::new((start.0 + nx).round() as i32, (start.1 + ny).round() as i32),
        Point::new((end.0 + nx).round() as i32, (end.1 + ny).round() as i32),
        Point::new((end.0 - nx).round() as i32, (end.1 - ny).round() as i32),
        Point::new((start.0 - nx).round() as i32, (start.1 - ny).round() as i32),
    ];
    if polygon[0] != polygon[3] {
        draw_polygon_mut(canvas, &polygon, color);
    }
    draw_filled_circle_mut(canvas, to_pixel(start), radius, color);
    draw_filled_circle_mut(canvas, to_pixel(end), radius, color);
}

/// Draw a polar line between its crossings with the first and last row
pub fn draw_polar_line(canvas: &mut GrayImage, line: &PolarLine, thickness: u32, value: u8) {
    if let Some([top, bottom]) = line.row_intersections(canvas.height()) {
        draw_thick_segment(canvas, top, bottom, thickness, Luma([value]));
    }
}

pub fn draw_segment(canvas: &mut GrayImage, segment: &LineSegment, thickness: u32, value: u8) {
    let start = (segment.start.0 as f32, segment.start.1 as f32);
    let end = (segment.end.0 as f32, segment.end.1 as f32);
    draw_thick_segment(canvas, start, end, thickness, Luma([value]));
}

fn to_pixel(p: (f32, f32)) -> (i32, i32) {
    (p.0.round() as i32, p.1.round() as i32)
}

/// Liang-Barsky clipping against `(x_min, y_min, x_max, y_max)`
fn clip_segment(
    start: (f32, f32),
    end: (f32, f32),
    (x_min, y_min, x_max, y_max): (f32, f32, f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    if ![start.0, start.1, end.0, end.1].iter().all(|v| v.is_finite()) {
        return None;
    }

    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;

    for (p, q) in [
        (-dx, start.0 - x_min),
        (dx, x_max - start.0),
        (-dy, start.1 - y_min),
        (dy, y_max - start.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }

    Some((
        (start.0 + t0 * dx, start.1 + t0 * dy),
        (start.0 + t1 * dx, start.1 + t1 * dy),
    ))
}
