//! Robust 2D line fitting (Huber-weighted orthogonal regression)

use nalgebra::{Point2, Vector2};

use crate::config::HuberConfig;

/// A fitted line through `point` along the unit vector `direction`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedLine {
    pub direction: Vector2<f64>,
    pub point: Point2<f64>,
}

impl FittedLine {
    /// Orthogonal distance from `p` to the line
    pub fn distance(&self, p: &Point2<f64>) -> f64 {
        let d = p - self.point;
        (d.x * self.direction.y - d.y * self.direction.x).abs()
    }

    /// Points `reach` away from the fitted point on both sides
    pub fn endpoints(&self, reach: f64) -> (Point2<f64>, Point2<f64>) {
        (self.point - self.direction * reach, self.point + self.direction * reach)
    }
}

fn huber_weight(residual: f64, c: f64) -> f64 {
    if residual <= c {
        1.0
    } else {
        c / residual
    }
}

/// Weighted total least squares: weighted centroid plus the principal axis
/// of the weighted scatter matrix.
fn weighted_fit(points: &[Point2<f64>], weights: &[f64]) -> Option<FittedLine> {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }

    let (mut cx, mut cy) = (0.0, 0.0);
    for (p, w) in points.iter().zip(weights) {
        cx += w * p.x;
        cy += w * p.y;
    }
    cx /= total;
    cy /= total;

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for (p, w) in points.iter().zip(weights) {
        let (dx, dy) = (p.x - cx, p.y - cy);
        sxx += w * dx * dx;
        syy += w * dy * dy;
        sxy += w * dx * dy;
    }

    let angle = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    Some(FittedLine {
        direction: Vector2::new(angle.cos(), angle.sin()),
        point: Point2::new(cx, cy),
    })
}

/// Fit one line to `points`, iteratively down-weighting points whose
/// orthogonal residual exceeds `config.c`.
///
/// Stops once both the direction change (radians) and the shift of the
/// fitted point across the previous line fall under the tolerances.
pub fn fit_line_huber(points: &[Point2<f64>], config: &HuberConfig) -> Option<FittedLine> {
    if points.is_empty() {
        return None;
    }

    let mut weights = vec![1.0; points.len()];
    let mut line = weighted_fit(points, &weights)?;

    for _ in 0..config.max_iterations {
        for (w, p) in weights.iter_mut().zip(points) {
            *w = huber_weight(line.distance(p), config.c);
        }
        let next = weighted_fit(points, &weights)?;

        let turn = next.direction.dot(&line.direction).abs().min(1.0).acos();
        let shift = line.distance(&next.point);
        line = next;
        if turn < config.aeps && shift < config.reps {
            break;
        }
    }

    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn angle_deg(line: &FittedLine) -> f64 {
        line.direction.y.atan2(line.direction.x).to_degrees().rem_euclid(180.0)
    }

    #[test]
    fn test_collinear_points() {
        let points: Vec<_> = (0..20).map(|i| Point2::new(i as f64, 2.0 * i as f64 + 1.0)).collect();
        let line = fit_line_huber(&points, &HuberConfig::default()).unwrap();

        assert!((angle_deg(&line) - 2.0f64.atan().to_degrees()).abs() < 1e-6);
        for p in &points {
            assert!(line.distance(p) < 1e-6);
        }
    }

    #[test]
    fn test_outlier_is_down_weighted() {
        let mut points: Vec<_> = (0..30).map(|i| Point2::new(i as f64, 10.0)).collect();
        points.push(Point2::new(15.0, 40.0));

        let line = fit_line_huber(&points, &HuberConfig::default()).unwrap();
        let plain = weighted_fit(&points, &vec![1.0; points.len()]).unwrap();

        assert!(line.distance(&Point2::new(5.0, 10.0)) < plain.distance(&Point2::new(5.0, 10.0)));
        assert!(line.distance(&Point2::new(5.0, 10.0)) < 0.5);
        assert!(angle_deg(&line).min(180.0 - angle_deg(&line)) < 1.0);
    }

    #[test]
    fn test_vertical_points() {
        let points: Vec<_> = (0..10).map(|i| Point2::new(4.0, i as f64)).collect();
        let line = fit_line_huber(&points, &HuberConfig::default()).unwrap();
        assert!((angle_deg(&line) - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_input() {
        assert!(fit_line_huber(&[], &HuberConfig::default()).is_none());
    }

    #[test]
    fn test_endpoints() {
        let line = FittedLine {
            direction: Vector2::new(1.0, 0.0),
            point: Point2::new(5.0, 5.0),
        };
        let (a, b) = line.endpoints(10.0);
        assert_eq!(a, Point2::new(-5.0, 5.0));
        assert_eq!(b, Point2::new(15.0, 5.0));
    }
}
