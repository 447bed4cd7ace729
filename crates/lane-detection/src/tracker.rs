//! Per-side lane tracking
//!
//! A linear Kalman filter over `[rho, theta, rho_rate, theta_rate]` with an
//! identity transition and a measurement that observes `(rho, theta)`.
//! The filter model ([`LaneTracker`]) is shared; the evolving
//! [`TrackerState`] is owned by the caller, one per lane side, and passed
//! in by reference every frame.

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use tracing::{debug, warn};

use crate::config::TrackerConfig;
use crate::hough::PolarLine;
use crate::side::SidePair;

/// Filter state of one lane side
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerState {
    /// `[rho, theta, rho_rate, theta_rate]`
    pub state: Vector4<f64>,
    /// Error covariance
    pub covariance: Matrix4<f64>,
    /// Output of the most recent predict
    pub predicted: Option<PolarLine>,
    /// Output of the most recent correct
    pub corrected: Option<PolarLine>,
}

impl TrackerState {
    /// Current `(rho, theta)` estimate
    pub fn line(&self) -> PolarLine {
        PolarLine::new(self.state[0] as f32, self.state[1] as f32)
    }
}

/// Tracker states of both sides
pub type SideTrackers = SidePair<TrackerState>;

/// Constant-velocity tracking filter model
#[derive(Debug, Clone)]
pub struct LaneTracker {
    transition: Matrix4<f64>,
    measurement: Matrix2x4<f64>,
    process_noise: Matrix4<f64>,
    measurement_noise: Matrix2<f64>,
    initial_error: Matrix4<f64>,
}

impl LaneTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            transition: Matrix4::identity(),
            measurement: Matrix2x4::identity(),
            process_noise: Matrix4::identity() * config.process_noise,
            measurement_noise: Matrix2::identity() * config.measurement_noise,
            initial_error: Matrix4::identity() * config.initial_error,
        }
    }

    /// Fresh state at `line` with zero rates
    pub fn seed(&self, line: PolarLine) -> TrackerState {
        TrackerState {
            state: Vector4::new(f64::from(line.rho), f64::from(line.theta), 0.0, 0.0),
            covariance: self.initial_error,
            predicted: None,
            corrected: None,
        }
    }

    /// Both sides seeded
    pub fn seed_pair(&self, left: PolarLine, right: PolarLine) -> SideTrackers {
        SidePair::new(self.seed(left), self.seed(right))
    }

    /// Restart `state` at `line`
    pub fn reseed(&self, state: &mut TrackerState, line: PolarLine) {
        debug!("Reseeding tracker at {:?}", line);
        *state = self.seed(line);
    }

    /// Time update. The predicted state becomes the current state.
    pub fn predict(&self, state: &mut TrackerState) -> PolarLine {
        state.state = self.transition * state.state;
        state.covariance = self.transition * state.covariance * self.transition.transpose() + self.process_noise;

        let predicted = state.line();
        state.predicted = Some(predicted);
        predicted
    }

    /// Measurement update with an observed `(rho, theta)`.
    ///
    /// An exact `(0, 0)` measurement is the "no line" value and leaves the
    /// state untouched.
    pub fn correct(&self, state: &mut TrackerState, measured: PolarLine) -> Option<PolarLine> {
        if measured.rho == 0.0 && measured.theta == 0.0 {
            return None;
        }

        let h = &self.measurement;
        let innovation_cov = h * state.covariance * h.transpose() + self.measurement_noise;
        let Some(innovation_inv) = innovation_cov.try_inverse() else {
            warn!("Singular innovation covariance, skipping correction");
            return None;
        };

        let gain = state.covariance * h.transpose() * innovation_inv;
        let z = Vector2::new(f64::from(measured.rho), f64::from(measured.theta));
        state.state += gain * (z - h * state.state);
        state.covariance = (Matrix4::identity() - gain * h) * state.covariance;

        let corrected = state.line();
        state.corrected = Some(corrected);
        Some(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_sets_state() {
        let tracker = LaneTracker::new(&TrackerConfig::default());
        let state = tracker.seed(PolarLine::new(100.0, 0.5));
        assert_eq!(state.state, Vector4::new(100.0, 0.5, 0.0, 0.0));
        assert!((state.covariance[(2, 2)] - 0.1).abs() < 1e-12);
        assert!(state.predicted.is_none());
    }

    #[test]
    fn test_no_drift_without_measurements() {
        let tracker = LaneTracker::new(&TrackerConfig::frozen());
        let mut state = tracker.seed(PolarLine::new(100.0, 0.0));

        for _ in 0..10 {
            let predicted = tracker.predict(&mut state);
            assert_eq!(predicted, PolarLine::new(100.0, 0.0));
        }
        assert_eq!(state.state, Vector4::new(100.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_covariance_grows_between_corrections() {
        let tracker = LaneTracker::new(&TrackerConfig::default());
        let mut state = tracker.seed(PolarLine::new(10.0, 0.2));
        tracker.predict(&mut state);
        tracker.predict(&mut state);
        assert!((state.covariance[(0, 0)] - 0.11).abs() < 1e-9);
    }

    #[test]
    fn test_zero_measurement_is_ignored() {
        let tracker = LaneTracker::new(&TrackerConfig::default());
        let mut corrected = tracker.seed(PolarLine::new(50.0, 0.3));
        let mut untouched = corrected.clone();

        tracker.predict(&mut corrected);
        tracker.predict(&mut untouched);
        assert!(tracker.correct(&mut corrected, PolarLine::new(0.0, 0.0)).is_none());

        assert_eq!(corrected, untouched);
        assert_eq!(tracker.predict(&mut corrected), tracker.predict(&mut untouched));
    }

    #[test]
    fn test_correction_moves_towards_measurement() {
        let tracker = LaneTracker::new(&TrackerConfig::default());
        let mut state = tracker.seed(PolarLine::new(0.0, 0.0));
        tracker.predict(&mut state);

        let corrected = tracker.correct(&mut state, PolarLine::new(100.0, 0.4)).unwrap();
        // gain = 0.105 / (0.105 + 0.1)
        let gain = 0.105 / 0.205;
        assert!((f64::from(corrected.rho) - 100.0 * gain).abs() < 1e-3);
        assert!((f64::from(corrected.theta) - 0.4 * gain).abs() < 1e-5);
        assert_eq!(state.corrected, Some(corrected));
        assert!(state.covariance[(0, 0)] < 0.105);
    }

    #[test]
    fn test_repeated_measurements_converge() {
        let tracker = LaneTracker::new(&TrackerConfig::default());
        let mut state = tracker.seed(PolarLine::new(0.0, 0.0));
        for _ in 0..50 {
            tracker.predict(&mut state);
            tracker.correct(&mut state, PolarLine::new(80.0, 0.1));
        }
        let line = state.line();
        assert!((line.rho - 80.0).abs() < 0.5);
        assert!((line.theta - 0.1).abs() < 0.01);
    }

    #[test]
    fn test_reseed() {
        let tracker = LaneTracker::new(&TrackerConfig::default());
        let mut state = tracker.seed(PolarLine::new(1.0, 1.0));
        tracker.predict(&mut state);
        tracker.reseed(&mut state, PolarLine::new(7.0, 0.5));
        assert_eq!(state, tracker.seed(PolarLine::new(7.0, 0.5)));
    }
}
