//! Lane-marker perception
//!
//! Per-frame lane detection for a forward-facing road camera:
//! - Perspective rectification to a bird's-eye view
//! - Two-pass adaptive Hough search for marker candidates
//! - Strata sampling and Huber line fitting per lane side
//! - Kalman tracking with prediction fallback when a marker is lost
//! - Optional vehicle detection side channel

pub mod analysis;
pub mod binarize;
pub mod config;
pub mod draw;
pub mod estimator;
pub mod fit;
pub mod hough;
pub mod ipm;
pub mod lane;
pub mod object;
pub mod overlay;
pub mod search;
pub mod side;
pub mod tracker;

pub use analysis::{LaneAnalysis, LineSource, PerceptionAnalysis, SideResult};
pub use config::LaneConfig;
pub use estimator::{LaneEstimate, RobustLineEstimator};
pub use hough::PolarLine;
pub use ipm::{CalibrationPointSet, Homography, MapDirection, PerspectiveRectifier};
pub use lane::LaneDetector;
pub use object::{BoundingBox, VehicleDetector};
pub use search::CandidateLineSearch;
pub use side::{LaneSide, SidePair};
pub use tracker::{LaneTracker, SideTrackers, TrackerState};

use camera_capture::frame::VideoFrame;
use imageproc::contrast::equalize_histogram;
use thiserror::Error;
use tracing::{debug, info};

/// Lane perception error types
#[derive(Error, Debug)]
pub enum LaneError {
    #[error("Invalid frame size: expected {expected:?}, got {actual:?}")]
    InvalidFrame { expected: (u32, u32), actual: (u32, u32) },

    #[error("Invalid calibration: {0}")]
    Calibration(String),

    #[error("Vehicle detection failed: {0}")]
    VehicleDetection(String),
}

/// Lane perception module
///
/// Owns the detector, the tracker state of both sides and an optional
/// vehicle detector. Frames must be fed in arrival order.
pub struct PerceptionModule {
    detector: LaneDetector,
    trackers: SideTrackers,
    vehicle_detector: Option<Box<dyn VehicleDetector>>,
}

impl PerceptionModule {
    /// Create a module for `frame_size` frames with both trackers seeded at
    /// (0, 0)
    pub fn new(frame_size: (u32, u32), points: CalibrationPointSet, config: &LaneConfig) -> Result<Self, LaneError> {
        let detector = LaneDetector::new(frame_size, points, config)?;
        let origin = PolarLine::new(0.0, 0.0);
        let trackers = detector.tracker().seed_pair(origin, origin);

        Ok(Self {
            detector,
            trackers,
            vehicle_detector: None,
        })
    }

    /// Attach a vehicle detector
    pub fn with_vehicle_detector(mut self, detector: Box<dyn VehicleDetector>) -> Self {
        info!("Vehicle detection enabled");
        self.vehicle_detector = Some(detector);
        self
    }

    pub fn detector(&self) -> &LaneDetector {
        &self.detector
    }

    pub fn trackers(&self) -> &SideTrackers {
        &self.trackers
    }

    /// Restart both trackers at the given lines
    pub fn reseed(&mut self, left: PolarLine, right: PolarLine) {
        let tracker = self.detector.tracker();
        tracker.reseed(&mut self.trackers.left, left);
        tracker.reseed(&mut self.trackers.right, right);
    }

    pub fn recalibrate(&mut self, points: CalibrationPointSet) -> Result<(), LaneError> {
        self.detector.recalibrate(points)
    }

    /// Analyze one frame
    pub fn analyze(&mut self, frame: &VideoFrame) -> Result<PerceptionAnalysis, LaneError> {
        let gray = frame.to_gray_image();
        let lanes = self.detector.process_gray(&gray, &mut self.trackers)?;

        let vehicles = match self.vehicle_detector.as_mut() {
            Some(detector) => detector.detect(&equalize_histogram(&gray))?,
            None => Vec::new(),
        };

        debug!(
            "Frame {}: left {:?}, right {:?}, {} vehicles",
            frame.sequence,
            lanes.left.source,
            lanes.right.source,
            vehicles.len()
        );

        Ok(PerceptionAnalysis {
            sequence: frame.sequence,
            lanes,
            vehicles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    struct FixedDetector {
        calls: usize,
    }

    impl VehicleDetector for FixedDetector {
        fn detect(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>, LaneError> {
            self.calls += 1;
            Ok(vec![BoundingBox::new(0, 0, gray.width() / 2, gray.height() / 2)])
        }
    }

    struct FailingDetector;

    impl VehicleDetector for FailingDetector {
        fn detect(&mut self, _gray: &GrayImage) -> Result<Vec<BoundingBox>, LaneError> {
            Err(LaneError::VehicleDetection("classifier unavailable".to_string()))
        }
    }

    fn module(width: u32, height: u32) -> PerceptionModule {
        let quad = [[0.0, 0.0], [width as f32, 0.0], [width as f32, height as f32], [0.0, height as f32]];
        PerceptionModule::new((width, height), CalibrationPointSet::new(quad, quad), &LaneConfig::default()).unwrap()
    }

    fn frame(width: u32, height: u32, sequence: u32) -> VideoFrame {
        VideoFrame::from_gray(GrayImage::from_pixel(width, height, Luma([40])), 0, sequence)
    }

    #[test]
    fn test_analyze_without_vehicle_detector() {
        let mut module = module(120, 80);
        let analysis = module.analyze(&frame(120, 80, 4)).unwrap();

        assert_eq!(analysis.sequence, 4);
        assert!(analysis.vehicles.is_empty());
        assert_eq!(analysis.predicted_sides(), 2);
        assert_eq!(module.trackers().left.predicted, Some(PolarLine::new(0.0, 0.0)));
    }

    #[test]
    fn test_vehicle_side_channel() {
        let mut module = module(120, 80).with_vehicle_detector(Box::new(FixedDetector { calls: 0 }));
        let analysis = module.analyze(&frame(120, 80, 0)).unwrap();
        assert_eq!(analysis.vehicles, vec![BoundingBox::new(0, 0, 60, 40)]);
    }

    #[test]
    fn test_vehicle_detector_error_propagates() {
        let mut module = module(120, 80).with_vehicle_detector(Box::new(FailingDetector));
        let result = module.analyze(&frame(120, 80, 0));
        assert!(matches!(result, Err(LaneError::VehicleDetection(_))));
    }

    #[test]
    fn test_reseed() {
        let mut module = module(120, 80);
        module.analyze(&frame(120, 80, 0)).unwrap();
        module.reseed(PolarLine::new(10.0, 0.2), PolarLine::new(-10.0, 2.9));

        let analysis = module.analyze(&frame(120, 80, 1)).unwrap();
        assert!((analysis.lanes.left.line.rho - 10.0).abs() < 1e-4);
        assert!((analysis.lanes.right.line.theta - 2.9).abs() < 1e-4);
    }

    #[test]
    fn test_recalibrate_rejects_degenerate_points() {
        let mut module = module(120, 80);
        let same = [[5.0, 5.0]; 4];
        let result = module.recalibrate(CalibrationPointSet::new(same, same));
        assert!(matches!(result, Err(LaneError::Calibration(_))));
    }
}
