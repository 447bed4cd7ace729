//! Lane detection
//!
//! [`LaneDetector`] runs the per-frame sequence:
//!
//! 1. grayscale, then rectify to the bird's-eye plane
//! 2. split into left / right halves
//! 3. per half: candidate line search, then robust estimate
//! 4. predict both trackers, correct the sides that produced an estimate
//! 5. per side: take the estimate, or the prediction when there is none
//! 6. intersect with the first / last rectified row, shift into full-frame
//!    columns and map back into the camera image

use camera_capture::frame::VideoFrame;
use image::imageops::crop_imm;
use image::GrayImage;
use nalgebra::Point2;
use tracing::{debug, info};

use crate::analysis::{LaneAnalysis, LineSource, SideResult};
use crate::estimator::{LaneEstimate, RobustLineEstimator};
use crate::hough::PolarLine;
use crate::ipm::{invalid_point, CalibrationPointSet, MapDirection, PerspectiveRectifier};
use crate::search::CandidateLineSearch;
use crate::side::{LaneSide, SidePair, SideProfile};
use crate::tracker::{LaneTracker, SideTrackers};
use crate::{LaneConfig, LaneError};

/// Lane detector for frames of one fixed size
pub struct LaneDetector {
    config: LaneConfig,
    rectifier: PerspectiveRectifier,
    search: CandidateLineSearch,
    estimator: RobustLineEstimator,
    tracker: LaneTracker,
}

impl LaneDetector {
    /// Validate `points` and build the detector for `frame_size` frames.
    /// The rectified plane has the same size as the frame.
    pub fn new(frame_size: (u32, u32), points: CalibrationPointSet, config: &LaneConfig) -> Result<Self, LaneError> {
        info!("Creating lane detector for {}x{} frames", frame_size.0, frame_size.1);
        points.validate()?;

        Ok(Self {
            rectifier: PerspectiveRectifier::new(frame_size, frame_size, points, config.border_value),
            search: CandidateLineSearch::new(config),
            estimator: RobustLineEstimator::new(config),
            tracker: LaneTracker::new(&config.tracker),
            config: config.clone(),
        })
    }

    /// Replace the calibration; tracker states are left alone
    pub fn recalibrate(&mut self, points: CalibrationPointSet) -> Result<(), LaneError> {
        points.validate()?;
        info!("Recalibrating: source quad {:?}", points.source);
        let size = self.rectifier.original_size();
        self.rectifier = PerspectiveRectifier::new(size, size, points, self.config.border_value);
        Ok(())
    }

    pub fn config(&self) -> &LaneConfig {
        &self.config
    }

    pub fn rectifier(&self) -> &PerspectiveRectifier {
        &self.rectifier
    }

    pub fn tracker(&self) -> &LaneTracker {
        &self.tracker
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.rectifier.original_size()
    }

    /// Per-side estimates of one grayscale frame, without tracking
    pub fn detect(&self, gray: &GrayImage) -> Result<SidePair<LaneEstimate>, LaneError> {
        let rectified = self.rectifier.rectify(gray)?;
        let (width, height) = rectified.dimensions();

        let estimate = |side: LaneSide| {
            let profile = side.profile();
            let (x, w) = profile.half_span(width);
            let half = crop_imm(&rectified, x, 0, w, height).to_image();
            let candidates = self.search.run(&half, &profile);
            self.estimator.estimate(&candidates)
        };

        Ok(SidePair::new(estimate(LaneSide::Left), estimate(LaneSide::Right)))
    }

    /// Process one frame, updating `trackers` in place
    pub fn process(&self, frame: &VideoFrame, trackers: &mut SideTrackers) -> Result<LaneAnalysis, LaneError> {
        self.process_gray(&frame.to_gray_image(), trackers)
    }

    pub fn process_gray(&self, gray: &GrayImage, trackers: &mut SideTrackers) -> Result<LaneAnalysis, LaneError> {
        let estimates = self.detect(gray)?;

        let predictions = SidePair::new(
            self.tracker.predict(&mut trackers.left),
            self.tracker.predict(&mut trackers.right),
        );
        for side in LaneSide::BOTH {
            if let Some(measured) = estimates.get(side) {
                self.tracker.correct(trackers.get_mut(side), *measured);
            }
        }

        let results = estimates.map(|side, estimate| self.resolve(side, estimate, *predictions.get(side)));
        Ok(LaneAnalysis {
            left: results.left,
            right: results.right,
        })
    }

    fn resolve(&self, side: LaneSide, estimate: LaneEstimate, predicted: PolarLine) -> SideResult {
        let (source, line) = match estimate {
            Some(line) => (LineSource::Measured, line),
            None => (LineSource::Predicted, predicted),
        };
        debug!("{:?} lane: {:?} line {:?}", side, source, line);

        SideResult {
            source,
            line,
            endpoints: self.endpoints(&side.profile(), &line),
        }
    }

    /// Camera-image endpoints of a half-frame line
    fn endpoints(&self, profile: &SideProfile, line: &PolarLine) -> [[f32; 2]; 2] {
        let (width, height) = self.rectifier.rectified_size();
        let offset = profile.x_offset(width);

        let Some(crossings) = line.row_intersections(height) else {
            let invalid = invalid_point();
            return [[invalid.x as f32, invalid.y as f32]; 2];
        };

        crossings.map(|(x, y)| {
            let rectified = Point2::new(f64::from(x + offset), f64::from(y));
            let p = self
                .rectifier
                .map_point(rectified, MapDirection::Inverse)
                .unwrap_or_else(invalid_point);
            [p.x as f32, p.y as f32]
        })
    }
}
