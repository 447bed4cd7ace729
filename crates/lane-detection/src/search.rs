//! Candidate line search
//!
//! Finds lane-marker candidates in one rectified half-frame in two passes:
//! a coarse pass that intersects gated Hough lines with gated Hough
//! segments, and a strict pass over the edges of that intersection which
//! renders the final candidate image.

use std::f32::consts::PI;

use image::GrayImage;
use tracing::debug;

use crate::binarize::{adaptive_threshold, conjunction, threshold_inverted, ON};
use crate::config::{AdaptiveThresholdConfig, LaneConfig, SearchConfig, VoteSchedule};
use crate::draw::{draw_polar_line, draw_segment};
use crate::hough::{detect_segments, HoughAccumulator, PolarLine, SegmentParams};
use crate::side::SideProfile;

/// Result of an adaptive vote search
#[derive(Debug, Clone, PartialEq)]
pub struct VoteSearchOutcome {
    /// Lines from the last attempt, strongest first
    pub lines: Vec<PolarLine>,
    /// Threshold the next attempt would have used
    pub next_threshold: u32,
    /// Number of thresholds tried
    pub attempts: u32,
}

/// Lower the vote threshold from `schedule.start` by `schedule.step` until
/// at least `schedule.min_lines` lines are found or the threshold hits zero.
pub fn adaptive_line_search(accumulator: &HoughAccumulator, schedule: &VoteSchedule) -> VoteSearchOutcome {
    let step = schedule.step.max(1);
    let mut threshold = schedule.start;
    let mut lines = Vec::new();
    let mut attempts = 0;

    while lines.len() < schedule.min_lines && threshold > 0 {
        lines = accumulator.lines(threshold);
        threshold = threshold.saturating_sub(step);
        attempts += 1;
    }

    VoteSearchOutcome {
        lines,
        next_threshold: threshold,
        attempts,
    }
}

/// Two-pass candidate search over a rectified half-frame
#[derive(Debug, Clone)]
pub struct CandidateLineSearch {
    threshold: AdaptiveThresholdConfig,
    config: SearchConfig,
}

impl CandidateLineSearch {
    pub fn new(config: &LaneConfig) -> Self {
        Self {
            threshold: config.threshold,
            config: config.search,
        }
    }

    /// Produce the candidate-line image for one half-frame.
    ///
    /// The coarse lines and segments are drawn over copies of the half-frame
    /// itself; the strict pass draws on a blank canvas.
    pub fn run(&self, half: &GrayImage, profile: &SideProfile) -> GrayImage {
        let binary = adaptive_threshold(half, &self.threshold);

        let coarse = self.line_search(&binary, &self.config.coarse_votes);
        debug!(
            "{:?} coarse pass: {} lines after {} attempts",
            profile.side,
            coarse.lines.len(),
            coarse.attempts
        );
        let mut line_canvas = half.clone();
        self.draw_lines(&mut line_canvas, &coarse.lines, profile);

        let segments = detect_segments(&binary, &self.segment_params(coarse.next_threshold));
        debug!("{:?} segment pass: {} segments", profile.side, segments.len());
        let mut segment_canvas = half.clone();
        for segment in segments
            .iter()
            .take(self.config.max_drawn_lines)
            .filter(|s| profile.accepts_segment(s))
        {
            draw_segment(&mut segment_canvas, segment, self.config.line_thickness, ON);
        }

        let combined = conjunction(&line_canvas, &segment_canvas);
        let edges = adaptive_threshold(&threshold_inverted(&combined, self.config.invert_level), &self.threshold);

        let strict = self.line_search(&edges, &self.config.refine_votes);
        debug!(
            "{:?} strict pass: {} lines after {} attempts",
            profile.side,
            strict.lines.len(),
            strict.attempts
        );
        let mut candidates = GrayImage::new(half.width(), half.height());
        self.draw_lines(&mut candidates, &strict.lines, profile);
        candidates
    }

    fn line_search(&self, binary: &GrayImage, schedule: &VoteSchedule) -> VoteSearchOutcome {
        let accumulator = HoughAccumulator::build(
            binary,
            self.config.rho_resolution,
            self.config.theta_resolution_deg.to_radians(),
        );
        adaptive_line_search(&accumulator, schedule)
    }

    /// Draw the gated subset of the strongest lines
    fn draw_lines(&self, canvas: &mut GrayImage, lines: &[PolarLine], profile: &SideProfile) {
        for line in lines
            .iter()
            .take(self.config.max_drawn_lines)
            .filter(|l| profile.accepts_line(l))
        {
            draw_polar_line(canvas, line, self.config.line_thickness, ON);
        }
    }

    fn segment_params(&self, threshold: u32) -> SegmentParams {
        let segments = &self.config.segments;
        SegmentParams {
            rho_resolution: segments.rho_resolution,
            theta_resolution: segments.theta_resolution_deg.to_radians().min(PI),
            threshold: threshold.max(1),
            min_length: segments.min_length,
            max_gap: segments.max_gap,
            seed: segments.seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binarize::lit_pixels;
    use crate::draw::draw_thick_segment;
    use crate::side::LaneSide;
    use image::Luma;

    fn accumulator(image: &GrayImage) -> HoughAccumulator {
        HoughAccumulator::build(image, 1.0, PI / 180.0)
    }

    #[test]
    fn test_vote_search_exhausts_schedule() {
        let schedule = VoteSchedule::new(90, 10, 5);
        let outcome = adaptive_line_search(&accumulator(&GrayImage::new(40, 40)), &schedule);

        assert!(outcome.lines.is_empty());
        assert_eq!(outcome.attempts, schedule.max_attempts());
        assert_eq!(outcome.next_threshold, 0);
    }

    #[test]
    fn test_vote_search_stops_at_min_lines() {
        let mut image = GrayImage::new(120, 120);
        for x in [10, 30, 50, 70, 90, 110] {
            for y in 0..120 {
                image.put_pixel(x, y, Luma([255]));
            }
        }
        let outcome = adaptive_line_search(&accumulator(&image), &VoteSchedule::new(90, 10, 5));

        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.next_threshold, 80);
        assert!(outcome.lines.len() >= 5);
    }

    #[test]
    fn test_vote_search_never_exceeds_bound() {
        let mut image = GrayImage::new(60, 60);
        for y in 0..25 {
            image.put_pixel(30, y, Luma([255]));
        }
        let acc = accumulator(&image);
        for schedule in [VoteSchedule::new(90, 10, 5), VoteSchedule::new(14, 10, 5), VoteSchedule::new(7, 3, 1)] {
            let outcome = adaptive_line_search(&acc, &schedule);
            assert!(outcome.attempts <= schedule.max_attempts());
            assert!(outcome.lines.len() >= schedule.min_lines || outcome.next_threshold == 0);
        }
    }

    #[test]
    fn test_uniform_half_has_no_candidates() {
        let search = CandidateLineSearch::new(&LaneConfig::default());
        let half = GrayImage::from_pixel(80, 120, Luma([90]));
        let candidates = search.run(&half, &LaneSide::Left.profile());
        assert_eq!(lit_pixels(&candidates).count(), 0);
    }

    #[test]
    fn test_stripe_yields_candidates_along_it() {
        let mut config = LaneConfig::default();
        config.search.segments.min_length = 100.0;
        let search = CandidateLineSearch::new(&config);

        // marker drifting left towards the bottom: normal angle of about 8.5 degrees
        let mut half = GrayImage::from_pixel(240, 300, Luma([30]));
        draw_thick_segment(&mut half, (140.0, 0.0), (95.0, 300.0), 10, Luma([220]));

        let candidates = search.run(&half, &LaneSide::Left.profile());
        let row: Vec<u32> = (0..240).filter(|&x| candidates.get_pixel(x, 150)[0] == ON).collect();

        assert!(!row.is_empty());
        let centre = 117.5;
        assert!(row.iter().all(|&x| (x as f32 - centre).abs() < 40.0), "row 150: {:?}", row);
    }
}
