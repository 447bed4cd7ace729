//! Lane pipeline configuration

use serde::{Deserialize, Serialize};

/// Complete lane pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneConfig {
    /// Adaptive binarization used by the candidate search
    pub threshold: AdaptiveThresholdConfig,

    /// Two-pass candidate line search
    pub search: SearchConfig,

    /// Strata sampling and robust fit
    pub estimator: EstimatorConfig,

    /// Per-side tracking filter noise
    pub tracker: TrackerConfig,

    /// Fill value for pixels that warp from outside the source image
    pub border_value: u8,
}

/// Gaussian adaptive threshold parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveThresholdConfig {
    /// Neighbourhood size (odd, pixels)
    pub block_size: u32,

    /// Subtracted from the neighbourhood mean; negative values demand
    /// pixels brighter than the mean
    pub offset: f32,
}

impl Default for AdaptiveThresholdConfig {
    fn default() -> Self {
        Self {
            block_size: 15,
            offset: -5.0,
        }
    }
}

impl AdaptiveThresholdConfig {
    /// Gaussian sigma implied by the block size
    pub fn sigma(&self) -> f32 {
        let half = (self.block_size.max(1) as f32 - 1.0) * 0.5;
        (0.3 * (half - 1.0) + 0.8).max(0.1)
    }
}

/// Decreasing vote threshold for the adaptive line search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteSchedule {
    /// First threshold tried
    pub start: u32,

    /// Decrement between attempts
    pub step: u32,

    /// Stop once at least this many lines are found
    pub min_lines: usize,
}

impl VoteSchedule {
    pub fn new(start: u32, step: u32, min_lines: usize) -> Self {
        Self { start, step, min_lines }
    }

    /// Upper bound on search attempts
    pub fn max_attempts(&self) -> u32 {
        self.start.div_ceil(self.step.max(1))
    }
}

/// Probabilistic segment search parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Distance resolution (pixels)
    pub rho_resolution: f32,

    /// Angle resolution (degrees)
    pub theta_resolution_deg: f32,

    /// Minimum segment extent (pixels)
    pub min_length: f32,

    /// Largest bridged gap (pixels)
    pub max_gap: u32,

    /// Pixel visiting order seed
    pub seed: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            rho_resolution: 2.5,
            theta_resolution_deg: 1.0,
            min_length: 200.0,
            max_gap: 30,
            seed: 0x4c41_4e45,
        }
    }
}

/// Candidate line search parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Vote schedule of the first deterministic pass
    pub coarse_votes: VoteSchedule,

    /// Vote schedule of the strict pass over the combined image
    pub refine_votes: VoteSchedule,

    /// Distance resolution of the deterministic passes (pixels)
    pub rho_resolution: f32,

    /// Angle resolution of the deterministic passes (degrees)
    pub theta_resolution_deg: f32,

    /// Segment search over the binarized half-frame
    pub segments: SegmentConfig,

    /// Only the strongest lines / segments are drawn
    pub max_drawn_lines: usize,

    /// Stroke width of drawn lines (pixels)
    pub line_thickness: u32,

    /// Level above which the combined image is treated as lit before
    /// inversion
    pub invert_level: u8,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            coarse_votes: VoteSchedule::new(90, 10, 5),
            refine_votes: VoteSchedule::new(14, 10, 5),
            rho_resolution: 1.0,
            theta_resolution_deg: 1.0,
            segments: SegmentConfig::default(),
            max_drawn_lines: 10,
            line_thickness: 8,
            invert_level: 150,
        }
    }
}

/// Huber line fit tolerances
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HuberConfig {
    /// Residual beyond which points are down-weighted (pixels)
    pub c: f64,

    /// Convergence tolerance on the fitted point (pixels)
    pub reps: f64,

    /// Convergence tolerance on the fitted direction (radians)
    pub aeps: f64,

    /// Reweighting rounds
    pub max_iterations: usize,
}

impl Default for HuberConfig {
    fn default() -> Self {
        Self {
            c: 1.345,
            reps: 0.01,
            aeps: 0.01,
            max_iterations: 30,
        }
    }
}

/// Robust line estimator parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Number of sampling strata
    pub strata: u32,

    /// Robust fit tolerances
    pub huber: HuberConfig,

    /// Vote schedule of the search over the best-fit image
    pub votes: VoteSchedule,

    /// Stroke width of the rendered best-fit line (pixels)
    pub line_thickness: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            strata: 30,
            huber: HuberConfig::default(),
            votes: VoteSchedule::new(90, 10, 5),
            line_thickness: 8,
        }
    }
}

/// Tracking filter noise parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Diagonal process noise
    pub process_noise: f64,

    /// Diagonal measurement noise
    pub measurement_noise: f64,

    /// Diagonal initial error covariance
    pub initial_error: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            process_noise: 0.005,
            measurement_noise: 0.1,
            initial_error: 0.1,
        }
    }
}

impl TrackerConfig {
    /// Filter that never drifts on its own: predictions repeat the state
    pub fn frozen() -> Self {
        Self {
            process_noise: 0.0,
            ..Default::default()
        }
    }
}
