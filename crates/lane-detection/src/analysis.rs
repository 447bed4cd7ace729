//! Per-frame perception results

use serde::{Deserialize, Serialize};

use crate::hough::PolarLine;
use crate::object::BoundingBox;
use crate::side::LaneSide;

/// Where a side's output line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSource {
    /// Estimated from this frame
    Measured,
    /// Tracker prediction, no estimate this frame
    Predicted,
}

/// Output line of one lane side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideResult {
    pub source: LineSource,

    /// Line in rectified half-frame coordinates
    pub line: PolarLine,

    /// Crossings with the first and last rectified row, mapped back to the
    /// camera image; `[-1, -1]` where a point cannot be mapped
    pub endpoints: [[f32; 2]; 2],
}

impl SideResult {
    pub fn is_measured(&self) -> bool {
        self.source == LineSource::Measured
    }
}

/// Lane result of one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneAnalysis {
    pub left: SideResult,
    pub right: SideResult,
}

impl LaneAnalysis {
    pub fn side(&self, side: LaneSide) -> &SideResult {
        match side {
            LaneSide::Left => &self.left,
            LaneSide::Right => &self.right,
        }
    }

    /// `[lx1, ly1, lx2, ly2, rx1, ry1, rx2, ry2]` in camera image coordinates
    pub fn to_points(&self) -> [f32; 8] {
        let [[lx1, ly1], [lx2, ly2]] = self.left.endpoints;
        let [[rx1, ry1], [rx2, ry2]] = self.right.endpoints;
        [lx1, ly1, lx2, ly2, rx1, ry1, rx2, ry2]
    }
}

/// Complete perception result of one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerceptionAnalysis {
    /// Frame sequence number
    pub sequence: u32,

    /// Lane lines
    pub lanes: LaneAnalysis,

    /// Vehicle detections, empty without a detector
    pub vehicles: Vec<BoundingBox>,
}

impl PerceptionAnalysis {
    /// Number of sides that fell back to the tracker prediction
    pub fn predicted_sides(&self) -> usize {
        LaneSide::BOTH
            .iter()
            .filter(|&&side| !self.lanes.side(side).is_measured())
            .count()
    }
}
