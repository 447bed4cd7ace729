//! Lane side profiles
//!
//! Everything that differs between the left and right lane marker lives in
//! a [`SideProfile`]; the search, estimation and output code is written
//! once against the profile.

use serde::{Deserialize, Serialize};

use crate::hough::{LineSegment, PolarLine};

/// Which half of the frame a marker is searched in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneSide {
    Left,
    Right,
}

impl LaneSide {
    pub const BOTH: [LaneSide; 2] = [LaneSide::Left, LaneSide::Right];

    pub fn profile(self) -> SideProfile {
        match self {
            LaneSide::Left => SideProfile {
                side: self,
                polar_gate: (0.0, 45.0),
                segment_gate: (90.0, 180.0),
            },
            LaneSide::Right => SideProfile {
                side: self,
                polar_gate: (135.0, 180.0),
                segment_gate: (-180.0, -90.0),
            },
        }
    }
}

/// Angle gates and placement of one lane side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideProfile {
    pub side: LaneSide,
    /// Accepted normal angles of polar lines, degrees, inclusive
    pub polar_gate: (f32, f32),
    /// Accepted segment directions (see [`LineSegment::angle_degrees`]),
    /// degrees, inclusive
    pub segment_gate: (f32, f32),
}

impl SideProfile {
    pub fn accepts_line(&self, line: &PolarLine) -> bool {
        within(line.theta_degrees(), self.polar_gate)
    }

    pub fn accepts_segment(&self, segment: &LineSegment) -> bool {
        within(segment.angle_degrees(), self.segment_gate)
    }

    /// Column span `(x, width)` of this side's half in a frame `frame_width` wide
    pub fn half_span(&self, frame_width: u32) -> (u32, u32) {
        let split = frame_width / 2;
        match self.side {
            LaneSide::Left => (0, split),
            LaneSide::Right => (split, frame_width - split),
        }
    }

    /// Horizontal offset from half-frame to full-frame coordinates
    pub fn x_offset(&self, frame_width: u32) -> f32 {
        self.half_span(frame_width).0 as f32
    }
}

fn within(value: f32, (low, high): (f32, f32)) -> bool {
    value >= low && value <= high
}

/// One value per lane side
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SidePair<T> {
    pub left: T,
    pub right: T,
}

impl<T> SidePair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn get(&self, side: LaneSide) -> &T {
        match side {
            LaneSide::Left => &self.left,
            LaneSide::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, side: LaneSide) -> &mut T {
        match side {
            LaneSide::Left => &mut self.left,
            LaneSide::Right => &mut self.right,
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(LaneSide, T) -> U) -> SidePair<U> {
        SidePair {
            left: f(LaneSide::Left, self.left),
            right: f(LaneSide::Right, self.right),
        }
    }
}
