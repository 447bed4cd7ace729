//! Vehicle detection interface
//!
//! Vehicle detection is a side channel: detections are reported alongside
//! the lane result but never feed the lane pipeline. The classifier itself
//! lives outside this crate; anything that turns a grayscale frame into
//! boxes can be plugged in.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::LaneError;

/// Axis-aligned detection box in camera image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + (self.width / 2) as i32, self.y + (self.height / 2) as i32)
    }

    /// Semi-axes of the inscribed ellipse
    pub fn half_extent(&self) -> (i32, i32) {
        ((self.width / 2) as i32, (self.height / 2) as i32)
    }
}

/// Frame-level vehicle detector
pub trait VehicleDetector: Send {
    /// Detect vehicles in a histogram-equalized grayscale frame
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<BoundingBox>, LaneError>;
}
