//! Camera Capture Library for the Lane Pipeline
//!
//! Provides the frame types consumed by lane perception and an ordered
//! frame source backed by a directory of still images.
//! Supports:
//! - RGB and 8-bit grayscale frames
//! - Grayscale conversion (ITU-R 601 luma)
//! - Recorded sequences (png / jpeg / bmp) delivered over a tokio channel

pub mod frame;
pub mod source;

pub use frame::{PixelFormat, VideoFrame};
pub use source::{list_frames, FrameSource};

use std::path::PathBuf;
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open source: {0}")]
    Open(String),

    #[error("Frame buffer size mismatch: expected {expected} bytes, got {actual}")]
    Buffer { expected: usize, actual: usize },
}

/// Frame source configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Directory holding the recorded frames
    pub directory: PathBuf,
    /// Nominal capture rate, used to stamp frames
    pub fps: u32,
    /// Decoded frames buffered ahead of the consumer
    pub queue_depth: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("frames"),
            fps: 30,
            queue_depth: 8,
        }
    }
}

impl SourceConfig {
    /// Source reading `directory` at the default rate
    pub fn directory(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    /// Frame period in nanoseconds
    pub fn frame_period_ns(&self) -> u64 {
        1_000_000_000 / u64::from(self.fps.max(1))
    }
}
