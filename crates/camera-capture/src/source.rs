//! Ordered frame source over a directory of recorded images

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::frame::VideoFrame;
use crate::{CameraError, SourceConfig};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// List decodable frame files in `dir`, sorted by file name
pub fn list_frames(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, CameraError> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CameraError::Open(format!("{}: {}", dir.display(), e)))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| CameraError::Open(e.to_string()))?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_frame && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Async frame source for tokio
///
/// Frames are decoded on a dedicated thread and delivered strictly in file
/// name order. Files that fail to decode are skipped.
pub struct FrameSource {
    receiver: mpsc::Receiver<VideoFrame>,
    total: usize,
}

impl FrameSource {
    /// Spawn the decoder thread for `config.directory`
    pub fn spawn(config: SourceConfig) -> Result<Self, CameraError> {
        let paths = list_frames(&config.directory)?;
        if paths.is_empty() {
            return Err(CameraError::Open(format!(
                "no frames found in {}",
                config.directory.display()
            )));
        }

        info!(
            "Opening frame source {} ({} frames @ {} fps)",
            config.directory.display(),
            paths.len(),
            config.fps
        );

        let total = paths.len();
        let period_ns = config.frame_period_ns();
        let (tx, rx) = mpsc::channel::<VideoFrame>(config.queue_depth.max(1));

        std::thread::spawn(move || {
            for (index, path) in paths.into_iter().enumerate() {
                let image = match image::open(&path) {
                    Ok(image) => image,
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                };

                let frame = VideoFrame::from_dynamic(image, index as u64 * period_ns, index as u32);
                if tx.blocking_send(frame).is_err() {
                    debug!("Frame receiver dropped");
                    break;
                }
            }
            debug!("Frame source exhausted");
        });

        Ok(Self { receiver: rx, total })
    }

    /// Receive the next frame; `None` once the sequence is exhausted
    pub async fn next(&mut self) -> Option<VideoFrame> {
        self.receiver.recv().await
    }

    /// Number of frame files discovered at spawn time
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}
