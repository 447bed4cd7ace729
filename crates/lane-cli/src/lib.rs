//! Lane pipeline runner
//!
//! Loads [`Settings`], streams frames from a directory through the
//! [`PerceptionModule`] and writes one JSON record per frame.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use camera_capture::{FrameSource, SourceConfig, VideoFrame};
use config::{Config, Environment, File};
use lane_detection::analysis::{LineSource, PerceptionAnalysis};
use lane_detection::overlay::{draw_calibration, draw_lanes, draw_vehicles};
use lane_detection::{CalibrationPointSet, LaneConfig, LaneError, PerceptionModule};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Settings file read when no path is given on the command line
pub const DEFAULT_SETTINGS_PATH: &str = "lane-pipeline.toml";

/// Runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory of recorded frames, processed in file name order
    pub input_dir: PathBuf,
    /// Write annotated frames here when set
    pub overlay_dir: Option<PathBuf>,
    /// Camera calibration; the default road calibration when unset
    pub calibration: Option<CalibrationPointSet>,
    pub fps: u32,
    pub queue_depth: usize,
    pub log_level: String,
    pub lane: LaneConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("frames"),
            overlay_dir: None,
            calibration: None,
            fps: 30,
            queue_depth: 8,
            log_level: "info".to_string(),
            lane: LaneConfig::default(),
        }
    }
}

impl Settings {
    /// Load from an optional TOML file, overridden by `LANE__*` variables
    /// (`LANE__FPS`, `LANE__LANE__TRACKER__PROCESS_NOISE`, ...)
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(Environment::with_prefix("LANE").separator("__").try_parsing(true))
            .build()
            .with_context(|| format!("reading settings from {}", path.display()))?
            .try_deserialize()
            .context("invalid settings")?;
        Ok(settings)
    }

    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            directory: self.input_dir.clone(),
            fps: self.fps,
            queue_depth: self.queue_depth,
        }
    }
}

/// Install the stderr log subscriber; stdout carries frame records
pub fn init_logging(level: &str) -> anyhow::Result<()> {
    let level = level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")
}

/// One output line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub sequence: u32,
    pub points: [f32; 8],
    pub left: LineSource,
    pub right: LineSource,
    pub vehicles: usize,
}

impl From<&PerceptionAnalysis> for FrameRecord {
    fn from(analysis: &PerceptionAnalysis) -> Self {
        Self {
            sequence: analysis.sequence,
            points: analysis.lanes.to_points(),
            left: analysis.lanes.left.source,
            right: analysis.lanes.right.source,
            vehicles: analysis.vehicles.len(),
        }
    }
}

/// Run the pipeline over `settings.input_dir`, writing records to stdout
pub async fn run(settings: &Settings) -> anyhow::Result<usize> {
    // locked per write, never held across an await
    let mut out = std::io::stdout();
    run_with_writer(settings, &mut out).await
}

/// Run the pipeline, writing one JSON record per processed frame to `out`.
/// Returns the number of frames processed.
pub async fn run_with_writer<W: Write>(settings: &Settings, out: &mut W) -> anyhow::Result<usize> {
    let mut source = FrameSource::spawn(settings.source_config())?;
    if let Some(dir) = &settings.overlay_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let Some(first) = source.next().await else {
        bail!("no decodable frames in {}", settings.input_dir.display());
    };
    let (width, height) = first.dimensions();
    let points = settings
        .calibration
        .unwrap_or_else(|| CalibrationPointSet::default_for(width, height));
    let mut module = PerceptionModule::new((width, height), points, &settings.lane)?;
    info!("Processing {} frames at {}x{}", source.len(), width, height);

    let mut processed = 0;
    let mut next = Some(first);
    while let Some(frame) = next {
        match module.analyze(&frame) {
            Ok(analysis) => {
                serde_json::to_writer(&mut *out, &FrameRecord::from(&analysis))?;
                writeln!(out)?;
                if let Some(dir) = &settings.overlay_dir {
                    write_overlay(dir, &frame, &analysis, &points)?;
                }
                processed += 1;
            }
            Err(e @ LaneError::InvalidFrame { .. }) => warn!("Skipping frame {}: {}", frame.sequence, e),
            Err(e) => return Err(e.into()),
        }
        next = source.next().await;
    }

    out.flush()?;
    info!("Processed {} frames", processed);
    Ok(processed)
}

fn write_overlay(
    dir: &Path,
    frame: &VideoFrame,
    analysis: &PerceptionAnalysis,
    points: &CalibrationPointSet,
) -> anyhow::Result<()> {
    let mut image = frame.to_rgb_image();
    draw_calibration(&mut image, points);
    draw_lanes(&mut image, &analysis.lanes);
    draw_vehicles(&mut image, &analysis.vehicles);

    let path = dir.join(format!("frame_{:06}.png", frame.sequence));
    image
        .save(&path)
        .with_context(|| format!("writing overlay {}", path.display()))
}
