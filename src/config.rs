//! Runtime configuration for the redaction pipeline.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::error::{Error, Result};
use crate::integration::{CoordinateSpace, StreamSettings};
use crate::tracker::TrackerConfig;

/// Highest frame rate the color camera pipeline can sustain.
pub const MAX_FPS: u32 = 35;

/// Configuration for a full redaction run.
#[derive(Debug, Clone)]
pub struct RedactorConfig {
    /// Detector weights handed to the inference backend.
    pub model_path: PathBuf,
    /// Requested camera frame rate, capped at [`MAX_FPS`].
    pub fps: u32,
    /// Side of the square image fed to the detector.
    pub input_size: u32,
    /// Minimum detection confidence.
    pub confidence: f32,
    /// Spawn the keyboard listener that toggles redaction.
    pub keyboard: bool,
    /// Initial redaction state; kept as-is when no input controller runs.
    pub redact_by_default: bool,
    /// Coordinate space of the detector's boxes.
    pub coordinates: CoordinateSpace,
    /// Box filter kernel side in pixels.
    pub blur_kernel: usize,
    /// Stamp the measured frame rate into each frame.
    pub fps_overlay: bool,
    /// Longest wait for the next camera frame.
    pub frame_timeout: Duration,
    pub tracker: TrackerConfig,
}

impl Default for RedactorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./yolov8n-face_openvino_2022.1_6shave.blob"),
            fps: MAX_FPS,
            input_size: 256,
            confidence: 0.2,
            keyboard: false,
            redact_by_default: true,
            coordinates: CoordinateSpace::Normalized,
            blur_kernel: 60,
            fps_overlay: true,
            frame_timeout: Duration::from_secs(1),
            tracker: TrackerConfig::default(),
        }
    }
}

impl RedactorConfig {
    /// Checks every value the pipeline depends on. A missing model file is
    /// fatal; an over-limit frame rate is clamped by [`Self::effective_fps`].
    pub fn validate(&self) -> Result<()> {
        if !self.model_path.is_file() {
            return Err(Error::ModelNotFound(self.model_path.clone()));
        }
        if self.fps == 0 {
            return Err(Error::InvalidConfig("fps must be positive".into()));
        }
        if self.input_size == 0 {
            return Err(Error::InvalidConfig("detector input size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidConfig(format!(
                "confidence threshold {} outside [0, 1]",
                self.confidence
            )));
        }
        if self.blur_kernel == 0 {
            return Err(Error::InvalidConfig("blur kernel must be positive".into()));
        }
        self.tracker.validate()
    }

    pub fn effective_fps(&self) -> u32 {
        if self.fps > MAX_FPS {
            warn!(requested = self.fps, max = MAX_FPS, "frame rate capped");
            MAX_FPS
        } else {
            self.fps
        }
    }

    /// What the frame source is configured with at startup.
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            fps: self.effective_fps(),
            input_size: self.input_size,
        }
    }
}
