//! Live face redaction built on SORT-style multi-object tracking.
//!
//! Detections from any detector are normalised into frame pixels, associated
//! with persistent tracks through a constant-velocity Kalman filter and an
//! optimal IoU assignment, and the confirmed tracks are blurred in place.

pub mod config;
pub mod error;
pub mod fps;
pub mod integration;
pub mod overlay;
pub mod redaction;
pub mod tracker;

pub use config::RedactorConfig;
pub use error::{Error, Result};
pub use fps::FrameRateMonitor;
pub use integration::{
    Acquired, Control, CoordinateSpace, DetectionNormalizer, DetectionSource, Display, Focus,
    FrameSource, FrameStatus, InputController, InputEvent, ProcessedFrame, RawDetection,
    RedactionPipeline, RedactionSwitch, RunSummary, StopSignal, StreamSettings,
};
pub use overlay::FpsOverlay;
pub use redaction::{BlurRenderer, Frame, PixelRegion};
pub use tracker::{
    Color, Detection, Rect, SortTracker, TrackId, TrackState, TrackedObject, TrackerConfig,
};
