//! Collaborators around the tracking core: where frames and detections come
//! from, where finished frames go, and how the user toggles redaction.

mod detector;
mod display;
mod input;
mod pipeline;
pub mod replay;
mod source;

pub use detector::{CoordinateSpace, DetectionNormalizer, DetectionSource, RawDetection};
pub use display::{Control, Display, FrameStatus};
pub use input::{InputController, InputEvent, RedactionSwitch, StopSignal, spawn_listener};
pub use pipeline::{ProcessedFrame, RedactionPipeline, RunSummary};
pub use source::{Acquired, Focus, FrameSource, StreamSettings};
