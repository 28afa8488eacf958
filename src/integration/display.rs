//! Output-side collaborator.

use crate::error::Result;
use crate::redaction::Frame;
use crate::tracker::TrackedObject;

/// Per-frame diagnostics handed to the display with the finished frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStatus {
    /// 1-based index of the frame in this run
    pub frame_index: u64,
    pub fps: f64,
    pub redacting: bool,
    /// Confirmed tracks drawn on this frame
    pub tracks: Vec<TrackedObject>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// Receives finished frames; may ask the loop to stop.
pub trait Display {
    fn present(&mut self, frame: Frame, status: &FrameStatus) -> Result<Control>;

    /// Called once after the loop ends.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
