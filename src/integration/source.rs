//! Camera-side collaborator.

use std::time::Duration;

use crate::error::Result;
use crate::redaction::Frame;

/// Outcome of waiting for the next camera frame.
#[derive(Debug)]
pub enum Acquired {
    Frame(Frame),
    /// Nothing arrived within the wait bound; try again next iteration.
    TimedOut,
    /// The stream has ended.
    Exhausted,
}

/// Focus setting the source settled on during startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    /// Lens position from the device calibration
    Manual(u8),
    /// No calibrated position; the sensor keeps autofocus
    #[default]
    Auto,
}

/// Stream parameters handed to the source before the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Camera frame rate, already capped
    pub fps: u32,
    /// Side of the square image the source feeds the detector
    pub input_size: u32,
}

/// Yields fixed-size BGR frames.
pub trait FrameSource {
    /// Frame width and height in pixels.
    fn dimensions(&self) -> (usize, usize);

    /// Apply the stream parameters. Sources that cannot change their rate or
    /// detector input keep the default, which ignores them.
    fn configure(&mut self, _settings: StreamSettings) -> Result<()> {
        Ok(())
    }

    /// Read the device calibration and apply its focus. A missing
    /// calibration falls back to autofocus; a failed read is an error and
    /// aborts startup.
    fn calibrate(&mut self) -> Result<Focus> {
        Ok(Focus::Auto)
    }

    /// Wait at most `timeout` for the next frame.
    fn next_frame(&mut self, timeout: Duration) -> Result<Acquired>;
}
