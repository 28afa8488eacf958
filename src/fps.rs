//! Running throughput measurement for the diagnostic overlay.

use std::time::Instant;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct FrameRateMonitor {
    start: Instant,
    last: Instant,
    frames: u64,
}

impl Default for FrameRateMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameRateMonitor {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            start,
            last: start,
            frames: 0,
        }
    }

    /// Count one processed frame.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.last = now;
        self.frames += 1;
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames per second between the start and the last tick, or 0 when no
    /// time has elapsed.
    pub fn fps(&self) -> f64 {
        let elapsed = self.last.saturating_duration_since(self.start).as_secs_f64();
        if elapsed == 0.0 {
            warn!(frames = self.frames, "no time elapsed; reporting 0 fps");
            return 0.0;
        }
        self.frames as f64 / elapsed
    }
}
