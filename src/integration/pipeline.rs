//! RedactionPipeline: the per-frame loop tying detection, tracking and
//! redaction together.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    Acquired, Control, DetectionNormalizer, DetectionSource, Display, Focus, FrameSource,
    FrameStatus, RawDetection, RedactionSwitch, StopSignal, StreamSettings,
};
use crate::config::RedactorConfig;
use crate::error::Result;
use crate::fps::FrameRateMonitor;
use crate::overlay::FpsOverlay;
use crate::redaction::{BlurRenderer, Frame};
use crate::tracker::{SortTracker, TrackedObject};

/// Totals reported when a run ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub fps: f64,
}

/// Result of tracking and redacting one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFrame {
    /// Confirmed tracks after this frame's update
    pub tracks: Vec<TrackedObject>,
    /// Switch state the frame was rendered with
    pub redacting: bool,
    /// Regions actually blurred
    pub blurred: usize,
}

/// Single-threaded redaction loop over a frame source, a detection source
/// and a display.
///
/// Each frame is fully processed (normalize, predict, assign, update,
/// redact, display) before the next one is pulled.
pub struct RedactionPipeline<F, D, P> {
    frames: F,
    detections: D,
    display: P,
    normalizer: DetectionNormalizer,
    tracker: SortTracker,
    renderer: BlurRenderer,
    overlay: Option<FpsOverlay>,
    fps: FrameRateMonitor,
    settings: StreamSettings,
    switch: RedactionSwitch,
    stop: StopSignal,
    frame_timeout: Duration,
    frame_index: u64,
}

impl<F, D, P> RedactionPipeline<F, D, P>
where
    F: FrameSource,
    D: DetectionSource,
    P: Display,
{
    pub fn new(config: &RedactorConfig, frames: F, detections: D, display: P) -> Self {
        let (width, height) = frames.dimensions();
        Self {
            normalizer: DetectionNormalizer::new(width, height, config.coordinates, config.confidence),
            tracker: SortTracker::new(config.tracker.clone()),
            renderer: BlurRenderer::new(config.blur_kernel),
            overlay: config.fps_overlay.then(FpsOverlay::default),
            fps: FrameRateMonitor::new(),
            settings: config.stream_settings(),
            switch: RedactionSwitch::new(config.redact_by_default),
            stop: StopSignal::new(),
            frame_timeout: config.frame_timeout,
            frame_index: 0,
            frames,
            detections,
            display,
        }
    }

    /// Flag shared with an input listener.
    pub fn switch(&self) -> &RedactionSwitch {
        &self.switch
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn tracker(&self) -> &SortTracker {
        &self.tracker
    }

    pub fn display(&self) -> &P {
        &self.display
    }

    /// Configure the source and apply the device calibration. Errors here
    /// are fatal.
    pub fn start(&mut self) -> Result<Focus> {
        self.frames.configure(self.settings)?;
        debug!(
            fps = self.settings.fps,
            input_size = self.settings.input_size,
            "source configured"
        );
        let focus = self.frames.calibrate()?;
        match focus {
            Focus::Manual(position) => info!(position, "manual focus from calibration"),
            Focus::Auto => info!("no calibrated lens position; keeping autofocus"),
        }
        Ok(focus)
    }

    /// Track and redact one frame in place. The switch is read once, so the
    /// returned state is the one the frame was rendered with.
    pub fn process_frame(
        &mut self,
        frame: &mut Frame,
        raw: Option<&[RawDetection]>,
    ) -> ProcessedFrame {
        let detections = self.normalizer.normalize(raw);
        let tracks = self.tracker.update(&detections);

        let redacting = self.switch.is_enabled();
        let blurred = self.renderer.render(frame, tracks.iter().map(|t| &t.bbox), redacting);
        debug!(
            detections = detections.len(),
            confirmed = tracks.len(),
            blurred,
            "frame processed"
        );
        ProcessedFrame {
            tracks,
            redacting,
            blurred,
        }
    }

    /// Run until the source is exhausted, the display asks to quit or a
    /// stop is requested. A frame in progress always completes.
    pub fn run(&mut self) -> Result<RunSummary> {
        self.start()?;

        while !self.stop.is_requested() {
            let mut frame = match self.frames.next_frame(self.frame_timeout)? {
                Acquired::Frame(frame) => frame,
                Acquired::TimedOut => {
                    debug!("no frame within {:?}", self.frame_timeout);
                    continue;
                }
                Acquired::Exhausted => {
                    info!("frame source exhausted");
                    break;
                }
            };

            let raw = match self.detections.poll() {
                Ok(raw) => raw,
                Err(err) => {
                    warn!(%err, "detection poll failed; treating frame as empty");
                    None
                }
            };

            let processed = self.process_frame(&mut frame, raw.as_deref());
            self.frame_index += 1;
            self.fps.tick();
            let fps = self.fps.fps();
            if let Some(overlay) = &self.overlay {
                overlay.draw(&mut frame, fps);
            }

            let status = FrameStatus {
                frame_index: self.frame_index,
                fps,
                redacting: processed.redacting,
                tracks: processed.tracks,
            };
            if self.display.present(frame, &status)? == Control::Quit {
                info!("quit requested by display");
                break;
            }
        }

        self.display.finish()?;
        Ok(RunSummary {
            frames: self.frame_index,
            fps: self.fps.fps(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerConfig;
    use std::collections::VecDeque;
    use std::convert::Infallible;

    const W: usize = 64;
    const H: usize = 48;

    struct Frames(usize);

    impl FrameSource for Frames {
        fn dimensions(&self) -> (usize, usize) {
            (W, H)
        }

        fn next_frame(&mut self, _timeout: Duration) -> Result<Acquired> {
            if self.0 == 0 {
                return Ok(Acquired::Exhausted);
            }
            self.0 -= 1;
            Ok(Acquired::Frame(source_frame()))
        }
    }

    struct Detections(VecDeque<Option<Vec<RawDetection>>>);

    impl DetectionSource for Detections {
        type Error = Infallible;

        fn poll(&mut self) -> std::result::Result<Option<Vec<RawDetection>>, Infallible> {
            Ok(self.0.pop_front().flatten())
        }
    }

    fn source_frame() -> Frame {
        Frame::from_bgr(W, H, (0..W * H * 3).map(|i| (i % 256) as u8).collect()).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        frames: Vec<Frame>,
        statuses: Vec<FrameStatus>,
        quit_after: Option<usize>,
        finished: bool,
    }

    impl Display for Recorder {
        fn present(&mut self, frame: Frame, status: &FrameStatus) -> Result<Control> {
            self.frames.push(frame);
            self.statuses.push(status.clone());
            match self.quit_after {
                Some(n) if self.statuses.len() >= n => Ok(Control::Quit),
                _ => Ok(Control::Continue),
            }
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn face() -> RawDetection {
        RawDetection {
            xmin: 0.25,
            ymin: 0.25,
            xmax: 0.5,
            ymax: 0.5,
            confidence: 0.9,
            label: 0,
        }
    }

    fn config(min_hits: u32) -> RedactorConfig {
        RedactorConfig {
            blur_kernel: 5,
            tracker: TrackerConfig {
                min_hits,
                ..TrackerConfig::default()
            },
            ..RedactorConfig::default()
        }
    }

    #[test]
    fn test_run_until_exhausted() {
        let detections = Detections(VecDeque::from([
            Some(vec![face()]),
            None,
            Some(vec![face()]),
            Some(vec![face()]),
        ]));
        let mut pipeline =
            RedactionPipeline::new(&config(1), Frames(4), detections, Recorder::default());
        let summary = pipeline.run().unwrap();

        assert_eq!(summary.frames, 4);
        let statuses = &pipeline.display().statuses;
        assert_eq!(statuses.len(), 4);
        // The confirmed track coasts through the frame without a result.
        assert!(statuses.iter().all(|s| s.tracks.len() == 1));
        assert!(statuses.iter().all(|s| s.tracks[0].id == statuses[0].tracks[0].id));
        assert!(pipeline.display().finished);
    }

    struct Uncalibrated;

    impl FrameSource for Uncalibrated {
        fn dimensions(&self) -> (usize, usize) {
            (W, H)
        }

        fn calibrate(&mut self) -> Result<Focus> {
            Err(crate::error::Error::Calibration("EEPROM unreadable".into()))
        }

        fn next_frame(&mut self, _timeout: Duration) -> Result<Acquired> {
            Ok(Acquired::Frame(Frame::new(W, H)))
        }
    }

    #[test]
    fn test_calibration_failure_is_fatal() {
        let detections = Detections(VecDeque::new());
        let mut pipeline =
            RedactionPipeline::new(&config(1), Uncalibrated, detections, Recorder::default());
        assert!(pipeline.run().is_err());
        assert!(pipeline.display().statuses.is_empty());
    }

    #[test]
    fn test_display_quit() {
        let detections = Detections(VecDeque::new());
        let display = Recorder {
            quit_after: Some(2),
            ..Recorder::default()
        };
        let mut pipeline = RedactionPipeline::new(&config(1), Frames(10), detections, display);
        assert_eq!(pipeline.run().unwrap().frames, 2);
    }

    #[test]
    fn test_stop_signal() {
        let detections = Detections(VecDeque::new());
        let mut pipeline =
            RedactionPipeline::new(&config(1), Frames(10), detections, Recorder::default());
        pipeline.stop_signal().request();
        assert_eq!(pipeline.run().unwrap().frames, 0);
    }

    #[test]
    fn test_switch_controls_blur() {
        let detections = Detections(VecDeque::new());
        let mut pipeline =
            RedactionPipeline::new(&config(1), Frames(0), detections, Recorder::default());
        let original = source_frame();

        pipeline.switch().set(false);
        let mut frame = original.clone();
        let processed = pipeline.process_frame(&mut frame, Some(&[face()]));
        assert_eq!(processed.tracks.len(), 1);
        assert!(!processed.redacting);
        assert_eq!(processed.blurred, 0);
        assert_eq!(frame, original);

        pipeline.switch().set(true);
        let mut frame = original.clone();
        let processed = pipeline.process_frame(&mut frame, Some(&[face()]));
        assert!(processed.redacting);
        assert_eq!(processed.blurred, 1);
        assert_ne!(frame, original);
    }

    #[test]
    fn test_fps_overlay_drawn() {
        let mut pipeline = RedactionPipeline::new(
            &config(1),
            Frames(1),
            Detections(VecDeque::new()),
            Recorder::default(),
        );
        pipeline.run().unwrap();

        let original = source_frame();
        let presented = &pipeline.display().frames[0];
        let fps = pipeline.display().statuses[0].fps;
        let region = FpsOverlay::default()
            .region(&FpsOverlay::label(fps), W, H)
            .unwrap();
        assert_ne!(presented, &original);
        for ((y, x, c), &value) in presented.pixels().indexed_iter() {
            if !((region.y0..region.y1).contains(&y) && (region.x0..region.x1).contains(&x)) {
                assert_eq!(value, original.pixels()[[y, x, c]]);
            }
        }

        let quiet = RedactorConfig {
            fps_overlay: false,
            ..config(1)
        };
        let detections = Detections(VecDeque::new());
        let mut pipeline =
            RedactionPipeline::new(&quiet, Frames(1), detections, Recorder::default());
        pipeline.run().unwrap();
        assert_eq!(pipeline.display().frames[0], original);
    }

    #[derive(Default)]
    struct Configurable {
        settings: Option<StreamSettings>,
    }

    impl FrameSource for Configurable {
        fn dimensions(&self) -> (usize, usize) {
            (W, H)
        }

        fn configure(&mut self, settings: StreamSettings) -> Result<()> {
            self.settings = Some(settings);
            Ok(())
        }

        fn next_frame(&mut self, _timeout: Duration) -> Result<Acquired> {
            Ok(Acquired::Exhausted)
        }
    }

    #[test]
    fn test_source_configured_before_calibration() {
        let config = RedactorConfig {
            fps: 60,
            input_size: 320,
            ..config(1)
        };
        let mut pipeline = RedactionPipeline::new(
            &config,
            Configurable::default(),
            Detections(VecDeque::new()),
            Recorder::default(),
        );
        pipeline.start().unwrap();
        assert_eq!(
            pipeline.frames.settings,
            Some(StreamSettings {
                fps: 35,
                input_size: 320
            })
        );
    }
}
