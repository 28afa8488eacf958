//! Redact faces in a raw BGR video stream using replayed detector output.
//!
//! Frames are read from `--frames` (or stdin), detections from a JSON-lines
//! file with one array per frame, and redacted frames are written to
//! `--output` (or stdout).

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use blurtrack::integration::replay::{
    JsonLinesDetections, LineController, RawFrameReader, RawFrameWriter,
};
use blurtrack::integration::{RedactionPipeline, spawn_listener};
use blurtrack::{CoordinateSpace, RedactorConfig, TrackerConfig};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Coords {
    /// [0, 1] relative to the frame
    Normalized,
    /// Pixels of the square detector input
    Detector,
    /// Frame pixels
    Frame,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Blur tracked faces in a raw BGR video stream", long_about = None)]
struct Args {
    /// Detector weights (*.blob); must exist
    #[arg(short, long, default_value = "./yolov8n-face_openvino_2022.1_6shave.blob")]
    blob_path: PathBuf,

    /// Target frame rate, capped at 35
    #[arg(short, long, default_value_t = 35)]
    fps: u32,

    /// Side of the square image sent to the detector
    #[arg(long, default_value_t = 256)]
    img_size: u32,

    /// Detection confidence threshold
    #[arg(short, long, default_value_t = 0.2)]
    conf: f32,

    /// Toggle blurring from stdin (`t`/Enter toggles, `q` quits)
    #[arg(short, long)]
    keyboard_on: bool,

    /// Start with blurring switched off
    #[arg(long)]
    no_blur: bool,

    /// Do not stamp the frame rate into the output frames
    #[arg(long)]
    no_overlay: bool,

    /// Frame width in pixels
    #[arg(long, default_value_t = 860)]
    width: usize,

    /// Frame height in pixels
    #[arg(long, default_value_t = 540)]
    height: usize,

    /// Raw BGR frames; stdin when omitted
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Detector results, one JSON array per frame
    #[arg(short, long)]
    detections: PathBuf,

    /// Coordinate space of the detector boxes
    #[arg(long, value_enum, default_value_t = Coords::Normalized)]
    coords: Coords,

    /// Redacted raw BGR frames; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Box filter kernel side
    #[arg(long, default_value_t = 60)]
    kernel: usize,

    /// Frames a face may go undetected before its track is dropped
    #[arg(long, default_value_t = 30)]
    max_age: u32,

    /// Consecutive detections needed before a face is blurred
    #[arg(long, default_value_t = 3)]
    min_hits: u32,

    /// Minimum IoU to associate a detection with a track
    #[arg(long, default_value_t = 0.5)]
    iou_threshold: f32,
}

impl Args {
    fn config(&self) -> RedactorConfig {
        RedactorConfig {
            model_path: self.blob_path.clone(),
            fps: self.fps,
            input_size: self.img_size,
            confidence: self.conf,
            keyboard: self.keyboard_on,
            redact_by_default: !self.no_blur,
            coordinates: match self.coords {
                Coords::Normalized => CoordinateSpace::Normalized,
                Coords::Detector => CoordinateSpace::DetectorInput {
                    size: self.img_size,
                },
                Coords::Frame => CoordinateSpace::Frame,
            },
            blur_kernel: self.kernel,
            fps_overlay: !self.no_overlay,
            frame_timeout: Duration::from_secs(1),
            tracker: TrackerConfig {
                max_age: self.max_age,
                min_hits: self.min_hits,
                iou_threshold: self.iou_threshold,
            },
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let config = args.config();
    config.validate().context("invalid configuration")?;
    info!(
        model = %config.model_path.display(),
        fps = config.effective_fps(),
        input_size = config.input_size,
        "starting redaction"
    );

    let frames: Box<dyn Read> = match &args.frames {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening frames {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let detections = BufReader::new(
        File::open(&args.detections)
            .with_context(|| format!("opening detections {}", args.detections.display()))?,
    );
    let output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating output {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let mut pipeline = RedactionPipeline::new(
        &config,
        RawFrameReader::new(frames, args.width, args.height),
        JsonLinesDetections::new(detections),
        RawFrameWriter::new(output),
    );

    if config.keyboard {
        let controller = if args.frames.is_some() {
            Ok(LineController::stdin())
        } else {
            Err(blurtrack::Error::InputUnavailable("stdin carries the frames".into()))
        };
        // Detached: the listener blocks on stdin and ends with the process.
        let _listener = spawn_listener(
            controller,
            pipeline.switch().clone(),
            pipeline.stop_signal().clone(),
        );
    }

    let summary = pipeline.run().context("redaction failed")?;
    info!(frames = summary.frames, fps = %format!("{:.2}", summary.fps), "done");
    Ok(())
}
