//! File and stream backed collaborators: raw BGR frames in and out,
//! JSON-lines detection replay, and line-based keyboard control.

use std::io::{self, BufRead, ErrorKind, Read, Write};
use std::time::Duration;

use tracing::{debug, info};

use super::{
    Acquired, Control, DetectionSource, Display, FrameSource, FrameStatus, InputController,
    InputEvent, RawDetection,
};
use crate::error::{Error, Result};
use crate::redaction::Frame;

/// Reads consecutive `width * height * 3` byte BGR frames.
///
/// A plain byte stream has no notion of frame rate or detector input, so
/// [`FrameSource::configure`] is left at its no-op default. Reads are
/// blocking: the acquisition timeout is not applied, and a stalled stdin
/// stalls the loop until data or end of input arrives.
pub struct RawFrameReader<R> {
    reader: R,
    width: usize,
    height: usize,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, width: usize, height: usize) -> Self {
        Self {
            reader,
            width,
            height,
        }
    }
}

impl<R: Read> FrameSource for RawFrameReader<R> {
    fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn next_frame(&mut self, _timeout: Duration) -> Result<Acquired> {
        let mut data = vec![0u8; self.width * self.height * 3];
        let mut filled = 0;
        while filled < data.len() {
            match self.reader.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }

        if filled == 0 {
            return Ok(Acquired::Exhausted);
        }
        if filled < data.len() {
            return Err(Error::FrameSource(format!(
                "truncated frame: {filled} of {} bytes",
                data.len()
            )));
        }
        Ok(Acquired::Frame(Frame::from_bgr(self.width, self.height, data)?))
    }
}

/// Replays detector results, one line per frame.
///
/// Each line is a JSON array of [`RawDetection`]. A blank line or `null`
/// means the detector had no result for that frame; end of input means no
/// further results.
pub struct JsonLinesDetections<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl<R: BufRead> JsonLinesDetections<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> DetectionSource for JsonLinesDetections<R> {
    type Error = Error;

    fn poll(&mut self) -> Result<Option<Vec<RawDetection>>> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;

        let text = self.buf.trim();
        if text.is_empty() {
            return Ok(None);
        }
        serde_json::from_str::<Option<Vec<RawDetection>>>(text).map_err(|source| {
            Error::DetectionRecord {
                line: self.line,
                source,
            }
        })
    }
}

/// Writes finished frames as raw BGR bytes.
pub struct RawFrameWriter<W: Write> {
    writer: W,
    report_every: u64,
}

impl<W: Write> RawFrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            report_every: 100,
        }
    }

    /// Log throughput every `frames` frames.
    pub fn report_every(mut self, frames: u64) -> Self {
        self.report_every = frames.max(1);
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Display for RawFrameWriter<W> {
    fn present(&mut self, frame: Frame, status: &FrameStatus) -> Result<Control> {
        match self.writer.write_all(&frame.to_bytes()) {
            Ok(()) => {}
            // The reading end went away: stop quietly.
            Err(err) if err.kind() == ErrorKind::BrokenPipe => return Ok(Control::Quit),
            Err(err) => return Err(err.into()),
        }
        if status.frame_index % self.report_every == 0 {
            info!(
                frame = status.frame_index,
                fps = %format!("{:.2}", status.fps),
                tracks = status.tracks.len(),
                redacting = status.redacting,
                "NN fps"
            );
        }
        Ok(Control::Continue)
    }

    fn finish(&mut self) -> Result<()> {
        match self.writer.flush() {
            Err(err) if err.kind() != ErrorKind::BrokenPipe => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Keyboard control from text lines: `t`, `space` or an empty line toggles
/// redaction, `q` quits.
pub struct LineController<R> {
    reader: R,
}

impl<R: BufRead + Send + 'static> LineController<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl LineController<io::BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(io::BufReader::new(io::stdin()))
    }
}

impl<R: BufRead + Send + 'static> InputController for LineController<R> {
    fn next_event(&mut self) -> Result<Option<InputEvent>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            match line.trim() {
                "" | "t" | "space" => return Ok(Some(InputEvent::ToggleRedaction)),
                "q" | "quit" => return Ok(Some(InputEvent::Quit)),
                other => debug!(input = other, "ignoring unknown command"),
            }
        }
    }
}
