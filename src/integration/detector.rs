//! Detector output and its normalisation into tracker detections.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::tracker::{Detection, Rect};

/// One box as reported by the detection network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub confidence: f32,
    #[serde(default)]
    pub label: u32,
}

/// Coordinate space of raw detector boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinateSpace {
    /// `[0, 1]` relative to the frame
    #[default]
    Normalized,
    /// Pixels of the square detector input, stretched over the frame
    DetectorInput { size: u32 },
    /// Frame pixels
    Frame,
}

/// Source of per-frame detector results.
///
/// Polling must not block. `Ok(None)` means inference has no result for
/// the current frame yet, which is not an error.
///
/// # Example
///
/// ```ignore
/// use blurtrack::{DetectionSource, RawDetection};
///
/// struct Queue(std::collections::VecDeque<Vec<RawDetection>>);
///
/// impl DetectionSource for Queue {
///     type Error = std::convert::Infallible;
///
///     fn poll(&mut self) -> Result<Option<Vec<RawDetection>>, Self::Error> {
///         Ok(self.0.pop_front())
///     }
/// }
/// ```
pub trait DetectionSource {
    type Error: std::fmt::Display;

    fn poll(&mut self) -> Result<Option<Vec<RawDetection>>, Self::Error>;
}

/// Converts raw detector output into frame-pixel [`Detection`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionNormalizer {
    frame_width: f32,
    frame_height: f32,
    space: CoordinateSpace,
    min_confidence: f32,
}

impl DetectionNormalizer {
    pub fn new(
        frame_width: usize,
        frame_height: usize,
        space: CoordinateSpace,
        min_confidence: f32,
    ) -> Self {
        Self {
            frame_width: frame_width as f32,
            frame_height: frame_height as f32,
            space,
            min_confidence,
        }
    }

    fn scale(&self) -> (f32, f32) {
        match self.space {
            CoordinateSpace::Normalized => (self.frame_width, self.frame_height),
            CoordinateSpace::DetectorInput { size } => {
                let size = size.max(1) as f32;
                (self.frame_width / size, self.frame_height / size)
            }
            CoordinateSpace::Frame => (1.0, 1.0),
        }
    }

    /// Absent or empty input yields no detections. Boxes below the
    /// confidence threshold, with non-finite corners or without positive
    /// area are dropped.
    pub fn normalize(&self, raw: Option<&[RawDetection]>) -> Vec<Detection> {
        let Some(raw) = raw else {
            return Vec::new();
        };
        let (sx, sy) = self.scale();

        raw.iter()
            .filter_map(|r| {
                if r.confidence < self.min_confidence {
                    return None;
                }
                let b = Rect::from_tlbr(r.xmin * sx, r.ymin * sy, r.xmax * sx, r.ymax * sy);
                if !b.is_finite() || b.width() <= 0.0 || b.height() <= 0.0 {
                    debug!(?r, "discarding degenerate detection");
                    return None;
                }
                Some(Detection::from_rect(b, r.confidence, r.label))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(xmin: f32, ymin: f32, xmax: f32, ymax: f32, confidence: f32) -> RawDetection {
        RawDetection {
            xmin,
            ymin,
            xmax,
            ymax,
            confidence,
            label: 0,
        }
    }

    #[test]
    fn test_absent_and_empty() {
        let normalizer = DetectionNormalizer::new(860, 540, CoordinateSpace::Normalized, 0.2);
        assert!(normalizer.normalize(None).is_empty());
        assert!(normalizer.normalize(Some(&[])).is_empty());
    }

    #[test]
    fn test_normalized_scaling() {
        let normalizer = DetectionNormalizer::new(860, 540, CoordinateSpace::Normalized, 0.2);
        let dets = normalizer.normalize(Some(&[raw(0.1, 0.5, 0.2, 1.0, 0.9)]));
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, Rect::from_tlbr(86.0, 270.0, 172.0, 540.0));
        assert_eq!(dets[0].score, 0.9);
    }

    #[test]
    fn test_detector_input_scaling() {
        let normalizer =
            DetectionNormalizer::new(512, 768, CoordinateSpace::DetectorInput { size: 256 }, 0.2);
        let dets = normalizer.normalize(Some(&[raw(10.0, 10.0, 20.0, 30.0, 0.5)]));
        assert_eq!(dets[0].bbox, Rect::from_tlbr(20.0, 30.0, 40.0, 90.0));
    }

    #[test]
    fn test_filters() {
        let normalizer = DetectionNormalizer::new(100, 100, CoordinateSpace::Frame, 0.2);
        let dets = normalizer.normalize(Some(&[
            raw(10.0, 10.0, 20.0, 20.0, 0.1),
            raw(10.0, 10.0, 10.0, 20.0, 0.9),
            raw(f32::NAN, 10.0, 20.0, 20.0, 0.9),
            raw(30.0, 30.0, 20.0, 40.0, 0.9),
            raw(10.0, 10.0, 20.0, 20.0, 0.2),
        ]));
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, Rect::from_tlbr(10.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn test_raw_json_label_optional() {
        let parsed: RawDetection =
            serde_json::from_str(r#"{"xmin":0.1,"ymin":0.2,"xmax":0.3,"ymax":0.4,"confidence":0.8}"#)
                .unwrap();
        assert_eq!(parsed.label, 0);
    }
}
