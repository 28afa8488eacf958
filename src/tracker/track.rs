//! A single tracked face and its motion state.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array1, Array2};

use crate::error::Result;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::Detection;
use crate::tracker::rect::Rect;
use crate::tracker::track_state::TrackState;

/// Process-wide id counter; ids are never reused while the process lives.
static TRACK_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique track identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(pub u64);

impl TrackId {
    fn next() -> Self {
        TrackId(TRACK_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// BGR display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Color {
    /// Deterministic, well-spread color for a track id: hues step by the
    /// golden angle at full saturation and value.
    pub fn for_track(id: TrackId) -> Self {
        let hue = (id.0 as f64 * 137.507_764_050_037_85) % 360.0;
        let sector = hue / 60.0;
        let x = 1.0 - (sector % 2.0 - 1.0).abs();
        let (r, g, b) = match sector as u32 {
            0 => (1.0, x, 0.0),
            1 => (x, 1.0, 0.0),
            2 => (0.0, 1.0, x),
            3 => (0.0, x, 1.0),
            4 => (x, 0.0, 1.0),
            _ => (1.0, 0.0, x),
        };
        let channel = |v: f64| (v * 255.0).round() as u8;
        Self {
            b: channel(b),
            g: channel(g),
            r: channel(r),
        }
    }
}

/// One face followed across frames.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    color: Color,
    /// Current lifecycle stage
    pub state: TrackState,
    /// Total matched frames, creation included
    pub hits: u32,
    /// Consecutive matched frames
    pub hit_streak: u32,
    /// Frames since the last match
    pub time_since_update: u32,
    /// Frames since creation
    pub age: u32,
    /// Confidence of the last matched detection
    pub score: f32,
    /// Class of the last matched detection
    pub class_id: u32,
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

impl Track {
    /// Start a Tentative track from an unmatched detection.
    pub fn new(detection: &Detection, kalman_filter: &KalmanFilter) -> Self {
        let id = TrackId::next();
        let (mean, covariance) = kalman_filter.initiate(detection.bbox.to_z());
        Self {
            id,
            color: Color::for_track(id),
            state: TrackState::Tentative,
            hits: 1,
            hit_streak: 1,
            time_since_update: 0,
            age: 0,
            score: detection.score,
            class_id: detection.class_id,
            mean,
            covariance,
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Box implied by the current motion state (corrected or predicted).
    pub fn rect(&self) -> Rect {
        Rect::from_z([self.mean[0], self.mean[1], self.mean[2], self.mean[3]])
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    /// Advance the motion state one frame and return the predicted box.
    pub fn predict(&mut self, kalman_filter: &KalmanFilter) -> Rect {
        let (mean, covariance) = kalman_filter.predict(&self.mean, &self.covariance);
        self.mean = mean;
        self.covariance = covariance;
        self.age += 1;
        self.rect()
    }

    /// Record a match and correct the motion state with the detection.
    ///
    /// Counters are updated even when the correction fails; the state then
    /// stays at the prediction for this frame.
    pub fn mark_matched(
        &mut self,
        detection: &Detection,
        kalman_filter: &KalmanFilter,
    ) -> Result<()> {
        self.time_since_update = 0;
        self.hits += 1;
        self.hit_streak += 1;
        self.score = detection.score;
        self.class_id = detection.class_id;

        let (mean, covariance) =
            kalman_filter.update(&self.mean, &self.covariance, detection.bbox.to_z())?;
        self.mean = mean;
        self.covariance = covariance;
        Ok(())
    }

    pub fn mark_missed(&mut self) {
        self.time_since_update += 1;
        self.hit_streak = 0;
    }

    /// Promote to Confirmed once the hit streak reaches `min_hits`.
    /// Returns true on the frame the promotion happens.
    pub fn try_confirm(&mut self, min_hits: u32) -> bool {
        if self.state == TrackState::Tentative && self.hit_streak >= min_hits {
            self.state = TrackState::Confirmed;
            return true;
        }
        false
    }

    pub fn mark_deleted(&mut self) {
        self.state = TrackState::Deleted;
    }
}
