//! SORT-style tracker: Kalman prediction, IoU assignment and the track
//! lifecycle.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::matching::{self, AssignmentResult, Detection};
use crate::tracker::rect::Rect;
use crate::tracker::track::{Color, Track, TrackId};
use crate::tracker::track_state::TrackState;

/// Configuration for the SortTracker.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Frames a track may go unmatched before it is deleted
    pub max_age: u32,
    /// Consecutive matched frames needed to confirm a track
    pub min_hits: u32,
    /// Minimum IoU for a track/detection pair to count as a match
    pub iou_threshold: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_age: 30,
            min_hits: 3,
            iou_threshold: 0.5,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "iou_threshold {} outside (0, 1]",
                self.iou_threshold
            )));
        }
        if self.min_hits == 0 {
            return Err(Error::InvalidConfig("min_hits must be at least 1".into()));
        }
        Ok(())
    }
}

/// Snapshot of a confirmed track handed to rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    pub id: TrackId,
    pub bbox: Rect,
    pub color: Color,
    pub state: TrackState,
    pub hits: u32,
    pub hit_streak: u32,
    pub time_since_update: u32,
    pub score: f32,
    pub class_id: u32,
}

impl From<&Track> for TrackedObject {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id(),
            bbox: track.rect(),
            color: track.color(),
            state: track.state,
            hits: track.hits,
            hit_streak: track.hit_streak,
            time_since_update: track.time_since_update,
            score: track.score,
            class_id: track.class_id,
        }
    }
}

/// Owns the live track set; the only place tracks are created, changed or
/// removed.
pub struct SortTracker {
    tracks: BTreeMap<TrackId, Track>,
    frame_count: u64,
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
}

impl SortTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            tracks: BTreeMap::new(),
            frame_count: 0,
            config,
            kalman_filter: KalmanFilter::default(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Frames processed so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Live tracks in ascending id order.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Drop every live track. Ids are not recycled.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.frame_count = 0;
    }

    /// Process one frame of detections and return the confirmed tracks.
    pub fn update(&mut self, detections: &[Detection]) -> Vec<TrackedObject> {
        self.frame_count += 1;

        // Step 1: Predict every live track one frame forward
        let mut track_ids = Vec::with_capacity(self.tracks.len());
        let mut track_boxes = Vec::with_capacity(self.tracks.len());
        let mut invalid = Vec::new();
        for (&id, track) in self.tracks.iter_mut() {
            let predicted = track.predict(&self.kalman_filter);
            if predicted.is_finite() {
                track_ids.push(id);
                track_boxes.push(predicted);
            } else {
                invalid.push(id);
            }
        }
        for id in invalid {
            debug!(track = %id, "dropping track with non-finite prediction");
            self.remove(id);
        }

        // Step 2: Associate predictions with detections
        let det_boxes: Vec<Rect> = detections.iter().map(|d| d.bbox).collect();
        let AssignmentResult {
            matches,
            unmatched_tracks,
            unmatched_detections,
        } = matching::associate(&track_boxes, &det_boxes, self.config.iou_threshold);

        // Step 3: Correct matched tracks
        for (itrack, idet) in matches {
            let id = track_ids[itrack];
            if let Some(track) = self.tracks.get_mut(&id) {
                if let Err(err) = track.mark_matched(&detections[idet], &self.kalman_filter) {
                    warn!(track = %id, %err, "kalman correction failed; keeping prediction");
                }
                if track.try_confirm(self.config.min_hits) {
                    debug!(track = %id, "track confirmed");
                }
            }
        }

        // Step 4: Age unmatched tracks and expire the stale ones
        let mut expired = 0;
        for itrack in unmatched_tracks {
            let id = track_ids[itrack];
            let Some(track) = self.tracks.get_mut(&id) else {
                continue;
            };
            track.mark_missed();
            if track.time_since_update > self.config.max_age {
                self.remove(id);
                expired += 1;
            }
        }

        // Step 5: Start tracks for unmatched detections
        let created = unmatched_detections.len();
        for idet in unmatched_detections {
            let mut track = Track::new(&detections[idet], &self.kalman_filter);
            track.try_confirm(self.config.min_hits);
            self.tracks.insert(track.id(), track);
        }

        if created > 0 || expired > 0 {
            debug!(
                frame = self.frame_count,
                created,
                expired,
                live = self.tracks.len(),
                "track set changed"
            );
        }

        self.confirmed()
    }

    /// Snapshots of all confirmed live tracks, ascending by id.
    pub fn confirmed(&self) -> Vec<TrackedObject> {
        self.tracks
            .values()
            .filter(|t| t.is_confirmed())
            .map(TrackedObject::from)
            .collect()
    }

    fn remove(&mut self, id: TrackId) {
        if let Some(mut track) = self.tracks.remove(&id) {
            track.mark_deleted();
            debug!(track = %id, age = track.age, hits = track.hits, "track deleted");
        }
    }
}
