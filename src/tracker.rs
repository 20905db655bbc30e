//! Keeps persistent identities across frames of independently-detected
//! bounding boxes. Matching is greedy: detections are visited in descending
//! score order and each takes the same-label track it overlaps best, so a
//! confident detection is never starved by a weaker one. Tracks that miss a
//! frame carry over unchanged until they go stale, which rides out brief
//! detector misses without losing the identity.

use crate::detection::{iou, DetectedObject, DetectionBox};
use std::cmp::Ordering;

/// Tunables for the tracker. The defaults match a handheld/wearable camera
/// feed where the detector runs at a few frames per second.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Hard cap on live tracks.
    pub max_tracks: usize,
    /// Minimum IoU for a detection to claim an existing track.
    pub min_iou_for_match: f32,
    /// A track unseen for longer than this is dropped.
    pub stale_track_timeout_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_tracks: 10,
            min_iou_for_match: 0.3,
            stale_track_timeout_ms: 2000,
        }
    }
}

/// A detection with a stable identity. Owned by [`ObjectTracker`]; mutated
/// only through [`ObjectTracker::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    /// Monotonically assigned, never reused.
    pub track_id: u64,
    pub label: String,
    pub score: f32,
    pub bounding_box: DetectionBox,
    pub last_seen_at_ms: u64,
}

/// Greedy IoU tracker with staleness eviction.
#[derive(Debug)]
pub struct ObjectTracker {
    config: TrackerConfig,
    next_track_id: u64,
    tracks: Vec<TrackedObject>,
}

impl ObjectTracker {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            next_track_id: 1,
            tracks: Vec::new(),
        }
    }

    /// The current live tracks, descending by score.
    pub fn tracks(&self) -> &[TrackedObject] {
        &self.tracks
    }

    /// Folds one frame of detections into the track set and returns the new
    /// live set. `now_ms` is the frame timestamp.
    pub fn update(&mut self, detections: &[DetectedObject], now_ms: u64) -> &[TrackedObject] {
        // 1. Stale eviction.
        let timeout = self.config.stale_track_timeout_ms;
        self.tracks
            .retain(|t| now_ms.saturating_sub(t.last_seen_at_ms) <= timeout);

        // 2. Confident detections match first.
        let mut ordered: Vec<&DetectedObject> = detections.iter().collect();
        ordered.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let mut consumed = vec![false; self.tracks.len()];
        let mut updated: Vec<TrackedObject> = Vec::new();
        let mut created: Vec<TrackedObject> = Vec::new();

        for detection in ordered {
            let best = self.best_match(detection, &consumed);
            match best {
                Some(idx) => {
                    consumed[idx] = true;
                    let mut track = self.tracks[idx].clone();
                    track.score = detection.score;
                    track.bounding_box = detection.bounding_box;
                    track.last_seen_at_ms = now_ms;
                    updated.push(track);
                }
                None => {
                    // Creation is capacity-gated against what this cycle has
                    // already touched.
                    if updated.len() + created.len() < self.config.max_tracks {
                        created.push(TrackedObject {
                            track_id: self.allocate_track_id(),
                            label: detection.label.clone(),
                            score: detection.score,
                            bounding_box: detection.bounding_box,
                            last_seen_at_ms: now_ms,
                        });
                    }
                }
            }
        }

        // 4. Unmatched, non-stale tracks carry over with their last known
        // box and score.
        let carried = self
            .tracks
            .iter()
            .zip(&consumed)
            .filter(|(_, &was_consumed)| !was_consumed)
            .map(|(t, _)| t.clone());

        let mut merged: Vec<TrackedObject> = updated;
        merged.extend(created);
        merged.extend(carried);
        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        merged.truncate(self.config.max_tracks);

        self.tracks = merged;
        &self.tracks
    }

    /// Index of the best unconsumed same-label track with IoU at or above
    /// the threshold; ties go to the higher IoU.
    fn best_match(&self, detection: &DetectedObject, consumed: &[bool]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, track) in self.tracks.iter().enumerate() {
            if consumed[idx] || track.label != detection.label {
                continue;
            }
            let overlap = iou(&track.bounding_box, &detection.bounding_box);
            if overlap < self.config.min_iou_for_match {
                continue;
            }
            match best {
                Some((_, best_overlap)) if overlap <= best_overlap => {}
                _ => best = Some((idx, overlap)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    fn allocate_track_id(&mut self) -> u64 {
        let id = self.next_track_id;
        self.next_track_id += 1;
        id
    }
}
