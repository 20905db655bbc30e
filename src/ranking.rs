//! Scores live tracks for cue-worthiness. The weights favor what the object
//! is over how big or centered it appears, so a person at the edge of the
//! frame still outranks a nearby chair.

use crate::tracker::TrackedObject;
use std::cmp::Ordering;

/// Tracks scoring at or below this confidence are never sonified.
pub const CONFIDENCE_FLOOR: f32 = 0.35;

const CLASS_WEIGHT: f32 = 0.50;
const AREA_WEIGHT: f32 = 0.25;
const CENTER_WEIGHT: f32 = 0.15;
const SCORE_WEIGHT: f32 = 0.10;

/// A track that made the cut for one scheduling cycle, with everything the
/// scheduler and engine need resolved up front. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedObjectCandidate {
    pub track_id: u64,
    pub normalized_label: String,
    pub sound_asset_path: String,
    pub score: f32,
    pub bounding_box: crate::detection::DetectionBox,
    pub rank: f32,
}

/// Lowercased, trimmed class label; the key for priorities, profiles, and
/// sound assets.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}

/// Fixed per-class priority. Unknown classes rank near zero so they only
/// surface when nothing recognizable is in view.
pub fn class_priority(normalized_label: &str) -> f32 {
    match normalized_label {
        "person" => 1.0,
        "door" => 0.85,
        "chair" => 0.60,
        "table" => 0.55,
        "phone" => 0.50,
        "cup" => 0.45,
        _ => 0.05,
    }
}

/// Where the per-class cue sounds live unless the caller says otherwise.
pub const DEFAULT_SOUND_ASSET_ROOT: &str = "assets/sounds";

/// Path of the mono cue asset for a class under `asset_root`. Unrecognized
/// classes share a generic object sound.
pub fn sound_asset_for(asset_root: &str, normalized_label: &str) -> String {
    match normalized_label {
        "person" | "door" | "chair" | "table" | "phone" | "cup" => {
            format!("{}/{}.wav", asset_root, normalized_label)
        }
        _ => format!("{}/object.wav", asset_root),
    }
}

/// Filters out low-confidence tracks and sorts the rest by descending rank.
/// The sort is stable, so equal ranks keep their input order.
pub fn rank_tracked_objects(
    tracks: &[TrackedObject],
    asset_root: &str,
) -> Vec<RankedObjectCandidate> {
    let mut candidates: Vec<RankedObjectCandidate> = tracks
        .iter()
        .filter(|t| t.score > CONFIDENCE_FLOOR)
        .map(|t| {
            let normalized = normalize_label(&t.label);
            let rank = rank_for(&normalized, t);
            RankedObjectCandidate {
                track_id: t.track_id,
                sound_asset_path: sound_asset_for(asset_root, &normalized),
                normalized_label: normalized,
                score: t.score,
                bounding_box: t.bounding_box,
                rank,
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.rank.partial_cmp(&a.rank).unwrap_or(Ordering::Equal));
    candidates
}

fn rank_for(normalized_label: &str, track: &TrackedObject) -> f32 {
    let area = track.bounding_box.area().clamp(0.0, 1.0);
    let dx = (track.bounding_box.center_x() - 0.5).abs();
    let dy = (track.bounding_box.center_y() - 0.5).abs();
    let center_proximity = (1.0 - (dx + dy)).clamp(0.0, 1.0);

    CLASS_WEIGHT * class_priority(normalized_label)
        + AREA_WEIGHT * area
        + CENTER_WEIGHT * center_proximity
        + SCORE_WEIGHT * track.score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectionBox;

    fn track(id: u64, label: &str, score: f32, bounding_box: DetectionBox) -> TrackedObject {
        TrackedObject {
            track_id: id,
            label: label.to_string(),
            score,
            bounding_box,
            last_seen_at_ms: 0,
        }
    }

    #[test]
    fn person_outranks_unknown_class_all_else_equal() {
        let shared_box = DetectionBox::new(0.4, 0.4, 0.6, 0.6);
        let tracks = vec![
            track(1, "balloon", 0.8, shared_box),
            track(2, "person", 0.8, shared_box),
        ];
        let ranked = rank_tracked_objects(&tracks, DEFAULT_SOUND_ASSET_ROOT);
        assert_eq!(ranked[0].track_id, 2);
        assert!(ranked[0].rank > ranked[1].rank);
    }

    #[test]
    fn low_confidence_tracks_are_filtered() {
        let tracks = vec![
            track(1, "person", 0.2, DetectionBox::new(0.4, 0.4, 0.6, 0.6)),
            track(2, "chair", 0.8, DetectionBox::new(0.4, 0.4, 0.6, 0.6)),
        ];
        let ranked = rank_tracked_objects(&tracks, DEFAULT_SOUND_ASSET_ROOT);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].track_id, 2);
    }

    #[test]
    fn centered_object_beats_edge_object_of_same_class() {
        let tracks = vec![
            track(1, "chair", 0.8, DetectionBox::new(0.0, 0.0, 0.2, 0.2)),
            track(2, "chair", 0.8, DetectionBox::new(0.4, 0.4, 0.6, 0.6)),
        ];
        let ranked = rank_tracked_objects(&tracks, DEFAULT_SOUND_ASSET_ROOT);
        assert_eq!(ranked[0].track_id, 2);
    }

    #[test]
    fn labels_normalize_before_lookup() {
        assert_eq!(normalize_label("  Person "), "person");
        assert_eq!(class_priority(&normalize_label("PERSON")), 1.0);
    }

    #[test]
    fn unknown_labels_share_the_generic_asset() {
        assert_eq!(sound_asset_for(DEFAULT_SOUND_ASSET_ROOT, "person"), "assets/sounds/person.wav");
        assert_eq!(sound_asset_for(DEFAULT_SOUND_ASSET_ROOT, "giraffe"), "assets/sounds/object.wav");
    }

    #[test]
    fn equal_ranks_keep_input_order() {
        let shared_box = DetectionBox::new(0.4, 0.4, 0.6, 0.6);
        let tracks = vec![
            track(7, "cup", 0.8, shared_box),
            track(3, "cup", 0.8, shared_box),
        ];
        let ranked = rank_tracked_objects(&tracks, DEFAULT_SOUND_ASSET_ROOT);
        assert_eq!(ranked[0].track_id, 7);
        assert_eq!(ranked[1].track_id, 3);
    }
}
