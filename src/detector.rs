//! The detector boundary and the per-frame processing path. The neural
//! network itself lives outside this crate; we consume labeled boxes and
//! fold them into the tracker. A [`DummyDetector`] stands in for the model
//! during demos and tests.

use crate::detection::{DetectedObject, DetectionBox};
use crate::tracker::{ObjectTracker, TrackedObject};
use log::warn;
use rand::prelude::*;
use std::sync::{Arc, Mutex};

/// One camera frame as the platform delivers it: planar YUV bytes plus the
/// declared dimensions.
#[derive(Debug)]
pub struct YuvFrame<'a> {
    pub width: i32,
    pub height: i32,
    pub data: &'a [u8],
}

/// The external object-detection model.
pub trait ObjectDetector: Send {
    /// Detects objects in one frame. Boxes come back normalized to [0, 1].
    fn detect(&mut self, frame: &YuvFrame) -> Vec<DetectedObject>;
}

/// Runs detection and tracking for each incoming frame. This path is driven
/// by the video source's callback and never blocks on cue playback; it only
/// takes the tracker lock for the duration of one update.
pub struct FramePipeline {
    detector: Box<dyn ObjectDetector>,
    tracker: Arc<Mutex<ObjectTracker>>,
}

impl FramePipeline {
    pub fn new(detector: Box<dyn ObjectDetector>, tracker: Arc<Mutex<ObjectTracker>>) -> Self {
        Self { detector, tracker }
    }

    /// Processes one frame and returns the resulting live tracks. Frames
    /// with non-positive dimensions are dropped outright.
    pub fn process_frame(&mut self, frame: &YuvFrame, now_ms: u64) -> Vec<TrackedObject> {
        if frame.width <= 0 || frame.height <= 0 {
            warn!(
                "dropping frame with invalid dimensions {}x{}",
                frame.width, frame.height
            );
            return Vec::new();
        }

        let detections = self.detector.detect(frame);
        self.tracker.lock().unwrap().update(&detections, now_ms).to_vec()
    }
}

/// A stand-in detector that reports a handful of slowly wandering objects.
/// The boxes jitter a little every frame so the tracker has something
/// realistic to chew on.
pub struct DummyDetector {
    objects: Vec<(String, f32, f32)>,
    jitter: f32,
}

impl DummyDetector {
    pub fn new(labels: &[&str]) -> Self {
        let mut rng = thread_rng();
        let objects = labels
            .iter()
            .map(|&label| {
                (
                    label.to_string(),
                    rng.gen_range(0.2..0.8),
                    rng.gen_range(0.2..0.8),
                )
            })
            .collect();
        Self {
            objects,
            jitter: 0.01,
        }
    }
}

impl ObjectDetector for DummyDetector {
    fn detect(&mut self, _frame: &YuvFrame) -> Vec<DetectedObject> {
        let mut rng = thread_rng();
        self.objects
            .iter_mut()
            .map(|(label, cx, cy)| {
                *cx = (*cx + rng.gen_range(-self.jitter..self.jitter)).clamp(0.1, 0.9);
                *cy = (*cy + rng.gen_range(-self.jitter..self.jitter)).clamp(0.1, 0.9);
                DetectedObject {
                    label: label.clone(),
                    score: rng.gen_range(0.6..0.95),
                    bounding_box: DetectionBox::new(*cx - 0.1, *cy - 0.1, *cx + 0.1, *cy + 0.1),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::TrackerConfig;

    struct FixedDetector(Vec<DetectedObject>);

    impl ObjectDetector for FixedDetector {
        fn detect(&mut self, _frame: &YuvFrame) -> Vec<DetectedObject> {
            self.0.clone()
        }
    }

    #[test]
    fn invalid_frame_dimensions_short_circuit() {
        let tracker = Arc::new(Mutex::new(ObjectTracker::new(TrackerConfig::default())));
        let detector = FixedDetector(vec![DetectedObject {
            label: "person".into(),
            score: 0.9,
            bounding_box: DetectionBox::new(0.1, 0.1, 0.3, 0.3),
        }]);
        let mut pipeline = FramePipeline::new(Box::new(detector), tracker.clone());

        let bad = YuvFrame {
            width: -640,
            height: 480,
            data: &[],
        };
        assert!(pipeline.process_frame(&bad, 0).is_empty());
        assert!(tracker.lock().unwrap().tracks().is_empty());
    }

    #[test]
    fn frames_feed_the_shared_tracker() {
        let tracker = Arc::new(Mutex::new(ObjectTracker::new(TrackerConfig::default())));
        let detector = FixedDetector(vec![DetectedObject {
            label: "person".into(),
            score: 0.9,
            bounding_box: DetectionBox::new(0.1, 0.1, 0.3, 0.3),
        }]);
        let mut pipeline = FramePipeline::new(Box::new(detector), tracker.clone());

        let frame = YuvFrame {
            width: 640,
            height: 480,
            data: &[0u8; 16],
        };
        let tracks = pipeline.process_frame(&frame, 0);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracker.lock().unwrap().tracks().len(), 1);
    }

    #[test]
    fn dummy_detector_stays_in_bounds() {
        let mut detector = DummyDetector::new(&["person", "chair"]);
        let frame = YuvFrame {
            width: 640,
            height: 480,
            data: &[],
        };
        for _ in 0..50 {
            for d in detector.detect(&frame) {
                assert!(d.bounding_box.left >= 0.0 && d.bounding_box.right <= 1.0);
                assert!(d.bounding_box.top >= 0.0 && d.bounding_box.bottom <= 1.0);
                assert!((0.0..=1.0).contains(&d.score));
            }
        }
    }
}
