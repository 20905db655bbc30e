//! The scene-loop driver. Once per scene window it snapshots the tracker,
//! ranks and schedules cues, interleaves the periodic north and landmark
//! cues, and plays everything strictly sequentially, left to right. The
//! loop runs on its own thread, independently paced from the frame
//! pipeline; the two only share snapshots through mutexes.

use crate::engine::SpatialAudioEngine;
use crate::geo::{bearing_deg, normalize_0_360, normalize_signed_180};
use crate::landmark::{Landmark, LandmarkStore};
use crate::ranking::{normalize_label, rank_tracked_objects, DEFAULT_SOUND_ASSET_ROOT};
use crate::scheduler::{scene_window_ms, SceneCuePlan, SceneCueScheduler, INTER_CUE_GAP_MS};
use crate::signals::{HeadingProvider, LocationProvider};
use crate::tracker::{ObjectTracker, TrackedObject};
use log::{debug, info};
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering as AtomicOrdering},
        mpsc, Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Static knobs for the scene loop, fixed at pipeline startup.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How many scene cycles per second (clamped to [0.3, 3.0]).
    pub refresh_rate_hz: f32,
    /// Camera field of view used to map box centers onto cue directions.
    pub horizontal_fov_deg: f32,
    pub vertical_fov_deg: f32,
    pub north_cooldown_ms: u64,
    pub landmark_cooldown_ms: u64,
    /// Directory holding the per-class cue sounds.
    pub sound_asset_root: String,
    pub north_asset_path: String,
    pub landmark_asset_path: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: 1.0,
            horizontal_fov_deg: 60.0,
            vertical_fov_deg: 40.0,
            north_cooldown_ms: 5000,
            landmark_cooldown_ms: 7000,
            sound_asset_root: DEFAULT_SOUND_ASSET_ROOT.to_string(),
            north_asset_path: format!("{}/north.wav", DEFAULT_SOUND_ASSET_ROOT),
            landmark_asset_path: format!("{}/landmark.wav", DEFAULT_SOUND_ASSET_ROOT),
        }
    }
}

/// User-togglable behavior, mutated by voice commands while the loop runs.
#[derive(Debug, Clone)]
pub struct SceneModes {
    pub sonification_enabled: bool,
    pub north_cue_enabled: bool,
    pub landmark_cues_enabled: bool,
    /// When set, only tracks of this normalized class are sonified.
    pub class_filter: Option<String>,
    /// When set, landmark cues point here instead of the nearest landmark.
    pub tracked_landmark: Option<String>,
}

impl Default for SceneModes {
    fn default() -> Self {
        Self {
            sonification_enabled: true,
            north_cue_enabled: true,
            landmark_cues_enabled: true,
            class_filter: None,
            tracked_landmark: None,
        }
    }
}

/// The mutable state shared between the scene loop and the command layer.
#[derive(Debug, Default)]
pub struct SceneState {
    pub modes: SceneModes,
    /// A one-shot "where is X" request; consumed by the next cycle.
    pub pending_ping: Option<String>,
}

/// What one scene cycle actually did. Mostly for tests and diagnostics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SceneCycleReport {
    pub window_ms: u64,
    pub object_cues: usize,
    pub north_cue: bool,
    pub landmark_cue: bool,
    pub ping_cue: bool,
}

pub struct CueOrchestrator {
    config: OrchestratorConfig,
    tracker: Arc<Mutex<ObjectTracker>>,
    engine: Arc<Mutex<SpatialAudioEngine>>,
    landmarks: Arc<Mutex<LandmarkStore>>,
    heading: Arc<dyn HeadingProvider>,
    location: Arc<dyn LocationProvider>,
    state: Arc<Mutex<SceneState>>,
    scheduler: SceneCueScheduler,
    stop: Arc<AtomicBool>,
    last_north_cue_ms: Option<u64>,
    last_landmark_cue_ms: Option<u64>,
    /// Azimuth each track was last announced at; transient, cleared on stop.
    last_cue_azimuths: HashMap<u64, f32>,
}

impl CueOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        tracker: Arc<Mutex<ObjectTracker>>,
        engine: Arc<Mutex<SpatialAudioEngine>>,
        landmarks: Arc<Mutex<LandmarkStore>>,
        heading: Arc<dyn HeadingProvider>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            config,
            tracker,
            engine,
            landmarks,
            heading,
            location,
            state: Arc::new(Mutex::new(SceneState::default())),
            scheduler: SceneCueScheduler::new(),
            stop: Arc::new(AtomicBool::new(false)),
            last_north_cue_ms: None,
            last_landmark_cue_ms: None,
            last_cue_azimuths: HashMap::new(),
        }
    }

    /// The shared state handle the command layer mutates.
    pub fn state_handle(&self) -> Arc<Mutex<SceneState>> {
        self.state.clone()
    }

    /// Runs one scene cycle at the given timestamp. The loop thread calls
    /// this once per window; tests call it directly.
    pub fn run_scene_cycle(&mut self, now_ms: u64) -> SceneCycleReport {
        let window = scene_window_ms(self.config.refresh_rate_hz);
        let mut report = SceneCycleReport {
            window_ms: window,
            ..Default::default()
        };

        let (modes, pending_ping) = {
            let mut state = self.state.lock().unwrap();
            (state.modes.clone(), state.pending_ping.take())
        };

        // 1. Snapshot tracks, optionally narrowed to one class.
        let tracks: Vec<TrackedObject> = self.tracker.lock().unwrap().tracks().to_vec();
        let tracks: Vec<TrackedObject> = match &modes.class_filter {
            Some(class) => {
                let key = normalize_label(class);
                tracks
                    .into_iter()
                    .filter(|t| normalize_label(&t.label) == key)
                    .collect()
            }
            None => tracks,
        };

        // 2. Rank and budget. Disabled sonification yields an empty plan.
        let ranked = if modes.sonification_enabled {
            rank_tracked_objects(&tracks, &self.config.sound_asset_root)
        } else {
            Vec::new()
        };
        let plan: SceneCuePlan = {
            let mut engine = self.engine.lock().unwrap();
            self.scheduler
                .build_scene_plan(&ranked, self.config.refresh_rate_hz, &mut *engine)
        };

        // 3. An explicit ping outranks everything, cooldowns included.
        if let Some(name) = pending_ping {
            report.ping_cue = self.emit_landmark_cue(Some(&name));
        }

        let no_competition = ranked.is_empty() || !modes.sonification_enabled;

        // 4. North cue.
        if modes.north_cue_enabled
            && no_competition
            && cooldown_elapsed(self.last_north_cue_ms, self.config.north_cooldown_ms, now_ms)
        {
            if let Some(reading) = self.heading.heading() {
                let azimuth = normalize_signed_180(-reading.degrees);
                let duration = self.engine.lock().unwrap().play_spatial_cue(
                    &self.config.north_asset_path,
                    "north",
                    azimuth,
                    0.0,
                );
                if duration > 0 {
                    self.last_north_cue_ms = Some(now_ms);
                    report.north_cue = true;
                    self.pause(duration + INTER_CUE_GAP_MS);
                }
            }
        }

        // 5. Landmark cue toward the tracked or nearest landmark. The
        // store check releases its lock before the cue re-takes it.
        let have_landmarks = !self.landmarks.lock().unwrap().is_empty();
        if modes.landmark_cues_enabled
            && no_competition
            && have_landmarks
            && cooldown_elapsed(
                self.last_landmark_cue_ms,
                self.config.landmark_cooldown_ms,
                now_ms,
            )
            && self.emit_landmark_cue(modes.tracked_landmark.as_deref())
        {
            self.last_landmark_cue_ms = Some(now_ms);
            report.landmark_cue = true;
        }

        // 6. Object cues, ordered left to right by current azimuth.
        let mut sequenced: Vec<(usize, f32, f32)> = plan
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let bounding_box = &entry.candidate.bounding_box;
                let azimuth = (bounding_box.center_x() - 0.5) * self.config.horizontal_fov_deg;
                let elevation = (-(bounding_box.center_y() - 0.5) * self.config.vertical_fov_deg)
                    .clamp(-45.0, 45.0);
                (i, azimuth, elevation)
            })
            .collect();
        sequenced.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        let heading_deg = self.heading.heading().map(|r| r.degrees);
        let last_index = sequenced.len().saturating_sub(1);
        for (position, (entry_index, azimuth, elevation)) in sequenced.iter().enumerate() {
            if self.stop.load(AtomicOrdering::Relaxed) {
                break;
            }
            let entry = &plan.entries[*entry_index];
            if let Some(heading_deg) = heading_deg {
                debug!(
                    "track {} cue at world bearing {:.1}",
                    entry.candidate.track_id,
                    normalize_0_360(heading_deg + azimuth)
                );
            }
            self.last_cue_azimuths
                .insert(entry.candidate.track_id, *azimuth);

            let duration = self.engine.lock().unwrap().play_spatial_cue(
                &entry.candidate.sound_asset_path,
                &entry.candidate.normalized_label,
                *azimuth,
                *elevation,
            );
            if duration > 0 {
                report.object_cues += 1;
            }
            if position != last_index {
                self.pause(duration + plan.inter_cue_gap_ms);
            }
        }

        report
    }

    /// Moves the orchestrator onto its own thread. The returned handle stops
    /// the loop and joins it.
    pub fn spawn(mut self) -> OrchestratorHandle {
        let stop = self.stop.clone();
        let (done_tx, done_rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let started = Instant::now();
            while !self.stop.load(AtomicOrdering::Relaxed) {
                let cycle_start_ms = started.elapsed().as_millis() as u64;
                self.run_scene_cycle(cycle_start_ms);

                // Sleep out whatever is left of the window.
                let window = scene_window_ms(self.config.refresh_rate_hz);
                let spent = started.elapsed().as_millis() as u64 - cycle_start_ms;
                if spent < window {
                    self.pause(window - spent);
                }
            }
            self.engine.lock().unwrap().stop_playback();
            self.last_cue_azimuths.clear();
            info!("scene loop terminated");
            let _ = done_tx.send(());
        });
        OrchestratorHandle {
            stop,
            done: done_rx,
            thread: Some(handle),
        }
    }

    /// Plays a landmark cue toward `preferred_name` (falling back to the
    /// nearest landmark). Silently a no-op when heading, location, or the
    /// landmark itself is unavailable.
    fn emit_landmark_cue(&mut self, preferred_name: Option<&str>) -> bool {
        let reading = match self.heading.heading() {
            Some(reading) => reading,
            None => return false,
        };
        let fix = match self.location.location() {
            Some(fix) => fix,
            None => return false,
        };

        let target: Option<Landmark> = {
            let landmarks = self.landmarks.lock().unwrap();
            preferred_name
                .and_then(|name| landmarks.get(name).cloned())
                .or_else(|| landmarks.nearest(&fix.point).map(|(l, _)| l.clone()))
        };
        let target = match target {
            Some(target) => target,
            None => return false,
        };

        let bearing = bearing_deg(&fix.point, &target.position());
        let azimuth = normalize_signed_180(bearing - reading.degrees);
        debug!("landmark {} at bearing {:.1}", target.name, bearing);

        let duration = self.engine.lock().unwrap().play_spatial_cue(
            &self.config.landmark_asset_path,
            "landmark",
            azimuth,
            0.0,
        );
        if duration > 0 {
            self.pause(duration + INTER_CUE_GAP_MS);
            true
        } else {
            false
        }
    }

    /// Sleeps in small slices so a stop request interrupts promptly.
    fn pause(&self, ms: u64) {
        let mut remaining = ms;
        while remaining > 0 && !self.stop.load(AtomicOrdering::Relaxed) {
            let slice = remaining.min(20);
            spin_sleep::sleep(Duration::from_millis(slice));
            remaining -= slice;
        }
    }
}

fn cooldown_elapsed(last_ms: Option<u64>, cooldown_ms: u64, now_ms: u64) -> bool {
    match last_ms {
        Some(last) => now_ms.saturating_sub(last) >= cooldown_ms,
        None => true,
    }
}

/// Control handle for a running scene loop.
pub struct OrchestratorHandle {
    stop: Arc<AtomicBool>,
    done: mpsc::Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl OrchestratorHandle {
    /// Requests a stop and waits for the loop to wind down, releasing the
    /// active audio resource on the way out.
    pub fn stop(mut self) {
        self.stop.store(true, AtomicOrdering::Relaxed);
        let _ = self.done.recv_timeout(Duration::from_secs(5));
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DetectedObject, DetectionBox};
    use crate::geo::GeoPoint;
    use crate::profiles::SonificationProfiles;
    use crate::signals::{GeoFix, HeadingReading, SharedSignals};
    use crate::sink::MemorySink;
    use crate::tracker::TrackerConfig;
    use hound::{SampleFormat, WavSpec, WavWriter};

    struct Fixture {
        orchestrator: CueOrchestrator,
        sink: Arc<Mutex<MemorySink>>,
        signals: Arc<SharedSignals>,
        landmarks: Arc<Mutex<LandmarkStore>>,
        tracker: Arc<Mutex<ObjectTracker>>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for name in ["person", "chair", "object", "north", "landmark"] {
            let spec = WavSpec {
                channels: 1,
                sample_rate: 16000,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            };
            let mut writer =
                WavWriter::create(dir.path().join(format!("{}.wav", name)), spec).unwrap();
            for _ in 0..16 {
                writer.write_sample(8000i16).unwrap();
            }
            writer.finalize().unwrap();
        }

        let root = dir.path().to_str().unwrap().to_string();
        let config = OrchestratorConfig {
            sound_asset_root: root.clone(),
            north_asset_path: format!("{}/north.wav", root),
            landmark_asset_path: format!("{}/landmark.wav", root),
            ..Default::default()
        };

        let tracker = Arc::new(Mutex::new(ObjectTracker::new(TrackerConfig::default())));
        let sink = Arc::new(Mutex::new(MemorySink::new()));
        let profiles = Arc::new(Mutex::new(SonificationProfiles::new()));
        let engine = Arc::new(Mutex::new(SpatialAudioEngine::new(sink.clone(), profiles)));
        let landmarks = Arc::new(Mutex::new(LandmarkStore::new()));
        let signals = Arc::new(SharedSignals::new());

        let orchestrator = CueOrchestrator::new(
            config,
            tracker.clone(),
            engine,
            landmarks.clone(),
            signals.clone(),
            signals.clone(),
        );

        Fixture {
            orchestrator,
            sink,
            signals,
            landmarks,
            tracker,
            _dir: dir,
        }
    }

    fn detection(label: &str, score: f32, cx: f32) -> DetectedObject {
        DetectedObject {
            label: label.to_string(),
            score,
            bounding_box: DetectionBox::new(cx - 0.1, 0.4, cx + 0.1, 0.6),
        }
    }

    /// Summed magnitudes of the left and right channels of an interleaved
    /// stereo buffer.
    fn channel_energy(frames: &[i16]) -> (i64, i64) {
        let left = frames.iter().step_by(2).map(|&s| (s as i64).abs()).sum();
        let right = frames
            .iter()
            .skip(1)
            .step_by(2)
            .map(|&s| (s as i64).abs())
            .sum();
        (left, right)
    }

    #[test]
    fn object_cues_play_left_to_right() {
        let mut fx = fixture();
        fx.orchestrator.state.lock().unwrap().modes.north_cue_enabled = false;
        fx.tracker.lock().unwrap().update(
            &[detection("person", 0.9, 0.7), detection("chair", 0.8, 0.3)],
            0,
        );

        let report = fx.orchestrator.run_scene_cycle(0);
        assert_eq!(report.object_cues, 2);
        assert!(!report.north_cue);

        // The chair sits left of center, so it plays first even though the
        // person ranks higher.
        let sink = fx.sink.lock().unwrap();
        assert_eq!(sink.writes.len(), 2);
        let (first_left, first_right) = channel_energy(&sink.writes[0].frames);
        let (second_left, second_right) = channel_energy(&sink.writes[1].frames);
        assert!(first_left > first_right);
        assert!(second_right > second_left);
    }

    #[test]
    fn north_cue_fires_on_empty_scenes_under_cooldown() {
        let mut fx = fixture();
        fx.signals.set_heading(HeadingReading {
            degrees: 90.0,
            accuracy_deg: 5.0,
        });

        let report = fx.orchestrator.run_scene_cycle(0);
        assert!(report.north_cue);
        {
            // Facing east puts north hard left.
            let sink = fx.sink.lock().unwrap();
            assert_eq!(sink.writes.len(), 1);
            let (left, right) = channel_energy(&sink.writes[0].frames);
            assert!(left > right);
        }

        // Inside the cooldown: nothing.
        let report = fx.orchestrator.run_scene_cycle(1000);
        assert!(!report.north_cue);
        assert_eq!(fx.sink.lock().unwrap().writes.len(), 1);

        // Cooldown elapsed: fires again.
        let report = fx.orchestrator.run_scene_cycle(6000);
        assert!(report.north_cue);
        assert_eq!(fx.sink.lock().unwrap().writes.len(), 2);
    }

    #[test]
    fn missing_heading_silently_skips_the_north_cue() {
        let mut fx = fixture();
        let report = fx.orchestrator.run_scene_cycle(0);
        assert!(!report.north_cue);
        assert!(fx.sink.lock().unwrap().writes.is_empty());
    }

    #[test]
    fn ranked_objects_preempt_north_and_landmark_cues() {
        let mut fx = fixture();
        fx.signals.set_heading(HeadingReading {
            degrees: 0.0,
            accuracy_deg: 5.0,
        });
        fx.signals.set_location(GeoFix {
            point: GeoPoint::new(0.0, 0.0),
            horizontal_accuracy_m: 5.0,
        });
        fx.landmarks
            .lock()
            .unwrap()
            .save("exit", GeoPoint::new(0.0, 0.001), 5.0, 0);
        fx.tracker
            .lock()
            .unwrap()
            .update(&[detection("person", 0.9, 0.5)], 0);

        let report = fx.orchestrator.run_scene_cycle(0);
        assert!(!report.north_cue);
        assert!(!report.landmark_cue);
        assert_eq!(report.object_cues, 1);
    }

    #[test]
    fn landmark_cue_points_toward_the_nearest_landmark() {
        let mut fx = fixture();
        fx.orchestrator.state.lock().unwrap().modes.north_cue_enabled = false;
        fx.signals.set_heading(HeadingReading {
            degrees: 0.0,
            accuracy_deg: 5.0,
        });
        fx.signals.set_location(GeoFix {
            point: GeoPoint::new(0.0, 0.0),
            horizontal_accuracy_m: 5.0,
        });
        // East is close, north is far; the cue should pan right.
        fx.landmarks
            .lock()
            .unwrap()
            .save("east door", GeoPoint::new(0.0, 0.001), 5.0, 0);
        fx.landmarks
            .lock()
            .unwrap()
            .save("north gate", GeoPoint::new(0.1, 0.0), 5.0, 0);

        let report = fx.orchestrator.run_scene_cycle(0);
        assert!(report.landmark_cue);
        let sink = fx.sink.lock().unwrap();
        assert_eq!(sink.writes.len(), 1);
        let (left, right) = channel_energy(&sink.writes[0].frames);
        assert!(right > left);
    }

    #[test]
    fn disabled_sonification_suppresses_objects_but_not_north() {
        let mut fx = fixture();
        fx.orchestrator
            .state
            .lock()
            .unwrap()
            .modes
            .sonification_enabled = false;
        fx.signals.set_heading(HeadingReading {
            degrees: 0.0,
            accuracy_deg: 5.0,
        });
        fx.tracker
            .lock()
            .unwrap()
            .update(&[detection("person", 0.9, 0.5)], 0);

        let report = fx.orchestrator.run_scene_cycle(0);
        assert_eq!(report.object_cues, 0);
        assert!(report.north_cue);
    }

    #[test]
    fn class_filter_narrows_object_cues() {
        let mut fx = fixture();
        fx.orchestrator.state.lock().unwrap().modes.north_cue_enabled = false;
        fx.orchestrator.state.lock().unwrap().modes.class_filter = Some("chair".to_string());
        fx.tracker.lock().unwrap().update(
            &[detection("person", 0.9, 0.7), detection("chair", 0.8, 0.3)],
            0,
        );

        let report = fx.orchestrator.run_scene_cycle(0);
        assert_eq!(report.object_cues, 1);
    }

    #[test]
    fn ping_plays_even_with_objects_in_view() {
        let mut fx = fixture();
        fx.orchestrator.state.lock().unwrap().modes.north_cue_enabled = false;
        fx.signals.set_heading(HeadingReading {
            degrees: 0.0,
            accuracy_deg: 5.0,
        });
        fx.signals.set_location(GeoFix {
            point: GeoPoint::new(0.0, 0.0),
            horizontal_accuracy_m: 5.0,
        });
        fx.landmarks
            .lock()
            .unwrap()
            .save("door", GeoPoint::new(0.0, 0.001), 5.0, 0);
        fx.orchestrator.state.lock().unwrap().pending_ping = Some("door".to_string());
        fx.tracker
            .lock()
            .unwrap()
            .update(&[detection("person", 0.9, 0.5)], 0);

        let report = fx.orchestrator.run_scene_cycle(0);
        assert!(report.ping_cue);
        assert_eq!(report.object_cues, 1);
        assert_eq!(fx.sink.lock().unwrap().writes.len(), 2);

        // The ping was consumed; the next cycle does not repeat it.
        let report = fx.orchestrator.run_scene_cycle(1000);
        assert!(!report.ping_cue);
    }

    #[test]
    fn spawned_loop_stops_promptly_and_releases_audio() {
        let mut fx = fixture();
        fx.orchestrator.config.refresh_rate_hz = 3.0;
        let sink = fx.sink.clone();

        let handle = fx.orchestrator.spawn();
        thread::sleep(Duration::from_millis(60));
        handle.stop();

        // Shutdown released the active playback.
        assert!(sink.lock().unwrap().stops >= 1);
    }
}
