//! Fits ranked cue candidates into the scene's time budget. The walk is
//! greedy but forgiving: a candidate that does not fit is skipped, not a
//! reason to stop, so a short cue later in the ranking can still ride along.
//! An over-long top candidate is force-admitted alone so a non-empty scene
//! always says something.

use crate::ranking::RankedObjectCandidate;
use std::collections::HashMap;

/// Silence inserted between consecutive cues in one scene window.
pub const INTER_CUE_GAP_MS: u64 = 150;

/// Assumed duration when an asset cannot be probed.
pub const DEFAULT_CUE_DURATION_MS: u64 = 400;

/// Resolves the playback duration of a cue asset. Implemented by the audio
/// engine; faked freely in tests.
pub trait DurationProbe {
    /// Duration of the asset in milliseconds, or `None` when probing fails.
    fn probe_duration_ms(&mut self, asset_path: &str) -> Option<u64>;
}

/// Length of one scene cycle for a given refresh rate. Rates are clamped to
/// [0.3, 3.0] Hz, the result floored to whole milliseconds, minimum 1.
pub fn scene_window_ms(refresh_rate_hz: f32) -> u64 {
    let clamped = refresh_rate_hz.clamp(0.3, 3.0);
    ((1000.0 / clamped).floor() as u64).max(1)
}

/// One admitted cue with its resolved duration.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneCueEntry {
    pub candidate: RankedObjectCandidate,
    pub duration_ms: u64,
}

/// The cue schedule for one scene cycle. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneCuePlan {
    pub entries: Vec<SceneCueEntry>,
    pub scene_window_ms: u64,
    pub inter_cue_gap_ms: u64,
}

impl SceneCuePlan {
    /// How many objects this scene can communicate.
    pub fn max_communicable_objects(&self) -> usize {
        self.entries.len()
    }

    /// Total time the plan consumes: durations plus a gap after every entry
    /// but the last.
    pub fn consumed_ms(&self) -> u64 {
        let durations: u64 = self.entries.iter().map(|e| e.duration_ms).sum();
        let gaps = self.entries.len().saturating_sub(1) as u64 * self.inter_cue_gap_ms;
        durations + gaps
    }
}

/// Builds scene plans, caching resolved asset durations across cycles.
#[derive(Debug, Default)]
pub struct SceneCueScheduler {
    duration_cache: HashMap<String, u64>,
}

impl SceneCueScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Greedily admits ranked candidates whose duration plus gap still fits
    /// the window. When not even the first candidate fits on its own, it is
    /// admitted anyway as the plan's only entry.
    pub fn build_scene_plan(
        &mut self,
        ranked: &[RankedObjectCandidate],
        refresh_rate_hz: f32,
        probe: &mut dyn DurationProbe,
    ) -> SceneCuePlan {
        let window = scene_window_ms(refresh_rate_hz);
        let mut entries: Vec<SceneCueEntry> = Vec::new();
        let mut consumed: u64 = 0;

        for candidate in ranked {
            let duration = self.resolve_duration(&candidate.sound_asset_path, probe);
            let increment = if entries.is_empty() {
                duration
            } else {
                duration + INTER_CUE_GAP_MS
            };
            if consumed + increment <= window {
                consumed += increment;
                entries.push(SceneCueEntry {
                    candidate: candidate.clone(),
                    duration_ms: duration,
                });
            }
            // Too long for what's left: skip and keep trying later, shorter
            // candidates.
        }

        if entries.is_empty() {
            if let Some(top) = ranked.first() {
                let duration = self.resolve_duration(&top.sound_asset_path, probe);
                entries.push(SceneCueEntry {
                    candidate: top.clone(),
                    duration_ms: duration,
                });
            }
        }

        SceneCuePlan {
            entries,
            scene_window_ms: window,
            inter_cue_gap_ms: INTER_CUE_GAP_MS,
        }
    }

    fn resolve_duration(&mut self, asset_path: &str, probe: &mut dyn DurationProbe) -> u64 {
        if let Some(&cached) = self.duration_cache.get(asset_path) {
            return cached;
        }
        let duration = probe
            .probe_duration_ms(asset_path)
            .unwrap_or(DEFAULT_CUE_DURATION_MS);
        self.duration_cache.insert(asset_path.to_string(), duration);
        duration
    }
}
