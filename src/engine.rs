//! The binaural spatial audio engine. Takes a cue request (asset, class
//! label, direction), renders it through the per-class profile, the HRIR
//! database, and the DSP kernels, and hands interleaved stereo PCM to the
//! audio sink. Also owns the decoded-asset cache and the output-route
//! adaptation logic.
//!
//! Every stage failure degrades: a bad asset skips the cue, a missing HRIR
//! falls back to stereo panning, a failed write reports a zero duration.
//! Nothing here can take the scene loop down.

use crate::asset::{decode_wav_mono, MonoPcm};
use crate::dsp;
use crate::hrir::HrirDatabase;
use crate::hrir_compact::load_compact_hrir;
use crate::measurement::load_measurement_document;
use crate::profiles::SonificationProfiles;
use crate::sink::{AudioSink, OutputDevice};
use log::{debug, warn};
use std::{
    collections::HashMap,
    fmt::Write as _,
    path::Path,
    sync::{Arc, Mutex},
};

/// Target sample rate clamp, in Hz.
const MIN_TARGET_RATE_HZ: u32 = 8000;
const MAX_TARGET_RATE_HZ: u32 = 96000;

/// Route rebinds closer together than this are suppressed.
pub const ROUTE_REBIND_COOLDOWN_MS: u64 = 250;

/// What changed when the output route moved.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteChange {
    pub bluetooth_active: bool,
    pub device: Option<OutputDevice>,
}

type RouteListener = Box<dyn Fn(&RouteChange) + Send>;

/// The most recent buffer handed to the sink, kept so a route change can
/// re-bind playback onto the new device.
struct ActiveCue {
    frames: Vec<i16>,
    sample_rate_hz: u32,
}

pub struct SpatialAudioEngine {
    sink: Arc<Mutex<dyn AudioSink + Send>>,
    profiles: Arc<Mutex<SonificationProfiles>>,
    hrir: Option<HrirDatabase>,
    hrir_load_error: Option<String>,
    decode_cache: HashMap<String, MonoPcm>,
    preferred_device: Option<OutputDevice>,
    bluetooth_active: bool,
    last_rebind_ms: Option<u64>,
    route_listener: Option<RouteListener>,
    active_cue: Option<ActiveCue>,
    trace: String,
}

impl SpatialAudioEngine {
    pub fn new(
        sink: Arc<Mutex<dyn AudioSink + Send>>,
        profiles: Arc<Mutex<SonificationProfiles>>,
    ) -> Self {
        Self {
            sink,
            profiles,
            hrir: None,
            hrir_load_error: None,
            decode_cache: HashMap::new(),
            preferred_device: None,
            bluetooth_active: false,
            last_rebind_ms: None,
            route_listener: None,
            active_cue: None,
            trace: String::new(),
        }
    }

    /// Loads the compact binary HRIR database. On failure the engine keeps
    /// running without one (stereo-pan fallback) and retains the reason.
    pub fn load_hrir_compact(&mut self, path: impl AsRef<Path>) -> bool {
        match load_compact_hrir(&path) {
            Ok(db) => {
                debug!(
                    "loaded compact HRIR database: {} entries at {} Hz",
                    db.entries.len(),
                    db.sample_rate_hz
                );
                self.hrir = Some(db);
                self.hrir_load_error = None;
                true
            }
            Err(error) => {
                warn!("compact HRIR load failed: {}", error);
                self.hrir_load_error = Some(error.to_string());
                false
            }
        }
    }

    /// Loads an HRIR database from a generic measurement document.
    pub fn load_hrir_measurements(&mut self, path: impl AsRef<Path>) -> bool {
        match load_measurement_document(&path) {
            Ok(db) => {
                self.hrir = Some(db);
                self.hrir_load_error = None;
                true
            }
            Err(error) => {
                warn!("measurement HRIR load failed: {}", error);
                self.hrir_load_error = Some(error.to_string());
                false
            }
        }
    }

    pub fn hrir(&self) -> Option<&HrirDatabase> {
        self.hrir.as_ref()
    }

    /// Why the last HRIR load failed, if it did.
    pub fn hrir_load_error(&self) -> Option<&str> {
        self.hrir_load_error.as_deref()
    }

    pub fn set_route_listener(&mut self, listener: impl Fn(&RouteChange) + Send + 'static) {
        self.route_listener = Some(Box::new(listener));
    }

    /// The debug trace of the most recently rendered cue.
    pub fn last_trace(&self) -> &str {
        &self.trace
    }

    /// Renders and plays one spatial cue. Returns the cue duration in
    /// milliseconds; zero means the cue failed (bad asset or sink write).
    pub fn play_spatial_cue(
        &mut self,
        asset_path: &str,
        label: &str,
        azimuth_deg: f32,
        elevation_deg: f32,
    ) -> u64 {
        self.trace.clear();

        let profile = self.profiles.lock().unwrap().profile_for(label);

        let pcm = match self.cached_decode(asset_path) {
            Some(pcm) => pcm,
            None => {
                let _ = writeln!(self.trace, "decode: failed for {}", asset_path);
                return 0;
            }
        };
        let _ = writeln!(
            self.trace,
            "decode: {} samples at {} Hz",
            pcm.samples.len(),
            pcm.sample_rate_hz
        );

        let base_rate = self
            .hrir
            .as_ref()
            .map(|db| db.sample_rate_hz)
            .unwrap_or(pcm.sample_rate_hz);
        let target_rate = ((base_rate as f32 * profile.playback_rate_scale) as u32)
            .clamp(MIN_TARGET_RATE_HZ, MAX_TARGET_RATE_HZ);

        let resampled = dsp::resample_linear(&pcm.samples, pcm.sample_rate_hz, target_rate);
        let _ = writeln!(
            self.trace,
            "resample: {} -> {} Hz, {} samples",
            pcm.sample_rate_hz,
            target_rate,
            resampled.len()
        );

        let shaped = dsp::shape_tilt_gain(&resampled, profile.tilt_eq, profile.gain);

        let (left, right) = self.spatialize(&shaped, azimuth_deg, elevation_deg);

        let frames = dsp::interleave_i16(&left, &right);
        let frame_count = frames.len() / 2;

        // Overlapping cues are not supported: a new cue displaces whatever
        // is still playing.
        let mut sink = self.sink.lock().unwrap();
        if self.active_cue.take().is_some() {
            sink.stop();
            sink.flush();
        }
        let write_result = sink.write(&frames, target_rate, self.preferred_device.as_ref());
        drop(sink);
        if let Err(error) = write_result {
            let _ = writeln!(self.trace, "write: failed ({})", error);
            warn!("cue write failed: {}", error);
            return 0;
        }

        self.active_cue = Some(ActiveCue {
            frames,
            sample_rate_hz: target_rate,
        });

        let duration_ms = ((frame_count as u64 * 1000) / target_rate as u64).max(1);
        let _ = writeln!(self.trace, "write: ok, {} ms", duration_ms);
        duration_ms
    }

    /// Duration of an asset at its native rate, used by the scheduler to
    /// budget the scene window. `None` when the asset cannot be decoded.
    pub fn probe_duration_ms(&mut self, asset_path: &str) -> Option<u64> {
        let pcm = self.cached_decode(asset_path)?;
        Some(((pcm.samples.len() as u64 * 1000) / pcm.sample_rate_hz as u64).max(1))
    }

    /// Platform callback: the set of available output devices changed.
    /// Re-evaluates the preferred wireless route; an actual change notifies
    /// the listener and re-binds active playback, at most once per cooldown.
    pub fn handle_route_change(&mut self, devices: &[OutputDevice], now_ms: u64) {
        if let Some(last) = self.last_rebind_ms {
            if now_ms.saturating_sub(last) < ROUTE_REBIND_COOLDOWN_MS {
                debug!("route change suppressed inside cooldown");
                return;
            }
        }

        let preferred = devices.iter().find(|d| d.wireless).cloned();
        let bluetooth_active = preferred.is_some();
        let identity_changed = match (&self.preferred_device, &preferred) {
            (Some(a), Some(b)) => a.id != b.id,
            (None, None) => false,
            _ => true,
        };

        if bluetooth_active == self.bluetooth_active && !identity_changed {
            return;
        }

        self.preferred_device = preferred.clone();
        self.bluetooth_active = bluetooth_active;
        self.last_rebind_ms = Some(now_ms);

        let change = RouteChange {
            bluetooth_active,
            device: preferred,
        };
        if let Some(listener) = &self.route_listener {
            listener(&change);
        }

        // Re-bind whatever is playing onto the new route.
        if let Some(active) = &self.active_cue {
            let mut sink = self.sink.lock().unwrap();
            sink.stop();
            sink.flush();
            if let Err(error) = sink.write(
                &active.frames,
                active.sample_rate_hz,
                self.preferred_device.as_ref(),
            ) {
                warn!("re-bind after route change failed: {}", error);
            }
        }
    }

    /// Stops and flushes any active playback.
    pub fn stop_playback(&mut self) {
        let mut sink = self.sink.lock().unwrap();
        sink.stop();
        sink.flush();
        drop(sink);
        self.active_cue = None;
    }

    /// Tears the engine down: stops playback and drops the decode cache.
    pub fn shutdown(&mut self) {
        self.stop_playback();
        self.decode_cache.clear();
    }

    fn spatialize(&mut self, shaped: &[f32], azimuth_deg: f32, elevation_deg: f32) -> (Vec<f32>, Vec<f32>) {
        if let Some(entry) = self
            .hrir
            .as_ref()
            .and_then(|db| db.nearest(azimuth_deg, elevation_deg))
        {
            let mut left = dsp::convolve(shaped, &entry.left);
            let mut right = dsp::convolve(shaped, &entry.right);
            dsp::normalize_pair(&mut left, &mut right);
            let _ = writeln!(
                self.trace,
                "hrir: matched ({}, {})",
                entry.azimuth_deg, entry.elevation_deg
            );
            (left, right)
        } else {
            let _ = writeln!(self.trace, "hrir: none, stereo pan fallback");
            dsp::stereo_pan(shaped, azimuth_deg, elevation_deg)
        }
    }

    fn cached_decode(&mut self, asset_path: &str) -> Option<MonoPcm> {
        if let Some(pcm) = self.decode_cache.get(asset_path) {
            return Some(pcm.clone());
        }
        match decode_wav_mono(asset_path) {
            Ok(pcm) => {
                self.decode_cache
                    .insert(asset_path.to_string(), pcm.clone());
                Some(pcm)
            }
            Err(error) => {
                warn!("asset decode failed for {}: {}", asset_path, error);
                None
            }
        }
    }
}

impl crate::scheduler::DurationProbe for SpatialAudioEngine {
    fn probe_duration_ms(&mut self, asset_path: &str) -> Option<u64> {
        SpatialAudioEngine::probe_duration_ms(self, asset_path)
    }
}
