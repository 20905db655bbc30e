//! Per-class sonification profiles: how loud, how fast, and how bright each
//! object class sounds. An explicitly owned store replaces the global table
//! the platform version grew; the pipeline shares one instance behind a
//! single mutex.

use crate::ranking::normalize_label;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, fs, path::Path};

/// Rendering knobs for one object class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectSonificationProfile {
    /// Output gain applied after tilt shaping.
    pub gain: f32,
    /// Multiplier on the engine's target sample rate; >1 plays brighter and
    /// shorter, <1 darker and longer.
    pub playback_rate_scale: f32,
    /// Strength of the first-difference tilt mixed into the dry signal.
    pub tilt_eq: f32,
}

impl Default for ObjectSonificationProfile {
    fn default() -> Self {
        Self {
            gain: 0.8,
            playback_rate_scale: 1.0,
            tilt_eq: 0.0,
        }
    }
}

#[derive(Debug)]
pub enum ProfileError {
    Io(std::io::Error),
    Ron(ron::de::SpannedError),
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProfileError::Io(error) => write!(f, "io error: {}", error),
            ProfileError::Ron(error) => write!(f, "ron error: {}", error),
        }
    }
}

impl std::error::Error for ProfileError {}

/// The process-wide profile table: class defaults plus user overrides.
/// Lookups fall back default-profile-first, so unknown classes always
/// resolve.
#[derive(Debug, Clone)]
pub struct SonificationProfiles {
    overrides: HashMap<String, ObjectSonificationProfile>,
}

impl Default for SonificationProfiles {
    fn default() -> Self {
        Self::new()
    }
}

impl SonificationProfiles {
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
        }
    }

    /// Built-in defaults per class. People get a slightly hotter, brighter
    /// cue than furniture.
    fn default_for(normalized_label: &str) -> ObjectSonificationProfile {
        match normalized_label {
            "person" => ObjectSonificationProfile {
                gain: 0.9,
                playback_rate_scale: 1.0,
                tilt_eq: 0.2,
            },
            "door" => ObjectSonificationProfile {
                gain: 0.85,
                playback_rate_scale: 0.9,
                tilt_eq: 0.1,
            },
            "chair" | "table" => ObjectSonificationProfile {
                gain: 0.75,
                playback_rate_scale: 0.95,
                tilt_eq: 0.0,
            },
            "cup" | "phone" => ObjectSonificationProfile {
                gain: 0.7,
                playback_rate_scale: 1.1,
                tilt_eq: 0.3,
            },
            _ => ObjectSonificationProfile::default(),
        }
    }

    /// The effective profile for a label, override-first.
    pub fn profile_for(&self, label: &str) -> ObjectSonificationProfile {
        let normalized = normalize_label(label);
        self.overrides
            .get(&normalized)
            .copied()
            .unwrap_or_else(|| Self::default_for(&normalized))
    }

    /// Installs a user override for one class.
    pub fn set_override(&mut self, label: &str, profile: ObjectSonificationProfile) {
        self.overrides.insert(normalize_label(label), profile);
    }

    /// Drops all overrides, restoring built-in defaults.
    pub fn reset_to_defaults(&mut self) {
        self.overrides.clear();
    }

    /// Loads overrides from a RON map of label to profile, e.g.
    /// `{"person": (gain: 1.0, playback_rate_scale: 1.2, tilt_eq: 0.5)}`.
    pub fn load_overrides(&mut self, path: impl AsRef<Path>) -> Result<(), ProfileError> {
        let text = fs::read_to_string(path).map_err(ProfileError::Io)?;
        let parsed: HashMap<String, ObjectSonificationProfile> =
            ron::from_str(&text).map_err(ProfileError::Ron)?;
        for (label, profile) in parsed {
            self.set_override(&label, profile);
        }
        Ok(())
    }
}
