//! Abstract voice commands and the port that applies them to the running
//! pipeline. Speech-to-text and phrase parsing happen upstream; by the time
//! a command reaches this module it is already structured. Every command
//! produces a typed outcome the UI layer can speak back to the user.

use crate::landmark::{ForgetOutcome, LandmarkStore, SaveOutcome};
use crate::orchestrator::SceneState;
use crate::profiles::SonificationProfiles;
use crate::ranking::normalize_label;
use crate::signals::LocationProvider;
use std::sync::{Arc, Mutex};

/// Everything the user can ask for by voice.
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceCommand {
    /// Save the current location under a name.
    SaveLandmark(String),
    /// Delete a saved landmark.
    ForgetLandmark(String),
    /// Point recurring landmark cues at this landmark.
    TrackLandmark(String),
    /// One-shot "where is it" cue toward a landmark.
    PingLandmark(String),
    /// Restrict object cues to a single class, or lift the restriction.
    RestrictClass(Option<String>),
    SetNorthCue(bool),
    SetObjectSonification(bool),
    /// Drop all per-class sonification overrides.
    ResetProfiles,
}

/// What happened when a command was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    LandmarkSaved(String),
    LandmarkAlreadyExists(String),
    LandmarkRemoved(String),
    LandmarkNotFound(String),
    InvalidLandmarkName,
    /// Saving needs a position fix we do not currently have.
    LocationUnavailable,
    TrackingLandmark(String),
    PingQueued(String),
    ClassRestricted(Option<String>),
    NorthCueEnabled(bool),
    ObjectSonificationEnabled(bool),
    ProfilesReset,
}

/// Applies commands to the shared pipeline state. Cheap to clone around;
/// every field is a handle.
pub struct CommandPort {
    state: Arc<Mutex<SceneState>>,
    landmarks: Arc<Mutex<LandmarkStore>>,
    profiles: Arc<Mutex<SonificationProfiles>>,
    location: Arc<dyn LocationProvider>,
}

impl CommandPort {
    pub fn new(
        state: Arc<Mutex<SceneState>>,
        landmarks: Arc<Mutex<LandmarkStore>>,
        profiles: Arc<Mutex<SonificationProfiles>>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            state,
            landmarks,
            profiles,
            location,
        }
    }

    pub fn apply(&self, command: VoiceCommand, now_ms: u64) -> CommandOutcome {
        match command {
            VoiceCommand::SaveLandmark(name) => {
                let fix = match self.location.location() {
                    Some(fix) => fix,
                    None => return CommandOutcome::LocationUnavailable,
                };
                let outcome = self.landmarks.lock().unwrap().save(
                    &name,
                    fix.point,
                    fix.horizontal_accuracy_m,
                    now_ms,
                );
                match outcome {
                    SaveOutcome::Created => CommandOutcome::LandmarkSaved(name),
                    SaveOutcome::AlreadyExists => CommandOutcome::LandmarkAlreadyExists(name),
                    SaveOutcome::InvalidName => CommandOutcome::InvalidLandmarkName,
                }
            }
            VoiceCommand::ForgetLandmark(name) => {
                let outcome = self.landmarks.lock().unwrap().forget(&name);
                // Forgetting the tracked landmark also stops tracking it.
                if outcome == ForgetOutcome::Removed {
                    let mut state = self.state.lock().unwrap();
                    if state
                        .modes
                        .tracked_landmark
                        .as_deref()
                        .map(|t| t.eq_ignore_ascii_case(name.trim()))
                        .unwrap_or(false)
                    {
                        state.modes.tracked_landmark = None;
                    }
                }
                match outcome {
                    ForgetOutcome::Removed => CommandOutcome::LandmarkRemoved(name),
                    ForgetOutcome::NotFound => CommandOutcome::LandmarkNotFound(name),
                    ForgetOutcome::InvalidName => CommandOutcome::InvalidLandmarkName,
                }
            }
            VoiceCommand::TrackLandmark(name) => {
                if self.landmarks.lock().unwrap().get(&name).is_none() {
                    return CommandOutcome::LandmarkNotFound(name);
                }
                let trimmed = name.trim().to_string();
                self.state.lock().unwrap().modes.tracked_landmark = Some(trimmed.clone());
                CommandOutcome::TrackingLandmark(trimmed)
            }
            VoiceCommand::PingLandmark(name) => {
                if self.landmarks.lock().unwrap().get(&name).is_none() {
                    return CommandOutcome::LandmarkNotFound(name);
                }
                self.state.lock().unwrap().pending_ping = Some(name.clone());
                CommandOutcome::PingQueued(name)
            }
            VoiceCommand::RestrictClass(class) => {
                let normalized = class.map(|c| normalize_label(&c));
                self.state.lock().unwrap().modes.class_filter = normalized.clone();
                CommandOutcome::ClassRestricted(normalized)
            }
            VoiceCommand::SetNorthCue(enabled) => {
                self.state.lock().unwrap().modes.north_cue_enabled = enabled;
                CommandOutcome::NorthCueEnabled(enabled)
            }
            VoiceCommand::SetObjectSonification(enabled) => {
                self.state.lock().unwrap().modes.sonification_enabled = enabled;
                CommandOutcome::ObjectSonificationEnabled(enabled)
            }
            VoiceCommand::ResetProfiles => {
                self.profiles.lock().unwrap().reset_to_defaults();
                CommandOutcome::ProfilesReset
            }
        }
    }
}
