//! SoundSight turns a wearable camera feed into spatial audio. An external
//! detector hands us labeled bounding boxes each frame; we track them across
//! frames, rank them by how much the user probably cares, budget a handful
//! of cues into each scene window, and render every cue binaurally through a
//! head-related impulse response database so objects are heard where they
//! are. Periodic cues for magnetic north and saved GPS landmarks ride along
//! when the scene is quiet.
//!
//! The crate is the core pipeline only: camera transport, the detection
//! model, GUI, speech-to-text, and platform audio output all live behind
//! boundary traits ([`detector::ObjectDetector`], [`sink::AudioSink`],
//! [`signals::HeadingProvider`], [`signals::LocationProvider`]).
//!
//! Data flows detector -> [`tracker`] -> [`ranking`] -> [`scheduler`] ->
//! [`orchestrator`] -> [`engine`] -> audio sink.

pub mod args;
pub mod asset;
pub mod commands;
pub mod detection;
pub mod detector;
pub mod dsp;
pub mod engine;
pub mod geo;
pub mod hrir;
pub mod hrir_compact;
pub mod landmark;
pub mod measurement;
pub mod orchestrator;
pub mod profiles;
pub mod ranking;
pub mod scheduler;
pub mod signals;
pub mod sink;
pub mod tracker;
