//! Demo driver for the SoundSight cue pipeline. Wires a dummy detector, the
//! shared tracker, and the scene loop together and renders every cue into a
//! WAV file, so the spatialization can be heard offline without a camera or
//! a platform audio stack.

use clap::Parser;
use log::{info, warn};
use soundsight::{
    args::{CommandTask, ConvertCommand, RunCommand, SoundSightArgs},
    commands::{CommandPort, VoiceCommand},
    detector::{DummyDetector, FramePipeline, YuvFrame},
    dsp,
    engine::SpatialAudioEngine,
    geo::GeoPoint,
    hrir::HrirDatabase,
    hrir_compact::write_compact_hrir,
    landmark::LandmarkStore,
    measurement::{collapse_direction_bins, load_measurement_document},
    orchestrator::{CueOrchestrator, OrchestratorConfig},
    profiles::SonificationProfiles,
    scheduler::scene_window_ms,
    signals::{GeoFix, HeadingReading, SharedSignals},
    sink::{AudioSink, OutputDevice, WavFileSink},
    tracker::{ObjectTracker, TrackerConfig},
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

/// Output rate of the demo WAV, matching the compact databases we ship.
const OUTPUT_SAMPLE_RATE_HZ: u32 = 24000;

/// Milliseconds between synthetic camera frames.
const FRAME_PERIOD_MS: u64 = 200;

fn main() {
    env_logger::init();
    let args = SoundSightArgs::parse();

    match args.command {
        CommandTask::Run(cmd) => run_pipeline(cmd),
        CommandTask::Convert(cmd) => convert_database(cmd),
    }
}

fn run_pipeline(cmd: RunCommand) {
    let profiles = Arc::new(Mutex::new(SonificationProfiles::new()));
    if let Some(path) = &cmd.profile_overrides {
        profiles
            .lock()
            .unwrap()
            .load_overrides(path)
            .expect("failed to load profile overrides");
    }

    let sink: Arc<Mutex<dyn AudioSink + Send>> = Arc::new(Mutex::new(
        WavFileSink::create(&cmd.outfile, OUTPUT_SAMPLE_RATE_HZ)
            .expect("failed to create output file"),
    ));

    let mut engine = SpatialAudioEngine::new(sink, profiles.clone());
    if let Some(path) = &cmd.hrir_path {
        if !engine.load_hrir_compact(path) {
            warn!(
                "continuing without HRIR database: {}",
                engine.hrir_load_error().unwrap_or("unknown")
            );
        }
    } else if let Some(path) = &cmd.measurement_path {
        if !engine.load_hrir_measurements(path) {
            warn!(
                "continuing without HRIR database: {}",
                engine.hrir_load_error().unwrap_or("unknown")
            );
        }
    }
    let engine = Arc::new(Mutex::new(engine));

    // Frame loop: a dummy detector stands in for the camera and the model.
    let tracker = Arc::new(Mutex::new(ObjectTracker::new(TrackerConfig::default())));
    let frame_stop = Arc::new(AtomicBool::new(false));
    let frame_thread = {
        let tracker = tracker.clone();
        let stop = frame_stop.clone();
        thread::spawn(move || {
            let mut pipeline = FramePipeline::new(
                Box::new(DummyDetector::new(&["person", "chair", "cup"])),
                tracker,
            );
            let started = Instant::now();
            let pixels = vec![0u8; 640 * 480 * 3 / 2];
            while !stop.load(Ordering::Relaxed) {
                let frame = YuvFrame {
                    width: 640,
                    height: 480,
                    data: &pixels,
                };
                pipeline.process_frame(&frame, started.elapsed().as_millis() as u64);
                spin_sleep::sleep(Duration::from_millis(FRAME_PERIOD_MS));
            }
        })
    };

    // Fixed heading and location stand in for the sensor feeds.
    let signals = Arc::new(SharedSignals::new());
    signals.set_heading(HeadingReading {
        degrees: 0.0,
        accuracy_deg: 5.0,
    });
    signals.set_location(GeoFix {
        point: GeoPoint::new(42.4075, -71.1190),
        horizontal_accuracy_m: 8.0,
    });

    let landmarks = Arc::new(Mutex::new(LandmarkStore::new()));

    let config = OrchestratorConfig {
        refresh_rate_hz: cmd.refresh_rate_hz,
        sound_asset_root: cmd.asset_root.clone(),
        north_asset_path: format!("{}/north.wav", cmd.asset_root),
        landmark_asset_path: format!("{}/landmark.wav", cmd.asset_root),
        ..Default::default()
    };
    let window = scene_window_ms(config.refresh_rate_hz);

    let orchestrator = CueOrchestrator::new(
        config,
        tracker,
        engine.clone(),
        landmarks.clone(),
        signals.clone(),
        signals.clone(),
    );
    let port = CommandPort::new(
        orchestrator.state_handle(),
        landmarks,
        profiles,
        signals.clone(),
    );
    let handle = orchestrator.spawn();

    info!(
        "scene loop running: {} cycles of {} ms",
        cmd.cycles, window
    );

    // Let half the cycles pass, then exercise the command surface: save the
    // starting position and ask where it is.
    let half = u64::from(cmd.cycles) * window / 2;
    thread::sleep(Duration::from_millis(half.max(1)));
    info!("save: {:?}", port.apply(VoiceCommand::SaveLandmark("start".into()), half));
    info!("ping: {:?}", port.apply(VoiceCommand::PingLandmark("start".into()), half));

    // Pretend a wireless headset paired mid-run.
    engine.lock().unwrap().handle_route_change(
        &[OutputDevice {
            id: "bt:demo".into(),
            name: "Demo Headset".into(),
            wireless: true,
        }],
        half,
    );

    thread::sleep(Duration::from_millis(
        (u64::from(cmd.cycles) * window).saturating_sub(half).max(1),
    ));

    handle.stop();
    frame_stop.store(true, Ordering::Relaxed);
    frame_thread.join().expect("frame loop panicked");

    info!("last cue trace:\n{}", engine.lock().unwrap().last_trace());
    info!("rendered cues written to {}", cmd.outfile);
}

fn convert_database(cmd: ConvertCommand) {
    let db =
        load_measurement_document(&cmd.infile).expect("failed to load measurement document");

    let entries = collapse_direction_bins(db.entries, cmd.az_step_deg, cmd.el_step_deg);
    let entries = entries
        .into_iter()
        .map(|mut entry| {
            // Quantization needs taps inside [-1, 1].
            dsp::normalize_pair(&mut entry.left, &mut entry.right);
            entry
        })
        .collect();

    let compact = HrirDatabase::new(db.sample_rate_hz, db.ir_length, entries);
    write_compact_hrir(&compact, &cmd.outfile).expect("failed to write compact database");

    println!(
        "wrote {} entries ({} taps at {} Hz) to {}",
        compact.entries.len(),
        compact.ir_length,
        compact.sample_rate_hz,
        cmd.outfile
    );
}
