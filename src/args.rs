// Commandline argument parser using clap for SoundSight

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct SoundSightArgs {
    /// Which task to perform, the demo pipeline or database conversion
    #[command(subcommand)]
    pub command: CommandTask,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Run the cue pipeline against a dummy detector, rendering to a WAV file
    #[command(about)]
    Run(RunCommand),

    /// Convert a measurement document into the compact HRIR binary
    #[command(about)]
    Convert(ConvertCommand),
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct RunCommand {
    /// Compact HRIR database; falls back to stereo panning when omitted
    #[arg(long = "hrir")]
    pub hrir_path: Option<String>,

    /// Measurement document (JSON) to load instead of a compact database
    #[arg(long = "measurements")]
    pub measurement_path: Option<String>,

    /// Directory containing the per-class cue sounds
    #[arg(short = 'a', long = "assets")]
    pub asset_root: String,

    /// Filename the rendered stereo cues are appended to
    #[arg(short = 'o', long = "out")]
    pub outfile: String,

    /// Scene refresh rate in cycles per second
    #[arg(short = 'r', long = "refresh", default_value_t = 1.0)]
    pub refresh_rate_hz: f32,

    /// How many scene cycles to run before exiting
    #[arg(short = 'c', long = "cycles", default_value_t = 5)]
    pub cycles: u32,

    /// Optional RON file with per-class sonification overrides
    #[arg(long = "profiles")]
    pub profile_overrides: Option<String>,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct ConvertCommand {
    /// Input measurement document (JSON)
    #[arg(short = 'i', long = "in")]
    pub infile: String,

    /// Output path for the compact HRIR binary
    #[arg(short = 'o', long = "out")]
    pub outfile: String,

    /// Azimuth bin step in degrees; duplicate directions collapse
    #[arg(long = "az-step", default_value_t = 3.0)]
    pub az_step_deg: f32,

    /// Elevation bin step in degrees
    #[arg(long = "el-step", default_value_t = 3.0)]
    pub el_step_deg: f32,
}
