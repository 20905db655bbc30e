//! Decodes cue sound assets to mono float PCM. Assets are plain RIFF/WAVE
//! containers holding uncompressed 16-bit integer PCM, one or two channels;
//! anything else is a decode failure the engine downgrades to a skipped cue.

use hound::{SampleFormat, WavReader};
use std::{fmt, fs::File, io::Read, path::Path};

/// A decoded asset: mono samples in [-1, 1] at the container's sample rate.
/// Immutable once decoded; the engine caches these by asset path.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoPcm {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

#[derive(Debug)]
pub enum AssetDecodeError {
    /// The container was unreadable or not a WAVE file at all.
    Wav(hound::Error),
    /// Compressed or floating-point payloads are not cue material.
    NotIntegerPcm,
    UnsupportedBitDepth(u16),
    UnsupportedChannelCount(u16),
}

impl fmt::Display for AssetDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use AssetDecodeError as E;
        match self {
            E::Wav(error) => write!(f, "wav error: {}", error),
            E::NotIntegerPcm => write!(f, "asset is not integer PCM"),
            E::UnsupportedBitDepth(bits) => write!(f, "unsupported bit depth {}", bits),
            E::UnsupportedChannelCount(n) => write!(f, "unsupported channel count {}", n),
        }
    }
}

impl std::error::Error for AssetDecodeError {}

impl From<hound::Error> for AssetDecodeError {
    fn from(error: hound::Error) -> Self {
        AssetDecodeError::Wav(error)
    }
}

/// Decodes the WAV file at `path` to mono PCM.
pub fn decode_wav_mono(path: impl AsRef<Path>) -> Result<MonoPcm, AssetDecodeError> {
    let file = File::open(path).map_err(hound::Error::IoError)?;
    decode_wav_mono_from(file)
}

/// Decodes a WAV container from any reader. Stereo input is downmixed by
/// averaging the two channels.
pub fn decode_wav_mono_from(reader: impl Read) -> Result<MonoPcm, AssetDecodeError> {
    let mut wav = WavReader::new(reader)?;
    let spec = wav.spec();

    if spec.sample_format != SampleFormat::Int {
        return Err(AssetDecodeError::NotIntegerPcm);
    }
    if spec.bits_per_sample != 16 {
        return Err(AssetDecodeError::UnsupportedBitDepth(spec.bits_per_sample));
    }
    if spec.channels == 0 || spec.channels > 2 {
        return Err(AssetDecodeError::UnsupportedChannelCount(spec.channels));
    }

    let raw: Vec<i16> = wav
        .samples::<i16>()
        .collect::<Result<Vec<i16>, hound::Error>>()?;

    let samples = if spec.channels == 1 {
        raw.iter().map(|&s| s as f32 / 32768.0).collect()
    } else {
        raw.chunks_exact(2)
            .map(|frame| (frame[0] as f32 + frame[1] as f32) / 2.0 / 32768.0)
            .collect()
    };

    Ok(MonoPcm {
        sample_rate_hz: spec.sample_rate,
        samples,
    })
}
