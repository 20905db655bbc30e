//! The audio output boundary. The engine renders interleaved 16-bit stereo
//! PCM and hands it to an [`AudioSink`]; what sits behind the trait is
//! platform plumbing we do not own. Two implementations ship with the crate:
//! a [`WavFileSink`] that appends rendered cues to a WAV file, and a
//! [`MemorySink`] used by tests and dry runs.

use hound::{SampleFormat, WavSpec, WavWriter};
use log::{debug, warn};
use std::{fmt, fs::File, io::BufWriter, path::Path};

/// An output route the platform reports, e.g. built-in speaker or a paired
/// bluetooth device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDevice {
    pub id: String,
    pub name: String,
    pub wireless: bool,
}

#[derive(Debug)]
pub enum SinkError {
    /// The device rejected or dropped the buffer.
    WriteFailed(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SinkError::WriteFailed(reason) => write!(f, "sink write failed: {}", reason),
        }
    }
}

impl std::error::Error for SinkError {}

/// Accepts interleaved stereo PCM for playback. One buffer is one cue; a new
/// write implicitly supersedes whatever was playing.
pub trait AudioSink {
    /// Plays (or queues) one interleaved stereo buffer at the given rate,
    /// preferring `device` when provided.
    fn write(
        &mut self,
        frames: &[i16],
        sample_rate_hz: u32,
        device: Option<&OutputDevice>,
    ) -> Result<(), SinkError>;

    /// Stops the active playback, if any.
    fn stop(&mut self);

    /// Discards any queued-but-unplayed audio.
    fn flush(&mut self);
}

/// Appends every rendered cue to a single WAV file. Useful for demos and
/// for auditing what the pipeline would have played.
pub struct WavFileSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    sample_rate_hz: u32,
}

impl WavFileSink {
    /// Creates the output file eagerly so configuration errors surface at
    /// startup rather than mid-scene.
    pub fn create(path: impl AsRef<Path>, sample_rate_hz: u32) -> Result<Self, hound::Error> {
        let spec = WavSpec {
            channels: 2,
            sample_rate: sample_rate_hz,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)?;
        Ok(Self {
            writer: Some(writer),
            sample_rate_hz,
        })
    }

    /// Finishes the WAV header. Dropping the sink does this too; calling it
    /// explicitly surfaces the error.
    pub fn finalize(mut self) -> Result<(), hound::Error> {
        match self.writer.take() {
            Some(writer) => writer.finalize(),
            None => Ok(()),
        }
    }
}

impl AudioSink for WavFileSink {
    fn write(
        &mut self,
        frames: &[i16],
        sample_rate_hz: u32,
        device: Option<&OutputDevice>,
    ) -> Result<(), SinkError> {
        if sample_rate_hz != self.sample_rate_hz {
            // The file spec is fixed; mismatched cues land pitched.
            debug!(
                "wav sink: cue rate {} differs from file rate {}",
                sample_rate_hz, self.sample_rate_hz
            );
        }
        if let Some(device) = device {
            debug!("wav sink: preferred device {}", device.name);
        }

        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => return Err(SinkError::WriteFailed("sink already finalized".into())),
        };

        for &sample in frames {
            writer
                .write_sample(sample)
                .map_err(|e| SinkError::WriteFailed(e.to_string()))?;
        }
        // Flush after each cue so the header stays consistent on disk.
        writer
            .flush()
            .map_err(|e| SinkError::WriteFailed(e.to_string()))
    }

    fn stop(&mut self) {
        // File output has no live playback to halt.
    }

    fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(error) = writer.flush() {
                warn!("wav sink flush failed: {}", error);
            }
        }
    }
}

/// Records every write it receives. Can be told to fail, which the engine
/// treats as a zero-duration cue.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub writes: Vec<RecordedWrite>,
    pub stops: usize,
    pub flushes: usize,
    pub fail_writes: bool,
}

/// One captured [`AudioSink::write`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub frames: Vec<i16>,
    pub sample_rate_hz: u32,
    pub device_id: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AudioSink for MemorySink {
    fn write(
        &mut self,
        frames: &[i16],
        sample_rate_hz: u32,
        device: Option<&OutputDevice>,
    ) -> Result<(), SinkError> {
        if self.fail_writes {
            return Err(SinkError::WriteFailed("forced failure".into()));
        }
        self.writes.push(RecordedWrite {
            frames: frames.to_vec(),
            sample_rate_hz,
            device_id: device.map(|d| d.id.clone()),
        });
        Ok(())
    }

    fn stop(&mut self) {
        self.stops += 1;
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
