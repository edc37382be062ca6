use crate::{LyricSyncError, Result};

/// Decoded audio recording. Produced once per run by the decoding
/// collaborator and treated as read-only by the engine.
#[derive(Debug, Clone)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSignal {
    /// Wraps decoded mono samples. Rejects empty input and a zero sample
    /// rate up front so the analysis stages never have to re-validate.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(LyricSyncError::InvalidInput(
                "audio signal requires at least one sample",
            ));
        }
        if sample_rate == 0 {
            return Err(LyricSyncError::InvalidInput(
                "audio signal requires a positive sample rate",
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total duration in seconds.
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Playback collaborator contract. The binary crate implements it over an
/// actual output device; tests drive the capture loop with scripted fakes.
pub trait Player {
    /// Starts (or restarts) playback from the beginning of the recording and
    /// resets the elapsed-time reference.
    fn play(&mut self) -> Result<()>;

    /// Stops playback.
    fn stop(&mut self);

    /// Wall-clock seconds elapsed since the last (re)start of playback.
    /// Monotonically non-decreasing between calls to [`Player::play`].
    fn elapsed(&self) -> f32;
}
