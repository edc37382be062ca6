use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{
    config::{ActivityWeights, AnalysisConfig},
    cues::find_peaks,
    AudioSignal, LyricSyncError, Result,
};

/// Guards min-max normalization against a series with zero dynamic range.
const NORM_EPSILON: f32 = 1e-10;

/// Ordered per-frame feature values sharing one fixed time axis. The value
/// at index `i` describes the frame starting at `i * hop_seconds`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSeries {
    hop_seconds: f32,
    values: Vec<f32>,
}

impl FeatureSeries {
    pub fn new(hop_seconds: f32, values: Vec<f32>) -> Self {
        Self {
            hop_seconds,
            values,
        }
    }

    pub fn hop_seconds(&self) -> f32 {
        self.hop_seconds
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Timestamp of the frame at `index`.
    pub fn time_at(&self, index: usize) -> f32 {
        index as f32 * self.hop_seconds
    }

    /// Index of the frame closest to `time`, clamped into range.
    pub fn nearest_index(&self, time: f32) -> Option<usize> {
        if self.values.is_empty() {
            return None;
        }
        let raw = (time / self.hop_seconds).round();
        let clamped = raw.max(0.0) as usize;
        Some(clamped.min(self.values.len() - 1))
    }

    /// Min-max normalization onto [0, 1]. The denominator carries a small
    /// epsilon so a flat series maps to all zeros instead of dividing by
    /// zero.
    pub fn normalized(&self) -> FeatureSeries {
        let min = self.values.iter().copied().fold(f32::INFINITY, f32::min);
        let max = self
            .values
            .iter()
            .copied()
            .fold(f32::NEG_INFINITY, f32::max);
        let denom = max - min + NORM_EPSILON;
        let values = self.values.iter().map(|v| (v - min) / denom).collect();
        FeatureSeries::new(self.hop_seconds, values)
    }

    /// Percentile with linear interpolation between closest ranks. Returns
    /// 0.0 for an empty series.
    pub fn percentile(&self, p: f32) -> f32 {
        percentile(&self.values, p)
    }
}

pub(crate) fn percentile(values: &[f32], p: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f32;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f32;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}

/// Full feature set for one recording. All series are normalized to [0, 1]
/// and share the same frame spacing; onsets are discrete event timestamps,
/// not a regular series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub energy: FeatureSeries,
    pub brightness: FeatureSeries,
    pub rolloff: FeatureSeries,
    pub noisiness: FeatureSeries,
    pub onsets: Vec<f32>,
    pub duration_seconds: f32,
}

/// Derives the named feature series from raw audio samples. The FFT plan is
/// built once per frame length and reused across the whole signal.
pub struct FeatureExtractor {
    config: AnalysisConfig,
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl FeatureExtractor {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    /// Runs the whole batch extraction over an immutable signal.
    pub fn extract(&mut self, signal: &AudioSignal) -> Result<AudioFeatures> {
        let frame_length = self.config.frame_length;
        let hop_length = self.config.hop_length;
        let samples = signal.samples();
        if samples.len() < frame_length {
            return Err(LyricSyncError::InvalidInput(
                "audio is shorter than a single analysis frame",
            ));
        }

        let sample_rate = signal.sample_rate() as f32;
        let hop_seconds = hop_length as f32 / sample_rate;
        let frame_count = 1 + (samples.len() - frame_length) / hop_length;

        let mut energy = Vec::with_capacity(frame_count);
        let mut brightness = Vec::with_capacity(frame_count);
        let mut rolloff = Vec::with_capacity(frame_count);
        let mut noisiness = Vec::with_capacity(frame_count);
        let mut flux = Vec::with_capacity(frame_count);
        let mut previous_magnitudes: Vec<f32> = Vec::new();

        for frame_index in 0..frame_count {
            let start = frame_index * hop_length;
            let frame = &samples[start..start + frame_length];

            energy.push(compute_rms(frame));
            noisiness.push(zero_crossing_rate(frame));

            let magnitudes = self.compute_magnitudes(frame)?;
            let (centroid, roll) =
                spectral_shape(&magnitudes, sample_rate, self.config.rolloff_percent);
            brightness.push(centroid);
            rolloff.push(roll);

            flux.push(spectral_flux(&previous_magnitudes, &magnitudes));
            previous_magnitudes = magnitudes;
        }

        let onsets = self.detect_onsets(&flux, hop_seconds);
        tracing::debug!(
            frames = frame_count,
            onsets = onsets.len(),
            "feature extraction complete"
        );

        Ok(AudioFeatures {
            energy: FeatureSeries::new(hop_seconds, energy).normalized(),
            brightness: FeatureSeries::new(hop_seconds, brightness).normalized(),
            rolloff: FeatureSeries::new(hop_seconds, rolloff).normalized(),
            noisiness: FeatureSeries::new(hop_seconds, noisiness).normalized(),
            onsets,
            duration_seconds: signal.duration_seconds(),
        })
    }

    /// Picks transient starts from the spectral flux envelope: local maxima
    /// above a percentile threshold, separated by a minimum gap, each walked
    /// back to the preceding local minimum.
    fn detect_onsets(&self, flux: &[f32], hop_seconds: f32) -> Vec<f32> {
        let envelope = FeatureSeries::new(hop_seconds, flux.to_vec()).normalized();
        let threshold = envelope.percentile(self.config.onset_percentile);
        let min_gap = (self.config.onset_min_gap_seconds / hop_seconds).round() as usize;
        let peaks = find_peaks(envelope.values(), threshold, min_gap.max(1));

        let mut times: Vec<f32> = peaks
            .into_iter()
            .map(|peak| {
                let mut index = peak;
                if self.config.onset_backtrack {
                    while index > 0 && envelope.values()[index - 1] <= envelope.values()[index] {
                        index -= 1;
                    }
                }
                envelope.time_at(index)
            })
            .collect();
        times.dedup();
        times
    }

    fn compute_magnitudes(&mut self, frame: &[f32]) -> Result<Vec<f32>> {
        let fft = self.prepare_fft(frame.len())?;

        for (index, value) in frame.iter().enumerate() {
            fft.input[index] = *value * hann_value(index, frame.len());
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        Ok(fft.spectrum.iter().map(|bin| bin.norm()).collect())
    }

    fn prepare_fft(&mut self, size: usize) -> Result<&mut FftResources> {
        let rebuild = self
            .fft
            .as_ref()
            .map(|fft| fft.size != size)
            .unwrap_or(true);

        if rebuild {
            let plan = self.planner.plan_fft_forward(size);
            let scratch = plan.make_scratch_vec();
            let spectrum = plan.make_output_vec();
            let input = plan.make_input_vec();
            self.fft = Some(FftResources {
                size,
                plan,
                scratch,
                spectrum,
                input,
            });
        }

        Ok(self.fft.as_mut().expect("fft resources must exist"))
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for FeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureExtractor")
            .field("config", &self.config)
            .finish()
    }
}

/// Fuses the normalized features into one vocal-activity score per frame.
/// Pure function of its inputs.
pub fn vocal_activity(features: &AudioFeatures, weights: &ActivityWeights) -> FeatureSeries {
    let values = features
        .energy
        .values()
        .iter()
        .zip(features.noisiness.values())
        .zip(features.brightness.values())
        .map(|((energy, noisiness), brightness)| {
            weights.energy * energy
                + weights.noisiness * noisiness
                + weights.brightness * (1.0 - brightness)
        })
        .collect();
    FeatureSeries::new(features.energy.hop_seconds(), values)
}

fn compute_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|sample| sample * sample).sum();
    (sum / samples.len() as f32).sqrt()
}

fn zero_crossing_rate(samples: &[f32]) -> f32 {
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f32 / samples.len() as f32
}

/// Magnitude-weighted mean frequency and the frequency below which
/// `rolloff_percent` of the spectral energy sits.
fn spectral_shape(magnitudes: &[f32], sample_rate: f32, rolloff_percent: f32) -> (f32, f32) {
    let bin_hz = sample_rate / (2.0 * (magnitudes.len() - 1).max(1) as f32);

    let mut magnitude_sum = 0.0;
    let mut weighted_sum = 0.0;
    for (i, magnitude) in magnitudes.iter().enumerate() {
        magnitude_sum += magnitude;
        weighted_sum += magnitude * (i as f32 * bin_hz);
    }

    if magnitude_sum <= f32::EPSILON {
        return (0.0, 0.0);
    }

    let centroid = weighted_sum / magnitude_sum;

    let target = magnitude_sum * rolloff_percent;
    let mut running = 0.0;
    let mut rolloff = 0.0;
    for (i, magnitude) in magnitudes.iter().enumerate() {
        running += magnitude;
        if running >= target {
            rolloff = i as f32 * bin_hz;
            break;
        }
    }

    (centroid, rolloff)
}

/// Sum of positive magnitude increases since the previous frame.
fn spectral_flux(previous: &[f32], current: &[f32]) -> f32 {
    if previous.len() != current.len() {
        return 0.0;
    }
    current
        .iter()
        .zip(previous)
        .map(|(now, before)| (now - before).max(0.0))
        .sum()
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
