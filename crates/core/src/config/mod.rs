use serde::{Deserialize, Serialize};

/// Top-level configuration for one synchronization run. Every heuristic
/// constant used by the engine lives here so alternate songs can tune the
/// pipeline without code changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub analysis: AnalysisConfig,
    pub detector: DetectorConfig,
    pub allocator: AllocatorConfig,
    pub builder: BuilderConfig,
}

/// Framing and feature-extraction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Analysis window size in samples.
    pub frame_length: usize,
    /// Hop between consecutive frames in samples. Frame spacing on the time
    /// axis is `hop_length / sample_rate`.
    pub hop_length: usize,
    /// Fraction of total spectral energy below the rolloff frequency.
    pub rolloff_percent: f32,
    /// Percentile of the onset strength envelope a frame must reach to be
    /// reported as an onset event.
    pub onset_percentile: f32,
    /// Minimum spacing between reported onsets, in seconds.
    pub onset_min_gap_seconds: f32,
    /// Move each onset back to the preceding local minimum of the strength
    /// envelope, approximating the true start of the transient.
    pub onset_backtrack: bool,
    pub weights: ActivityWeights,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
            rolloff_percent: 0.85,
            onset_percentile: 70.0,
            onset_min_gap_seconds: 0.05,
            onset_backtrack: true,
            weights: ActivityWeights::default(),
        }
    }
}

/// Weights of the vocal-activity fusion. Vocals tend to carry high energy,
/// moderate-to-high noisiness and lower spectral brightness than cymbals, so
/// the brightness weight applies to the inverted series.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityWeights {
    pub energy: f32,
    pub noisiness: f32,
    /// Applied to `1 - brightness`.
    pub brightness: f32,
}

impl Default for ActivityWeights {
    fn default() -> Self {
        Self {
            energy: 0.5,
            noisiness: 0.3,
            brightness: 0.2,
        }
    }
}

/// Cue-point detection thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Percentile of the activity series a local maximum must reach to
    /// qualify as a cue point.
    pub peak_percentile: f32,
    /// Minimum spacing between accepted activity peaks, in seconds. Prevents
    /// cue clustering on sustained loud passages.
    pub min_peak_gap_seconds: f32,
    /// Percentile of the activity series an onset's nearest frame must
    /// exceed for the onset to survive filtering.
    pub onset_activity_percentile: f32,
    /// Absolute ceiling below which an energy dip counts as a valley in the
    /// structural-estimation variant.
    pub valley_ceiling: f32,
    /// Absolute floor an energy peak must clear to be reported as a likely
    /// chorus in the structural hints.
    pub hint_peak_floor: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            peak_percentile: 40.0,
            min_peak_gap_seconds: 0.5,
            onset_activity_percentile: 30.0,
            valley_ceiling: 0.3,
            hint_peak_floor: 0.5,
        }
    }
}

/// Structural allocation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Fraction of the total duration handed to lyric lines; the remainder
    /// is reserved for instrumental passages.
    pub duration_margin: f32,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            duration_margin: 0.95,
        }
    }
}

/// Timeline builder parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Fraction of the total duration spanned by the uniform fallback series
    /// on the hybrid path.
    pub duration_margin: f32,
    /// End-time extension for a line with no subsequent cue or fallback
    /// value. An empirical average line length carried over from the
    /// original tool; no further justification is implied.
    pub tail_seconds: f32,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            duration_margin: 0.95,
            tail_seconds: 4.5,
        }
    }
}
