use serde::{Deserialize, Serialize};

use crate::{analysis::FeatureSeries, config::DetectorConfig};

/// Candidate timestamp at which a lyric line is believed to start.
/// Construction clamps into non-negative time.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct CuePoint {
    seconds: f32,
}

impl CuePoint {
    pub fn new(seconds: f32) -> Self {
        Self {
            seconds: seconds.max(0.0),
        }
    }

    pub fn seconds(&self) -> f32 {
        self.seconds
    }
}

/// Scans for strict local maxima at or above `min_height`, keeping a peak
/// only when at least `min_gap` frames separate it from the previously
/// accepted one. A constant series has no local maxima and yields nothing.
pub fn find_peaks(values: &[f32], min_height: f32, min_gap: usize) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut last_accepted: Option<usize> = None;

    for i in 1..values.len().saturating_sub(1) {
        if values[i] <= values[i - 1] || values[i] <= values[i + 1] {
            continue;
        }
        if values[i] < min_height {
            continue;
        }
        if let Some(last) = last_accepted {
            if i - last < min_gap {
                continue;
            }
        }
        peaks.push(i);
        last_accepted = Some(i);
    }

    peaks
}

/// Pools cue candidates from the two independent sources: peaks of the
/// vocal-activity series and activity-filtered onset events. The union is
/// deduplicated and sorted ascending.
pub fn detect_cues(
    activity: &FeatureSeries,
    onsets: &[f32],
    config: &DetectorConfig,
) -> Vec<CuePoint> {
    let mut pooled: Vec<f32> = Vec::new();

    let peak_threshold = activity.percentile(config.peak_percentile);
    let gap_frames = if activity.hop_seconds() > 0.0 {
        (config.min_peak_gap_seconds / activity.hop_seconds()).round() as usize
    } else {
        1
    };
    let peaks = find_peaks(activity.values(), peak_threshold, gap_frames.max(1));
    pooled.extend(peaks.iter().map(|index| activity.time_at(*index)));

    let onset_threshold = activity.percentile(config.onset_activity_percentile);
    for onset in onsets {
        if let Some(index) = activity.nearest_index(*onset) {
            if activity.values()[index] > onset_threshold {
                pooled.push(*onset);
            }
        }
    }

    pooled.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    pooled.dedup();

    tracing::debug!(
        peaks = peaks.len(),
        pooled = pooled.len(),
        "cue point detection complete"
    );

    pooled.into_iter().map(CuePoint::new).collect()
}

/// Valley variant of the peak scan: likely low-energy regions (verse or
/// interlude boundaries) found by negating the energy series and accepting
/// only dips below an absolute ceiling. Feeds structural estimation, not the
/// cue pool.
pub fn energy_valleys(energy: &FeatureSeries, config: &DetectorConfig) -> Vec<f32> {
    let negated: Vec<f32> = energy.values().iter().map(|v| -v).collect();
    let min_gap = (energy.len() / 10).max(1);
    find_peaks(&negated, -config.valley_ceiling, min_gap)
        .into_iter()
        .map(|index| energy.time_at(index))
        .collect()
}
