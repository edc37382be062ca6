use serde::{Deserialize, Serialize};

use crate::{
    config::BuilderConfig,
    cues::CuePoint,
    structure::{SectionTag, SongStructure},
    sync::SyncSession,
    LyricLine, LyricSyncError, Result,
};

/// Final alignment of one lyric line: start/end in seconds plus the section
/// label attached afterwards. Entries always come out one per line, in line
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub index: usize,
    pub text: String,
    pub start: f32,
    pub end: f32,
    pub section: Option<SectionTag>,
}

impl TimelineEntry {
    pub fn duration(&self) -> f32 {
        self.end - self.start
    }
}

/// Merges cue points, the uniform fallback and human-supplied timestamps
/// into one per-line timeline. The builder never reorders lines; it only
/// assigns start/end times.
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    config: BuilderConfig,
}

impl TimelineBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Selects the allocation path for this run, in priority order: manual
    /// timestamps when the session covers every line, pure acoustic when
    /// enough cue points exist, hybrid otherwise.
    pub fn build(
        &self,
        lines: &[LyricLine],
        duration: f32,
        cues: &[CuePoint],
        manual: Option<&SyncSession>,
    ) -> Result<Vec<TimelineEntry>> {
        if lines.is_empty() {
            return Err(LyricSyncError::InvalidInput(
                "timeline requires at least one lyric line",
            ));
        }

        if let Some(session) = manual {
            if session.timestamps.len() == lines.len() {
                tracing::info!("using manual synchronization timestamps");
                return self.from_manual(lines, session, duration);
            }
        }

        if cues.len() >= lines.len() {
            tracing::info!(cues = cues.len(), "using acoustic cue points");
            return Ok(self.from_cues(lines, cues, duration));
        }

        tracing::warn!(
            cues = cues.len(),
            lines = lines.len(),
            "insufficient cue points, falling back to the hybrid path"
        );
        Ok(self.hybrid(lines, cues, duration))
    }

    /// Manual path: each line starts at its recorded timestamp and ends at
    /// the next one, the last line running to the end of the song. No
    /// inference.
    pub fn from_manual(
        &self,
        lines: &[LyricLine],
        session: &SyncSession,
        duration: f32,
    ) -> Result<Vec<TimelineEntry>> {
        let timestamps = &session.timestamps;
        if timestamps.len() != lines.len() {
            return Err(LyricSyncError::InvalidInput(
                "manual path requires one timestamp per lyric line",
            ));
        }
        let ordered = timestamps
            .windows(2)
            .all(|pair| pair[0] < pair[1]);
        if !ordered || timestamps.iter().any(|t| *t < 0.0 || *t >= duration) {
            return Err(LyricSyncError::InvalidInput(
                "manual timestamps must increase strictly within the song duration",
            ));
        }

        Ok(lines
            .iter()
            .enumerate()
            .map(|(i, line)| TimelineEntry {
                index: line.index,
                text: line.text.clone(),
                start: timestamps[i],
                end: timestamps.get(i + 1).copied().unwrap_or(duration),
                section: None,
            })
            .collect())
    }

    /// Acoustic path: the first N pooled cue points become the line starts.
    fn from_cues(&self, lines: &[LyricLine], cues: &[CuePoint], duration: f32) -> Vec<TimelineEntry> {
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| TimelineEntry {
                index: line.index,
                text: line.text.clone(),
                start: cues[i].seconds(),
                end: if i + 1 < lines.len() {
                    cues[i + 1].seconds()
                } else {
                    duration
                },
                section: None,
            })
            .collect()
    }

    /// Hybrid path: cue points where available, uniformly spaced estimates
    /// elsewhere. Ends follow the next value of whichever series still has
    /// one, and a line with nothing after it gets the configured tail.
    fn hybrid(&self, lines: &[LyricLine], cues: &[CuePoint], duration: f32) -> Vec<TimelineEntry> {
        let uniform = linspace(0.0, duration * self.config.duration_margin, lines.len());

        lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                let start = cues
                    .get(i)
                    .map(CuePoint::seconds)
                    .unwrap_or(uniform[i]);
                let end = if i + 1 < cues.len() {
                    cues[i + 1].seconds()
                } else if i + 1 < uniform.len() {
                    uniform[i + 1]
                } else {
                    start + self.config.tail_seconds
                };
                TimelineEntry {
                    index: line.index,
                    text: line.text.clone(),
                    start,
                    end,
                    section: None,
                }
            })
            .collect()
    }

    /// Tags consecutive runs of entries with each section's identity,
    /// independent of which path produced the timestamps. Entries beyond the
    /// structure's declared line count take the last section's tag.
    pub fn label_sections(entries: &mut [TimelineEntry], structure: &SongStructure) {
        let mut cursor = 0;
        for section in &structure.sections {
            for _ in 0..section.lines {
                if cursor >= entries.len() {
                    return;
                }
                entries[cursor].section = Some(section.tag());
                cursor += 1;
            }
        }
        if let Some(last) = structure.sections.last() {
            while cursor < entries.len() {
                entries[cursor].section = Some(last.tag());
                cursor += 1;
            }
        }
    }
}

/// `count` evenly spaced values from `start` to `stop` inclusive.
fn linspace(start: f32, stop: f32, count: usize) -> Vec<f32> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f32;
            (0..count).map(|i| start + step * i as f32).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{SectionKind, SectionSpec};

    fn lyric_lines(count: usize) -> Vec<LyricLine> {
        (0..count)
            .map(|index| LyricLine {
                index,
                text: format!("line {index}"),
            })
            .collect()
    }

    fn cues(times: &[f32]) -> Vec<CuePoint> {
        times.iter().map(|t| CuePoint::new(*t)).collect()
    }

    fn builder() -> TimelineBuilder {
        TimelineBuilder::new(BuilderConfig::default())
    }

    #[test]
    fn manual_path_is_deterministic() {
        let lines = lyric_lines(8);
        let session = SyncSession {
            timestamps: vec![1.2, 9.5, 18.0, 30.1, 45.0, 60.2, 75.5, 90.0],
        };

        let entries = builder()
            .build(&lines, 120.0, &[], Some(&session))
            .unwrap();

        assert_eq!(entries.len(), 8);
        assert!((entries[7].start - 90.0).abs() < 1e-6);
        assert!((entries[7].end - 120.0).abs() < 1e-6);
        for pair in entries.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn incomplete_session_does_not_qualify_for_manual_path() {
        let lines = lyric_lines(4);
        let session = SyncSession {
            timestamps: vec![1.0, 2.0],
        };

        let entries = builder()
            .build(&lines, 100.0, &[], Some(&session))
            .unwrap();

        // Hybrid fallback: uniform starts, not the partial timestamps.
        assert!((entries[0].start - 0.0).abs() < 1e-6);
    }

    #[test]
    fn acoustic_path_activates_with_enough_cues() {
        let lines = lyric_lines(3);
        let pool = cues(&[2.0, 10.0, 20.0, 30.0]);

        let entries = builder().build(&lines, 60.0, &pool, None).unwrap();

        assert!((entries[0].start - 2.0).abs() < 1e-6);
        assert!((entries[1].start - 10.0).abs() < 1e-6);
        assert!((entries[2].start - 20.0).abs() < 1e-6);
        assert!((entries[2].end - 60.0).abs() < 1e-6);
        for pair in entries.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn hybrid_activates_iff_cues_are_insufficient() {
        let lines = lyric_lines(3);

        let enough = builder().build(&lines, 60.0, &cues(&[1.0, 2.0, 3.0]), None).unwrap();
        assert!((enough[0].start - 1.0).abs() < 1e-6);

        let short = builder().build(&lines, 60.0, &cues(&[1.0, 2.0]), None).unwrap();
        assert!((short[0].start - 1.0).abs() < 1e-6);
        assert!((short[1].start - 2.0).abs() < 1e-6);
        // Third line has no cue; it takes the uniform estimate.
        assert!((short[2].start - 57.0).abs() < 1e-4);
    }

    #[test]
    fn uniform_fallback_matches_even_distribution() {
        let lines = lyric_lines(8);
        let entries = builder().build(&lines, 180.0, &[], None).unwrap();

        assert_eq!(entries.len(), 8);
        let step = 171.0 / 7.0;
        for (i, entry) in entries.iter().enumerate() {
            assert!((entry.start - step * i as f32).abs() < 1e-3);
        }
        for pair in entries.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        // The last line has no subsequent value in either series; the tail
        // rule applies.
        let last = entries.last().unwrap();
        assert!((last.end - (last.start + 4.5)).abs() < 1e-4);
    }

    #[test]
    fn manual_timestamps_must_increase_within_duration() {
        let lines = lyric_lines(2);
        let backwards = SyncSession {
            timestamps: vec![5.0, 2.0],
        };
        assert!(builder().from_manual(&lines, &backwards, 60.0).is_err());

        let beyond = SyncSession {
            timestamps: vec![5.0, 80.0],
        };
        assert!(builder().from_manual(&lines, &beyond, 60.0).is_err());
    }

    #[test]
    fn labels_follow_structure_with_trailing_default() {
        let lines = lyric_lines(5);
        let mut entries = builder().build(&lines, 100.0, &[], None).unwrap();

        let structure = SongStructure {
            sections: vec![
                SectionSpec::new(SectionKind::Verse, 1, 2, 10.0),
                SectionSpec::new(SectionKind::Chorus, 1, 2, 10.0),
            ],
        };
        TimelineBuilder::label_sections(&mut entries, &structure);

        assert_eq!(entries[0].section.unwrap().kind, SectionKind::Verse);
        assert_eq!(entries[2].section.unwrap().kind, SectionKind::Chorus);
        // Fifth line exceeds the declared count and defaults to the last
        // section's type.
        assert_eq!(entries[4].section.unwrap().kind, SectionKind::Chorus);
    }
}
