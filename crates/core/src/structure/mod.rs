use serde::{Deserialize, Serialize};

use crate::{
    analysis::FeatureSeries,
    config::{AllocatorConfig, DetectorConfig},
    cues::{energy_valleys, find_peaks},
    timeline::TimelineEntry,
    LyricLine, LyricSyncError, Result,
};

/// Structural segment categories of a song.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Intro,
    Verse,
    Chorus,
    Interlude,
    Outro,
}

impl SectionKind {
    /// Per-kind duration multiplier used when a section does not override
    /// it. Choruses run slightly long, interludes longer, outros longest;
    /// empirical constants carried over from the original tool.
    pub fn default_multiplier(self) -> f32 {
        match self {
            SectionKind::Chorus => 1.1,
            SectionKind::Interlude => 1.2,
            SectionKind::Outro => 1.5,
            SectionKind::Intro | SectionKind::Verse => 1.0,
        }
    }

    /// Per-kind cap on seconds per line. Only the intro is capped by
    /// default; it stays short regardless of how the scale factor lands.
    pub fn default_line_cap(self) -> Option<f32> {
        match self {
            SectionKind::Intro => Some(3.0),
            _ => None,
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            SectionKind::Intro => "INTRO",
            SectionKind::Verse => "VERSE",
            SectionKind::Chorus => "CHORUS",
            SectionKind::Interlude => "INTERLUDE",
            SectionKind::Outro => "OUTRO",
        }
    }
}

/// Identity of one concrete section: kind plus 1-based ordinal for repeated
/// kinds (0 means unnumbered). Attached to timeline entries as the section
/// label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTag {
    pub kind: SectionKind,
    pub number: u32,
}

impl SectionTag {
    /// Uppercase heading title, e.g. `VERSE 1` or `INTRO`.
    pub fn title(&self) -> String {
        if self.number > 0 {
            format!("{} {}", self.kind.display_name(), self.number)
        } else {
            self.kind.display_name().to_string()
        }
    }
}

/// Declarative description of one section: how many lyric lines it spans and
/// its nominal share of the song. Multiplier and line cap fall back to the
/// kind defaults when absent, so a structure file only states what deviates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    pub kind: SectionKind,
    #[serde(default)]
    pub number: u32,
    pub lines: usize,
    pub base_seconds: f32,
    #[serde(default)]
    pub multiplier: Option<f32>,
    #[serde(default)]
    pub max_line_seconds: Option<f32>,
}

impl SectionSpec {
    pub fn new(kind: SectionKind, number: u32, lines: usize, base_seconds: f32) -> Self {
        Self {
            kind,
            number,
            lines,
            base_seconds,
            multiplier: None,
            max_line_seconds: None,
        }
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier.unwrap_or(self.kind.default_multiplier())
    }

    pub fn line_cap(&self) -> Option<f32> {
        self.max_line_seconds.or(self.kind.default_line_cap())
    }

    pub fn tag(&self) -> SectionTag {
        SectionTag {
            kind: self.kind,
            number: self.number,
        }
    }
}

/// Ordered list of section specs covering the whole lyric list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongStructure {
    pub sections: Vec<SectionSpec>,
}

impl SongStructure {
    /// Loads a structure from its JSON representation.
    pub fn from_json<R: std::io::Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Single unnumbered verse spanning every line; used when no structure
    /// file is supplied.
    pub fn uniform(lines: usize) -> Self {
        Self {
            sections: vec![SectionSpec::new(SectionKind::Verse, 0, lines, 1.0)],
        }
    }

    pub fn total_lines(&self) -> usize {
        self.sections.iter().map(|s| s.lines).sum()
    }
}

/// Computes a proportional time budget per line from the song structure when
/// acoustic cues are unavailable or insufficient.
#[derive(Debug, Clone)]
pub struct StructuralAllocator {
    config: AllocatorConfig,
}

impl StructuralAllocator {
    pub fn new(config: AllocatorConfig) -> Self {
        Self { config }
    }

    /// Per-section seconds per line before cap and multiplier adjustments.
    /// These raw budgets conserve the available duration exactly.
    fn section_budgets(&self, structure: &SongStructure, duration: f32) -> Vec<f32> {
        let available = duration * self.config.duration_margin;
        let total_base: f32 = structure.sections.iter().map(|s| s.base_seconds).sum();
        let scale = available / total_base;
        structure
            .sections
            .iter()
            .map(|section| section.base_seconds * scale / section.lines as f32)
            .collect()
    }

    /// Emits one entry per lyric line, each consuming its section's adjusted
    /// time budget, with the current-time cursor advancing monotonically.
    /// Lines beyond the structure's declared count inherit the last
    /// section's budget and label; leftover time after the final section is
    /// merged into the last entry so coverage equals the full duration.
    pub fn allocate(
        &self,
        lines: &[LyricLine],
        structure: &SongStructure,
        duration: f32,
    ) -> Result<Vec<TimelineEntry>> {
        if lines.is_empty() {
            return Err(LyricSyncError::InvalidInput(
                "allocation requires at least one lyric line",
            ));
        }
        if structure.sections.is_empty() {
            return Err(LyricSyncError::InvalidInput(
                "allocation requires at least one section",
            ));
        }
        if structure
            .sections
            .iter()
            .any(|s| s.lines == 0 || s.base_seconds <= 0.0)
        {
            return Err(LyricSyncError::InvalidInput(
                "sections require a positive line count and base duration",
            ));
        }

        let budgets = self.section_budgets(structure, duration);
        let mut entries = Vec::with_capacity(lines.len());
        let mut cursor = 0.0_f32;
        let mut line_index = 0;

        for (section, budget) in structure.sections.iter().zip(&budgets) {
            let per_line = adjusted_per_line(section, *budget);
            for _ in 0..section.lines {
                if line_index >= lines.len() {
                    break;
                }
                entries.push(TimelineEntry {
                    index: line_index,
                    text: lines[line_index].text.clone(),
                    start: cursor,
                    end: cursor + per_line,
                    section: Some(section.tag()),
                });
                cursor += per_line;
                line_index += 1;
            }
        }

        // Trailing lines the structure does not account for default to the
        // last section's type and budget.
        if line_index < lines.len() {
            let last = structure
                .sections
                .last()
                .expect("structure has at least one section");
            let per_line = adjusted_per_line(last, *budgets.last().expect("budgets match sections"));
            while line_index < lines.len() {
                entries.push(TimelineEntry {
                    index: line_index,
                    text: lines[line_index].text.clone(),
                    start: cursor,
                    end: cursor + per_line,
                    section: Some(last.tag()),
                });
                cursor += per_line;
                line_index += 1;
            }
        }

        if cursor < duration {
            if let Some(last) = entries.last_mut() {
                last.end = duration;
            }
        }

        Ok(entries)
    }
}

fn adjusted_per_line(section: &SectionSpec, budget: f32) -> f32 {
    let mut per_line = budget * section.multiplier();
    if let Some(cap) = section.line_cap() {
        per_line = per_line.min(cap);
    }
    per_line
}

/// Acoustic hints for where sections likely sit: high-energy peaks suggest
/// choruses, low-energy valleys suggest verse or interlude boundaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionHints {
    pub peaks: Vec<f32>,
    pub valleys: Vec<f32>,
}

impl SectionHints {
    pub fn estimate(energy: &FeatureSeries, config: &DetectorConfig) -> Self {
        let min_gap = (energy.len() / 10).max(1);
        let peaks = find_peaks(energy.values(), config.hint_peak_floor, min_gap)
            .into_iter()
            .map(|index| energy.time_at(index))
            .collect();
        Self {
            peaks,
            valleys: energy_valleys(energy, config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lyric_lines(count: usize) -> Vec<LyricLine> {
        (0..count)
            .map(|index| LyricLine {
                index,
                text: format!("line {index}"),
            })
            .collect()
    }

    fn demo_structure() -> SongStructure {
        SongStructure {
            sections: vec![
                SectionSpec::new(SectionKind::Intro, 0, 1, 3.0),
                SectionSpec::new(SectionKind::Verse, 1, 4, 20.0),
                SectionSpec::new(SectionKind::Chorus, 1, 2, 8.0),
                SectionSpec::new(SectionKind::Outro, 0, 1, 5.0),
            ],
        }
    }

    #[test]
    fn raw_budgets_conserve_available_duration() {
        let structure = demo_structure();
        let allocator = StructuralAllocator::new(AllocatorConfig::default());
        let duration = 200.0;

        let budgets = allocator.section_budgets(&structure, duration);
        let covered: f32 = budgets
            .iter()
            .zip(&structure.sections)
            .map(|(per_line, section)| per_line * section.lines as f32)
            .sum();

        let available = duration * 0.95;
        assert!((covered - available).abs() / available < 1e-6);
    }

    #[test]
    fn emits_one_entry_per_line_with_monotonic_cursor() {
        let lines = lyric_lines(8);
        let structure = demo_structure();
        let allocator = StructuralAllocator::new(AllocatorConfig::default());

        let entries = allocator.allocate(&lines, &structure, 200.0).unwrap();

        assert_eq!(entries.len(), 8);
        for pair in entries.windows(2) {
            assert!(pair[0].start < pair[0].end);
            assert!((pair[0].end - pair[1].start).abs() < 1e-6 || pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn intro_lines_are_capped() {
        let lines = lyric_lines(8);
        let structure = demo_structure();
        let allocator = StructuralAllocator::new(AllocatorConfig::default());

        // A long song would hand the single intro line a huge share.
        let entries = allocator.allocate(&lines, &structure, 600.0).unwrap();
        assert!(entries[0].end - entries[0].start <= 3.0 + 1e-6);
    }

    #[test]
    fn leftover_time_extends_the_final_entry() {
        let lines = lyric_lines(8);
        let structure = demo_structure();
        let allocator = StructuralAllocator::new(AllocatorConfig::default());

        let entries = allocator.allocate(&lines, &structure, 200.0).unwrap();
        assert!((entries.last().unwrap().end - 200.0).abs() < 1e-6);
    }

    #[test]
    fn surplus_lines_inherit_the_last_section() {
        let lines = lyric_lines(10);
        let structure = demo_structure(); // declares 8 lines
        let allocator = StructuralAllocator::new(AllocatorConfig::default());

        let entries = allocator.allocate(&lines, &structure, 200.0).unwrap();
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[9].section.unwrap().kind, SectionKind::Outro);
    }

    #[test]
    fn structure_round_trips_through_json() {
        let structure = demo_structure();
        let json = serde_json::to_string(&structure).unwrap();
        let reloaded = SongStructure::from_json(json.as_bytes()).unwrap();

        assert_eq!(reloaded.total_lines(), structure.total_lines());
        assert_eq!(reloaded.sections[2].kind, SectionKind::Chorus);
        assert!((reloaded.sections[2].multiplier() - 1.1).abs() < 1e-6);
    }

    #[test]
    fn section_titles_number_repeated_kinds() {
        let tag = SectionTag {
            kind: SectionKind::Verse,
            number: 2,
        };
        assert_eq!(tag.title(), "VERSE 2");
        let intro = SectionTag {
            kind: SectionKind::Intro,
            number: 0,
        };
        assert_eq!(intro.title(), "INTRO");
    }
}
