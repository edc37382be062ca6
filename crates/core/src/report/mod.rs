use std::fmt::Write as _;

use crate::{timeline::TimelineEntry, LyricSyncError, Result};

/// Formats seconds as `MM:SS.mmm`. Minutes grow past two digits when the
/// recording demands it; milliseconds are zero-padded to three.
pub fn format_time(seconds: f32) -> String {
    let total_ms = (seconds.max(0.0) as f64 * 1000.0).round() as u64;
    let minutes = total_ms / 60_000;
    let secs = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;
    format!("{minutes:02}:{secs:02}.{millis:03}")
}

/// Parses a `MM:SS.mmm` timecode back into seconds. The milliseconds part
/// may be shorter than three digits and is read as a decimal fraction
/// (`15.5` means 500 ms).
pub fn parse_time(text: &str) -> Result<f32> {
    let (minutes, rest) = text
        .split_once(':')
        .ok_or(LyricSyncError::InvalidInput("timecode must contain ':'"))?;
    let minutes: u32 = minutes
        .trim()
        .parse()
        .map_err(|_| LyricSyncError::InvalidInput("timecode minutes must be a number"))?;

    let (secs, millis) = match rest.split_once('.') {
        Some((secs, millis)) => (secs, millis),
        None => (rest, "0"),
    };
    let secs: u32 = secs
        .trim()
        .parse()
        .map_err(|_| LyricSyncError::InvalidInput("timecode seconds must be a number"))?;
    if secs >= 60 {
        return Err(LyricSyncError::InvalidInput(
            "timecode seconds must stay below 60",
        ));
    }
    if millis.is_empty() || millis.len() > 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LyricSyncError::InvalidInput(
            "timecode milliseconds must be 1-3 digits",
        ));
    }
    let mut padded = millis.to_string();
    while padded.len() < 3 {
        padded.push('0');
    }
    let millis: u32 = padded
        .parse()
        .expect("digits were validated above");

    Ok(minutes as f32 * 60.0 + secs as f32 + millis as f32 / 1000.0)
}

/// One entry recovered from a timeline document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEntry {
    pub index: usize,
    pub start: f32,
    pub end: f32,
    pub text: String,
    pub section: Option<String>,
}

/// Renders the timeline document: a heading block per section followed by a
/// numbered entry block per line. The whole document is built in memory so
/// callers can write it in a single operation and never leave a truncated
/// file behind.
pub fn render_timeline(title: &str, duration: f32, entries: &[TimelineEntry]) -> String {
    let mut doc = String::new();
    let _ = writeln!(doc, "# {title}");
    let _ = writeln!(doc);
    let _ = writeln!(doc, "**Total duration:** {}", format_time(duration));
    let _ = writeln!(doc);
    let _ = writeln!(doc, "---");

    let mut current_section: Option<String> = None;
    for (number, entry) in entries.iter().enumerate() {
        let section_title = entry.section.map(|tag| tag.title());
        if section_title != current_section {
            if let Some(name) = &section_title {
                let _ = writeln!(doc);
                let _ = writeln!(doc, "### {name}");
            }
            current_section = section_title;
        }

        let _ = writeln!(doc);
        let _ = writeln!(
            doc,
            "## {}. {} - {} ({})",
            number + 1,
            format_time(entry.start),
            format_time(entry.end),
            format_time(entry.duration()),
        );
        let _ = writeln!(doc, "**Text:** {}", entry.text);
    }

    doc
}

/// Recovers `(start, end, text, enclosing-section-name)` for every entry in
/// a timeline document. The section of an entry is the nearest preceding
/// heading.
pub fn parse_timeline(document: &str) -> Result<Vec<ParsedEntry>> {
    let mut entries = Vec::new();
    let mut current_section: Option<String> = None;
    let mut pending: Option<(usize, f32, f32)> = None;

    for line in document.lines() {
        let trimmed = line.trim();
        if let Some(heading) = trimmed.strip_prefix("### ") {
            current_section = Some(heading.trim().to_string());
        } else if let Some(header) = trimmed.strip_prefix("## ") {
            pending = Some(parse_entry_header(header)?);
        } else if let Some(text) = trimmed.strip_prefix("**Text:**") {
            let (index, start, end) = pending.take().ok_or(LyricSyncError::InvalidInput(
                "text block without a preceding entry header",
            ))?;
            entries.push(ParsedEntry {
                index,
                start,
                end,
                text: text.trim().to_string(),
                section: current_section.clone(),
            });
        }
    }

    if pending.is_some() {
        return Err(LyricSyncError::InvalidInput(
            "entry header without a text block",
        ));
    }

    Ok(entries)
}

/// Parses `N. MM:SS.mmm - MM:SS.mmm (MM:SS.mmm)`.
fn parse_entry_header(header: &str) -> Result<(usize, f32, f32)> {
    let (number, rest) = header
        .split_once(". ")
        .ok_or(LyricSyncError::InvalidInput("entry header missing index"))?;
    let index: usize = number
        .trim()
        .parse()
        .map_err(|_| LyricSyncError::InvalidInput("entry index must be a number"))?;
    if index == 0 {
        return Err(LyricSyncError::InvalidInput("entry indices are 1-based"));
    }

    let times = match rest.split_once(" (") {
        Some((times, _)) => times,
        None => rest,
    };
    let (start, end) = times
        .split_once(" - ")
        .ok_or(LyricSyncError::InvalidInput("entry header missing times"))?;

    Ok((index - 1, parse_time(start.trim())?, parse_time(end.trim())?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{SectionKind, SectionTag};

    fn entry(index: usize, start: f32, end: f32, kind: SectionKind, number: u32) -> TimelineEntry {
        TimelineEntry {
            index,
            text: format!("line {index}"),
            start,
            end,
            section: Some(SectionTag { kind, number }),
        }
    }

    #[test]
    fn formats_zero_padded_timecodes() {
        assert_eq!(format_time(0.0), "00:00.000");
        assert_eq!(format_time(75.5), "01:15.500");
        assert_eq!(format_time(3725.25), "62:05.250");
    }

    #[test]
    fn parses_its_own_output() {
        for seconds in [0.0_f32, 1.2, 59.999, 75.5, 155.889, 3725.25] {
            let formatted = format_time(seconds);
            let parsed = parse_time(&formatted).unwrap();
            assert_eq!(format_time(parsed), formatted);
        }
    }

    #[test]
    fn pads_short_millisecond_fields() {
        assert!((parse_time("00:15.5").unwrap() - 15.5).abs() < 1e-4);
        assert!((parse_time("00:15").unwrap() - 15.0).abs() < 1e-4);
    }

    #[test]
    fn rejects_malformed_timecodes() {
        assert!(parse_time("abc").is_err());
        assert!(parse_time("00:75.000").is_err());
        assert!(parse_time("00:10.12345").is_err());
    }

    #[test]
    fn document_round_trips_to_millisecond_precision() {
        let entries = vec![
            entry(0, 0.0, 2.5, SectionKind::Intro, 0),
            entry(1, 2.5, 21.371, SectionKind::Verse, 1),
            entry(2, 21.371, 45.002, SectionKind::Verse, 1),
            entry(3, 45.002, 60.0, SectionKind::Chorus, 1),
        ];
        let document = render_timeline("Demo Timeline", 60.0, &entries);

        let parsed = parse_timeline(&document).unwrap();
        assert_eq!(parsed.len(), entries.len());
        for (original, recovered) in entries.iter().zip(&parsed) {
            assert_eq!(recovered.index, original.index);
            assert_eq!(format_time(recovered.start), format_time(original.start));
            assert_eq!(format_time(recovered.end), format_time(original.end));
            assert_eq!(recovered.text, original.text);
            assert_eq!(
                recovered.section.as_deref(),
                Some(original.section.unwrap().title().as_str())
            );
        }
    }

    #[test]
    fn section_headings_cover_following_entries() {
        let entries = vec![
            entry(0, 0.0, 1.0, SectionKind::Verse, 1),
            entry(1, 1.0, 2.0, SectionKind::Verse, 1),
            entry(2, 2.0, 3.0, SectionKind::Outro, 0),
        ];
        let document = render_timeline("Demo", 3.0, &entries);
        let parsed = parse_timeline(&document).unwrap();

        assert_eq!(parsed[0].section.as_deref(), Some("VERSE 1"));
        assert_eq!(parsed[1].section.as_deref(), Some("VERSE 1"));
        assert_eq!(parsed[2].section.as_deref(), Some("OUTRO"));
    }
}
