use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::Result;

/// One line of lyrics. Order is assigned at parse time and is significant
/// everywhere downstream; the timeline carries exactly one entry per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricLine {
    pub index: usize,
    pub text: String,
}

/// Reads lyric lines from a text source. Blank lines are dropped, as are
/// comment lines whose trimmed content starts with `//`.
pub fn parse_lyrics<R: BufRead>(reader: R) -> Result<Vec<LyricLine>> {
    let mut lines = Vec::new();
    for raw in reader.lines() {
        let raw = raw?;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        lines.push(LyricLine {
            index: lines.len(),
            text: trimmed.to_string(),
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn skips_blanks_and_comments() {
        let source = "First line\n\n// production note\n  Second line  \n";
        let lines = parse_lyrics(Cursor::new(source)).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "First line");
        assert_eq!(lines[1].text, "Second line");
        assert_eq!(lines[1].index, 1);
    }

    #[test]
    fn preserves_source_order() {
        let source = "a\nb\nc\n";
        let lines = parse_lyrics(Cursor::new(source)).unwrap();
        let indices: Vec<usize> = lines.iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }
}
