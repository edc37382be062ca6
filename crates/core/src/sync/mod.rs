use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    audio::Player,
    report::{format_time, parse_time},
    LyricLine, Result,
};

/// Human-supplied synchronization data: one recorded timestamp per marked
/// lyric line, in line order. The only entity that survives across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSession {
    pub timestamps: Vec<f32>,
}

impl SyncSession {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, timestamp: f32) {
        self.timestamps.push(timestamp);
    }

    /// True when every lyric line has a timestamp, qualifying the session
    /// for the manual timeline path.
    pub fn covers(&self, line_count: usize) -> bool {
        self.timestamps.len() == line_count
    }
}

/// Loads and saves a [`SyncSession`] at a fixed path. Saving the same
/// session twice produces the same file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when no session file exists yet.
    pub fn load(&self) -> Result<Option<SyncSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(&self.path)?;
        Ok(Some(serde_json::from_reader(file)?))
    }

    pub fn save(&self, session: &SyncSession) -> Result<()> {
        let json = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// States of the interactive capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Saved,
    Quit,
}

/// Discrete operator events driving the capture loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// Record the current playback position for the current line.
    Mark,
    /// Restart playback and the clock reference.
    Repeat,
    /// Persist progress without ending the session.
    Save,
    /// Read-only progress display.
    ShowProgress,
    /// Abandon the session.
    Quit,
}

/// Keyboard collaborator contract: polls for the next operator event with a
/// short timeout so playback keeps running between key presses.
pub trait KeySource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<SyncEvent>>;
}

/// How a capture run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Every remaining line was visited.
    Completed,
    /// The operator quit early; the session holds partial progress that the
    /// caller must offer to persist, never silently discard.
    Interrupted,
}

/// A way of collecting timestamps for the remaining lyric lines. Selected
/// once at session start; the engine never branches on device availability
/// after that.
pub trait CaptureMode {
    fn run(
        &mut self,
        lines: &[LyricLine],
        session: &mut SyncSession,
        store: &SessionStore,
    ) -> Result<CaptureOutcome>;
}

/// Default keyboard poll timeout.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Real-time capture: audio plays while the operator marks each line as it
/// begins. Timestamps are wall-clock seconds since the last (re)start of
/// playback, monotonically non-decreasing within one listening run.
pub struct InteractiveCapture<P: Player, K: KeySource, W: Write> {
    player: P,
    keys: K,
    out: W,
    poll_timeout: Duration,
}

impl<P: Player, K: KeySource, W: Write> InteractiveCapture<P, K, W> {
    pub fn new(player: P, keys: K, out: W) -> Self {
        Self {
            player,
            keys,
            out,
            poll_timeout: POLL_TIMEOUT,
        }
    }

    fn show_line(&mut self, lines: &[LyricLine], cursor: usize) -> Result<()> {
        writeln!(
            self.out,
            "Next line ({}/{}): {}",
            cursor + 1,
            lines.len(),
            lines[cursor].text
        )?;
        Ok(())
    }
}

impl<P: Player, K: KeySource, W: Write> CaptureMode for InteractiveCapture<P, K, W> {
    fn run(
        &mut self,
        lines: &[LyricLine],
        session: &mut SyncSession,
        store: &SessionStore,
    ) -> Result<CaptureOutcome> {
        let mut cursor = session.len();
        if cursor >= lines.len() {
            return Ok(CaptureOutcome::Completed);
        }

        self.show_line(lines, cursor)?;
        self.player.play()?;
        let mut state = SessionState::Listening;

        while state != SessionState::Quit {
            if state == SessionState::Saved {
                state = SessionState::Listening;
            }

            let Some(event) = self.keys.poll(self.poll_timeout)? else {
                continue;
            };

            match event {
                SyncEvent::Mark => {
                    let timestamp = self.player.elapsed();
                    session.push(timestamp);
                    writeln!(
                        self.out,
                        "[{}] line {}: {}",
                        format_time(timestamp),
                        cursor + 1,
                        lines[cursor].text
                    )?;
                    cursor += 1;
                    if cursor >= lines.len() {
                        writeln!(self.out, "All lines marked.")?;
                        self.player.stop();
                        return Ok(CaptureOutcome::Completed);
                    }
                    self.show_line(lines, cursor)?;
                }
                SyncEvent::Repeat => {
                    self.player.stop();
                    self.player.play()?;
                    writeln!(self.out, "Restarting playback.")?;
                }
                SyncEvent::Save => {
                    store.save(session)?;
                    writeln!(self.out, "Progress saved to {}.", store.path().display())?;
                    state = SessionState::Saved;
                }
                SyncEvent::ShowProgress => {
                    writeln!(self.out, "Progress: {}/{} lines.", cursor, lines.len())?;
                    if let Some(last) = session.timestamps.last() {
                        writeln!(self.out, "Last timestamp: {}.", format_time(*last))?;
                    }
                }
                SyncEvent::Quit => {
                    state = SessionState::Quit;
                }
            }
        }

        self.player.stop();
        Ok(CaptureOutcome::Interrupted)
    }
}

/// Synchronous fallback when playback or raw keyboard input is unavailable:
/// each remaining line blocks for a typed timecode, re-prompting on invalid
/// input. `skip` leaves that line's timestamp absent.
pub struct PromptCapture<R: BufRead, W: Write> {
    input: R,
    out: W,
    duration: f32,
}

impl<R: BufRead, W: Write> PromptCapture<R, W> {
    pub fn new(input: R, out: W, duration: f32) -> Self {
        Self {
            input,
            out,
            duration,
        }
    }
}

impl<R: BufRead, W: Write> CaptureMode for PromptCapture<R, W> {
    fn run(
        &mut self,
        lines: &[LyricLine],
        session: &mut SyncSession,
        _store: &SessionStore,
    ) -> Result<CaptureOutcome> {
        let start = session.len();
        for cursor in start..lines.len() {
            writeln!(
                self.out,
                "Line {}/{}: {}",
                cursor + 1,
                lines.len(),
                lines[cursor].text
            )?;

            loop {
                write!(self.out, "Start timecode (MM:SS.mmm) or 'skip': ")?;
                self.out.flush()?;

                let mut buffer = String::new();
                if self.input.read_line(&mut buffer)? == 0 {
                    return Ok(CaptureOutcome::Interrupted);
                }
                let trimmed = buffer.trim();

                if trimmed.eq_ignore_ascii_case("skip") {
                    break;
                }

                match parse_time(trimmed) {
                    Ok(timestamp) if timestamp >= 0.0 && timestamp <= self.duration => {
                        session.push(timestamp);
                        writeln!(self.out, "Recorded {}.", format_time(timestamp))?;
                        break;
                    }
                    Ok(_) => {
                        writeln!(
                            self.out,
                            "Timecode must lie between 00:00.000 and {}.",
                            format_time(self.duration)
                        )?;
                    }
                    Err(_) => {
                        writeln!(self.out, "Invalid format, expected MM:SS.mmm.")?;
                    }
                }
            }
        }

        Ok(CaptureOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::io::Cursor;

    fn lyric_lines(count: usize) -> Vec<LyricLine> {
        (0..count)
            .map(|index| LyricLine {
                index,
                text: format!("line {index}"),
            })
            .collect()
    }

    fn store_in(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("sync_data.json"))
    }

    /// Playback fake whose clock advances by one second per query and
    /// resets on play.
    struct FakePlayer {
        clock: Cell<f32>,
        playing: bool,
    }

    impl FakePlayer {
        fn new() -> Self {
            Self {
                clock: Cell::new(0.0),
                playing: false,
            }
        }
    }

    impl Player for FakePlayer {
        fn play(&mut self) -> Result<()> {
            self.playing = true;
            self.clock.set(0.0);
            Ok(())
        }

        fn stop(&mut self) {
            self.playing = false;
        }

        fn elapsed(&self) -> f32 {
            let now = self.clock.get();
            self.clock.set(now + 1.0);
            now
        }
    }

    struct ScriptedKeys {
        events: VecDeque<SyncEvent>,
    }

    impl ScriptedKeys {
        fn new(events: &[SyncEvent]) -> Self {
            Self {
                events: events.iter().copied().collect(),
            }
        }
    }

    impl KeySource for ScriptedKeys {
        fn poll(&mut self, _timeout: Duration) -> Result<Option<SyncEvent>> {
            Ok(self.events.pop_front())
        }
    }

    #[test]
    fn store_round_trips_and_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        assert!(store.load().unwrap().is_none());

        let session = SyncSession {
            timestamps: vec![1.25, 9.5],
        };
        store.save(&session).unwrap();
        store.save(&session).unwrap();

        assert_eq!(store.load().unwrap().unwrap(), session);
    }

    #[test]
    fn marking_every_line_completes_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let lines = lyric_lines(3);
        let mut session = SyncSession::default();

        let keys = ScriptedKeys::new(&[SyncEvent::Mark, SyncEvent::Mark, SyncEvent::Mark]);
        let mut capture = InteractiveCapture::new(FakePlayer::new(), keys, Vec::new());
        let outcome = capture.run(&lines, &mut session, &store_in(&dir)).unwrap();

        assert_eq!(outcome, CaptureOutcome::Completed);
        assert!(session.covers(3));
        assert!(session
            .timestamps
            .windows(2)
            .all(|pair| pair[0] <= pair[1]));
        assert!(!capture.player.playing);
    }

    #[test]
    fn quit_interrupts_and_keeps_partial_progress() {
        let dir = tempfile::tempdir().unwrap();
        let lines = lyric_lines(3);
        let mut session = SyncSession::default();

        let keys = ScriptedKeys::new(&[SyncEvent::Mark, SyncEvent::Quit]);
        let mut capture = InteractiveCapture::new(FakePlayer::new(), keys, Vec::new());
        let outcome = capture.run(&lines, &mut session, &store_in(&dir)).unwrap();

        assert_eq!(outcome, CaptureOutcome::Interrupted);
        assert_eq!(session.len(), 1);
        assert!(!capture.player.playing);
    }

    #[test]
    fn repeat_resets_the_clock_reference() {
        let dir = tempfile::tempdir().unwrap();
        let lines = lyric_lines(2);
        let mut session = SyncSession::default();

        let keys = ScriptedKeys::new(&[
            SyncEvent::Mark,
            SyncEvent::Repeat,
            SyncEvent::Mark,
            SyncEvent::Quit,
        ]);
        let mut capture = InteractiveCapture::new(FakePlayer::new(), keys, Vec::new());
        capture.run(&lines, &mut session, &store_in(&dir)).unwrap();

        // Both marks read a freshly reset clock.
        assert_eq!(session.timestamps, vec![0.0, 0.0]);
    }

    #[test]
    fn save_event_persists_without_ending_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let lines = lyric_lines(2);
        let mut session = SyncSession::default();

        let keys = ScriptedKeys::new(&[SyncEvent::Mark, SyncEvent::Save, SyncEvent::Mark]);
        let mut capture = InteractiveCapture::new(FakePlayer::new(), keys, Vec::new());
        let outcome = capture.run(&lines, &mut session, &store).unwrap();

        assert_eq!(outcome, CaptureOutcome::Completed);
        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn resumed_session_starts_at_the_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let lines = lyric_lines(2);
        let mut session = SyncSession {
            timestamps: vec![4.0],
        };

        let keys = ScriptedKeys::new(&[SyncEvent::Mark]);
        let mut capture = InteractiveCapture::new(FakePlayer::new(), keys, Vec::new());
        let outcome = capture.run(&lines, &mut session, &store_in(&dir)).unwrap();

        assert_eq!(outcome, CaptureOutcome::Completed);
        assert_eq!(session.len(), 2);
    }

    #[test]
    fn prompt_capture_validates_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        let lines = lyric_lines(3);
        let mut session = SyncSession::default();

        let input = Cursor::new("garbage\n00:01.500\nskip\n00:10.000\n");
        let mut capture = PromptCapture::new(input, Vec::new(), 60.0);
        let outcome = capture.run(&lines, &mut session, &store_in(&dir)).unwrap();

        assert_eq!(outcome, CaptureOutcome::Completed);
        assert_eq!(session.timestamps, vec![1.5, 10.0]);
    }

    #[test]
    fn prompt_capture_rejects_out_of_range_timecodes() {
        let dir = tempfile::tempdir().unwrap();
        let lines = lyric_lines(1);
        let mut session = SyncSession::default();

        let input = Cursor::new("05:00.000\n00:30.000\n");
        let mut capture = PromptCapture::new(input, Vec::new(), 60.0);
        let outcome = capture.run(&lines, &mut session, &store_in(&dir)).unwrap();

        assert_eq!(outcome, CaptureOutcome::Completed);
        assert_eq!(session.timestamps, vec![30.0]);
    }

    #[test]
    fn prompt_capture_interrupts_on_end_of_input() {
        let dir = tempfile::tempdir().unwrap();
        let lines = lyric_lines(2);
        let mut session = SyncSession::default();

        let input = Cursor::new("00:05.000\n");
        let mut capture = PromptCapture::new(input, Vec::new(), 60.0);
        let outcome = capture.run(&lines, &mut session, &store_in(&dir)).unwrap();

        assert_eq!(outcome, CaptureOutcome::Interrupted);
        assert_eq!(session.timestamps, vec![5.0]);
    }
}
