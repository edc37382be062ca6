use std::fs::File;
use std::io::{BufReader, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;
use lyric_sync_core::{KeySource, LyricSyncError, Player, Result, SyncEvent};
use rodio::{OutputStream, OutputStreamHandle, Sink};

/// Acquires the playback and keyboard backends for interactive capture.
/// Either failing surfaces [`LyricSyncError::CapabilityUnavailable`] so the
/// caller can fall back to prompt capture.
pub fn try_interactive(audio: &Path) -> Result<(RodioPlayer, CrosstermKeys)> {
    let player = RodioPlayer::try_new(audio)?;
    let keys = CrosstermKeys::try_new()?;
    Ok((player, keys))
}

/// Playback backend over the default output device. The elapsed-time
/// reference is reset on every (re)start so marked timestamps measure
/// wall-clock time since the top of the song.
pub struct RodioPlayer {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    path: PathBuf,
    started: Option<Instant>,
}

impl RodioPlayer {
    pub fn try_new(path: &Path) -> Result<Self> {
        let (stream, handle) = OutputStream::try_default().map_err(|e| {
            LyricSyncError::CapabilityUnavailable(format!("no audio output device: {e}"))
        })?;
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            path: path.to_path_buf(),
            started: None,
        })
    }
}

impl Player for RodioPlayer {
    fn play(&mut self) -> Result<()> {
        self.stop();
        let file = File::open(&self.path)?;
        let source = rodio::Decoder::new(BufReader::new(file)).map_err(|e| {
            LyricSyncError::msg(format!("failed to decode {}: {e}", self.path.display()))
        })?;
        let sink = Sink::try_new(&self.handle)
            .map_err(|e| LyricSyncError::CapabilityUnavailable(format!("audio sink: {e}")))?;
        sink.append(source);
        self.sink = Some(sink);
        self.started = Some(Instant::now());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.started = None;
    }

    fn elapsed(&self) -> f32 {
        self.started
            .map(|started| started.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }
}

/// Scoped raw-mode acquisition: the terminal is restored to its previous
/// mode on every exit path, including panics and operator quit.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().map_err(|e| {
            LyricSyncError::CapabilityUnavailable(format!("raw keyboard mode: {e}"))
        })?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Keyboard backend mapping key presses to capture events.
pub struct CrosstermKeys {
    _guard: RawModeGuard,
}

impl CrosstermKeys {
    pub fn try_new() -> Result<Self> {
        if !std::io::stdin().is_terminal() {
            return Err(LyricSyncError::CapabilityUnavailable(
                "stdin is not a terminal".to_string(),
            ));
        }
        Ok(Self {
            _guard: RawModeGuard::enable()?,
        })
    }
}

impl KeySource for CrosstermKeys {
    fn poll(&mut self, timeout: Duration) -> Result<Option<SyncEvent>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(match key.code {
                    KeyCode::Char(' ') => Some(SyncEvent::Mark),
                    KeyCode::Char('r') => Some(SyncEvent::Repeat),
                    KeyCode::Char('s') => Some(SyncEvent::Save),
                    KeyCode::Char('p') => Some(SyncEvent::ShowProgress),
                    KeyCode::Char('q') | KeyCode::Esc => Some(SyncEvent::Quit),
                    _ => None,
                });
            }
        }
        Ok(None)
    }
}
