mod decode;
mod interactive;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lyric_sync_core::{
    detect_cues, format_time, parse_lyrics, render_timeline, vocal_activity, CaptureMode,
    CaptureOutcome, FeatureExtractor, InteractiveCapture, LyricLine, LyricSyncError,
    PromptCapture, SectionHints, SessionStore, SongStructure, StructuralAllocator, SyncConfig,
    SyncSession, TimelineBuilder, TimelineEntry,
};
use tracing_subscriber::EnvFilter;

fn main() -> lyric_sync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Allocate {
            audio,
            lyrics,
            structure,
            output,
        } => run_allocate(&audio, &lyrics, structure.as_deref(), &output),
        Commands::Sync {
            audio,
            lyrics,
            structure,
            session,
            output,
        } => run_sync(&audio, &lyrics, structure.as_deref(), &session, &output),
        Commands::Capture {
            audio,
            lyrics,
            structure,
            session,
            output,
        } => run_capture(&audio, &lyrics, structure.as_deref(), &session, &output),
    }
}

/// Builds a timeline purely from the song structure's proportions, plus
/// acoustic hints about where sections likely sit.
fn run_allocate(
    audio: &Path,
    lyrics: &Path,
    structure: Option<&Path>,
    output: &Path,
) -> lyric_sync_core::Result<()> {
    let config = SyncConfig::default();
    let signal = decode::read_wav(audio)?;
    let lines = load_lyrics(lyrics)?;
    let structure = load_structure(structure, lines.len())?;
    tracing::info!(
        duration = %format_time(signal.duration_seconds()),
        lines = lines.len(),
        "allocating structural timeline"
    );

    let mut extractor = FeatureExtractor::new(config.analysis.clone());
    let features = extractor.extract(&signal)?;
    let hints = SectionHints::estimate(&features.energy, &config.detector);
    tracing::info!(
        energy_peaks = hints.peaks.len(),
        energy_valleys = hints.valleys.len(),
        "structural hints"
    );

    let allocator = StructuralAllocator::new(config.allocator);
    let entries = allocator.allocate(&lines, &structure, signal.duration_seconds())?;
    write_timeline(output, &title_for(audio), signal.duration_seconds(), &entries)
}

/// Full acoustic pipeline with manual/acoustic/hybrid path selection.
fn run_sync(
    audio: &Path,
    lyrics: &Path,
    structure: Option<&Path>,
    session: &Path,
    output: &Path,
) -> lyric_sync_core::Result<()> {
    let config = SyncConfig::default();
    let signal = decode::read_wav(audio)?;
    let lines = load_lyrics(lyrics)?;
    let structure = load_structure(structure, lines.len())?;
    tracing::info!(
        duration = %format_time(signal.duration_seconds()),
        lines = lines.len(),
        "synchronizing lyrics"
    );

    let mut extractor = FeatureExtractor::new(config.analysis.clone());
    let features = extractor.extract(&signal)?;
    let activity = vocal_activity(&features, &config.analysis.weights);
    let cues = detect_cues(&activity, &features.onsets, &config.detector);
    tracing::info!(
        onsets = features.onsets.len(),
        cues = cues.len(),
        "acoustic analysis complete"
    );

    let manual = SessionStore::new(session).load()?;

    let builder = TimelineBuilder::new(config.builder);
    let mut entries = builder.build(&lines, signal.duration_seconds(), &cues, manual.as_ref())?;
    TimelineBuilder::label_sections(&mut entries, &structure);
    write_timeline(output, &title_for(audio), signal.duration_seconds(), &entries)
}

/// Interactive capture: the operator marks line starts while the song
/// plays, or types timecodes when no device is available.
fn run_capture(
    audio: &Path,
    lyrics: &Path,
    structure: Option<&Path>,
    session: &Path,
    output: &Path,
) -> lyric_sync_core::Result<()> {
    let config = SyncConfig::default();
    let signal = decode::read_wav(audio)?;
    let duration = signal.duration_seconds();
    let lines = load_lyrics(lyrics)?;
    let store = SessionStore::new(session);

    let mut session_data = match store.load()? {
        Some(existing) if !existing.is_empty() => {
            println!(
                "Found a saved session with {} of {} timestamps.",
                existing.len(),
                lines.len()
            );
            if confirm("Continue from it?")? {
                existing
            } else {
                SyncSession::default()
            }
        }
        _ => SyncSession::default(),
    };

    print_instructions(duration, &lines);
    let outcome = run_capture_mode(audio, &lines, &mut session_data, &store, duration)?;

    match outcome {
        CaptureOutcome::Completed if session_data.covers(lines.len()) => {
            store.save(&session_data)?;
            tracing::info!(path = %store.path().display(), "session saved");

            let builder = TimelineBuilder::new(config.builder);
            let mut entries = builder.from_manual(&lines, &session_data, duration)?;
            let structure = load_structure(structure, lines.len())?;
            TimelineBuilder::label_sections(&mut entries, &structure);
            write_timeline(output, &title_for(audio), duration, &entries)
        }
        CaptureOutcome::Completed => {
            tracing::warn!(
                marked = session_data.len(),
                lines = lines.len(),
                "session incomplete, no timeline written"
            );
            offer_save(&store, &session_data)
        }
        CaptureOutcome::Interrupted => {
            println!("Capture interrupted.");
            offer_save(&store, &session_data)
        }
    }
}

/// Prefers the real-time backends, degrading to prompt capture when either
/// capability is missing.
fn run_capture_mode(
    audio: &Path,
    lines: &[LyricLine],
    session: &mut SyncSession,
    store: &SessionStore,
    duration: f32,
) -> lyric_sync_core::Result<CaptureOutcome> {
    match interactive::try_interactive(audio) {
        Ok((player, keys)) => {
            let stdout = io::stdout();
            let mut mode = InteractiveCapture::new(player, keys, stdout.lock());
            mode.run(lines, session, store)
        }
        Err(LyricSyncError::CapabilityUnavailable(reason)) => {
            tracing::warn!(%reason, "interactive capture unavailable, using prompt mode");
            let stdin = io::stdin();
            let stdout = io::stdout();
            let mut mode = PromptCapture::new(stdin.lock(), stdout.lock(), duration);
            mode.run(lines, session, store)
        }
        Err(other) => Err(other),
    }
}

/// Partial progress is offered for persistence, never saved silently.
fn offer_save(store: &SessionStore, session: &SyncSession) -> lyric_sync_core::Result<()> {
    if session.is_empty() {
        return Ok(());
    }
    if confirm(&format!("Save progress ({} timestamps)?", session.len()))? {
        store.save(session)?;
        println!("Saved to {}.", store.path().display());
    }
    Ok(())
}

fn print_instructions(duration: f32, lines: &[LyricLine]) {
    println!("Song duration: {}", format_time(duration));
    println!("Lyric lines:   {}", lines.len());
    println!();
    println!("SPACE marks the current line as the song plays.");
    println!("'r' restarts playback, 's' saves progress, 'p' shows progress,");
    println!("'q' quits without saving.");
    println!();
}

fn confirm(prompt: &str) -> lyric_sync_core::Result<bool> {
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{prompt} (y/n): ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => {}
        }
    }
}

fn load_lyrics(path: &Path) -> lyric_sync_core::Result<Vec<LyricLine>> {
    if !path.exists() {
        return Err(LyricSyncError::MissingResource(path.display().to_string()));
    }
    let lines = parse_lyrics(BufReader::new(File::open(path)?))?;
    if lines.is_empty() {
        return Err(LyricSyncError::msg(format!(
            "no lyric lines found in {}",
            path.display()
        )));
    }
    Ok(lines)
}

fn load_structure(
    path: Option<&Path>,
    line_count: usize,
) -> lyric_sync_core::Result<SongStructure> {
    let Some(path) = path else {
        return Ok(SongStructure::uniform(line_count));
    };
    if !path.exists() {
        return Err(LyricSyncError::MissingResource(path.display().to_string()));
    }
    let structure = SongStructure::from_json(BufReader::new(File::open(path)?))?;
    if structure.total_lines() != line_count {
        tracing::warn!(
            declared = structure.total_lines(),
            actual = line_count,
            "structure line count differs from lyrics, trailing lines take the last section"
        );
    }
    Ok(structure)
}

/// Renders the whole document in memory first so a failed run never leaves
/// a truncated timeline behind.
fn write_timeline(
    path: &Path,
    title: &str,
    duration: f32,
    entries: &[TimelineEntry],
) -> lyric_sync_core::Result<()> {
    let document = render_timeline(title, duration, entries);
    std::fs::write(path, document)?;
    tracing::info!(
        path = %path.display(),
        entries = entries.len(),
        "timeline written"
    );
    Ok(())
}

fn title_for(audio: &Path) -> String {
    let stem = audio
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Timeline".to_string());
    format!("{stem} Timeline")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Aligns lyric lines to timestamps in an audio recording", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a timeline from the song structure's proportions alone.
    Allocate {
        /// Path to the WAV recording.
        audio: PathBuf,
        /// Path to the lyric text file.
        lyrics: PathBuf,
        /// Song structure description (JSON). Defaults to one verse
        /// covering every line.
        #[arg(short = 't', long)]
        structure: Option<PathBuf>,
        /// Output path for the timeline document.
        #[arg(short, long, default_value = "Timeline.md")]
        output: PathBuf,
    },
    /// Align lines to acoustic cue points, falling back to the hybrid path.
    Sync {
        /// Path to the WAV recording.
        audio: PathBuf,
        /// Path to the lyric text file.
        lyrics: PathBuf,
        /// Song structure description (JSON).
        #[arg(short = 't', long)]
        structure: Option<PathBuf>,
        /// Manual sync session consulted before the acoustic paths.
        #[arg(short, long, default_value = "sync_data.json")]
        session: PathBuf,
        /// Output path for the timeline document.
        #[arg(short, long, default_value = "Timeline.md")]
        output: PathBuf,
    },
    /// Mark line starts by hand while the song plays.
    Capture {
        /// Path to the WAV recording.
        audio: PathBuf,
        /// Path to the lyric text file.
        lyrics: PathBuf,
        /// Song structure description (JSON).
        #[arg(short = 't', long)]
        structure: Option<PathBuf>,
        /// Where capture progress is persisted between runs.
        #[arg(short, long, default_value = "sync_data.json")]
        session: PathBuf,
        /// Output path for the timeline document.
        #[arg(short, long, default_value = "Timeline.md")]
        output: PathBuf,
    },
}
