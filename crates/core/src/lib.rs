//! Core library for the Lyric Sync application.
//!
//! The crate implements the synchronization engine that aligns an ordered
//! list of lyric lines with timestamps inside an audio recording. Each module
//! owns a distinct subsystem (feature extraction, cue detection, structural
//! allocation, timeline building, manual capture) and the binary crate wires
//! them to the actual audio and terminal devices.

pub mod analysis;
pub mod audio;
pub mod config;
pub mod cues;
pub mod error;
pub mod lyrics;
pub mod report;
pub mod structure;
pub mod sync;
pub mod timeline;

pub use analysis::{vocal_activity, AudioFeatures, FeatureExtractor, FeatureSeries};
pub use audio::{AudioSignal, Player};
pub use config::{
    ActivityWeights, AllocatorConfig, AnalysisConfig, BuilderConfig, DetectorConfig, SyncConfig,
};
pub use cues::{detect_cues, energy_valleys, CuePoint};
pub use error::{LyricSyncError, Result};
pub use lyrics::{parse_lyrics, LyricLine};
pub use report::{format_time, parse_time, parse_timeline, render_timeline, ParsedEntry};
pub use structure::{
    SectionHints, SectionKind, SectionSpec, SectionTag, SongStructure, StructuralAllocator,
};
pub use sync::{
    CaptureMode, CaptureOutcome, InteractiveCapture, KeySource, PromptCapture, SessionState,
    SessionStore, SyncEvent, SyncSession,
};
pub use timeline::{TimelineBuilder, TimelineEntry};
