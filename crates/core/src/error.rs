/// Result alias that carries the custom [`LyricSyncError`] type.
pub type Result<T> = std::result::Result<T, LyricSyncError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum LyricSyncError {
    /// Free-form error message for conditions that do not warrant their own
    /// variant.
    #[error("{0}")]
    Message(String),
    /// A required input (audio recording or lyric source) is absent. Fatal
    /// for the invoking run; nothing is analysed or written after this.
    #[error("missing resource: {0}")]
    MissingResource(String),
    /// Input that fails structural validation before any processing starts.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// An interactive facility (playback device, raw keyboard mode) could
    /// not be acquired. Callers downgrade to the prompt capture mode.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around session / structure (de)serialization errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around FFT processing errors.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
}

impl LyricSyncError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for LyricSyncError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for LyricSyncError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
