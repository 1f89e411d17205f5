use thiserror::Error;

/// Session-level failures surfaced by the engine.
///
/// Per-window failures never show up here: an unvoiced window is a normal
/// `PitchEstimate::Unvoiced` and is simply left out of aggregation.
#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("no usable voiced windows in the recording")]
    InsufficientVoiceData,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("a previous session's analysis is still running")]
    SessionBusy,

    #[error("worker thread panicked")]
    WorkerPanicked,

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        VoiceError::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, VoiceError>;
