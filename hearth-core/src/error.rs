use thiserror::Error;

/// All errors produced by hearth-core.
#[derive(Debug, Error)]
pub enum HearthError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("transcription service error: {0}")]
    Transcription(String),

    #[error("intent service error: {0}")]
    Intent(String),

    #[error("transcode failed for clip: {0}")]
    Transcode(String),

    #[error("wav codec error: {0}")]
    Wav(String),

    #[error("session is already running")]
    AlreadyRunning,

    #[error("session is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HearthError>;
