// Error types
// Only sink acquisition, configuration files and file I/O fail with an error.
// Musical input (tempo, patterns, measure length) is normalized instead.

#[derive(Debug, thiserror::Error)]
pub enum MetronomeError {
    #[error("Audio sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON serialization error: {0}")]
    RonSerialize(#[from] ron::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

pub type Result<T> = std::result::Result<T, MetronomeError>;
