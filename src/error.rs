//! Error types for the voicewire client

use thiserror::Error;

/// Result type alias for voicewire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voicewire client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device or processing error
    #[error("audio error: {0}")]
    Audio(String),

    /// Resampling error
    #[error("resample error: {0}")]
    Resample(String),

    /// Transport (WebSocket) error
    #[error("transport error: {0}")]
    Transport(String),

    /// Wire frame or payload codec error
    #[error("codec error: {0}")]
    Codec(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
