//! Error types for voxrelay.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Missing required credential: {name}")]
    MissingCredential { name: String },

    // Service errors
    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    #[error("Translation failed: {message}")]
    Translation { message: String },

    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    #[error("{service} rate limited{}", format_retry_after(.retry_after))]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    // Playback errors
    #[error("Playback failed: {message}")]
    Playback { message: String },

    // Runtime settings errors
    #[error("key not supported. Use: {valid}")]
    UnknownSetting { key: String, valid: String },

    #[error("{message}")]
    InvalidSetting { key: String, message: String },

    // IPC errors
    #[error("IPC socket error: {message}")]
    IpcSocket { message: String },

    #[error("IPC protocol error: {message}")]
    IpcProtocol { message: String },

    #[error("IPC connection failed: {message}")]
    IpcConnection { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

fn format_retry_after(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}ms)", d.as_millis()),
        None => String::new(),
    }
}

impl RelayError {
    /// Returns true for errors a retry decorator may recover from.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RelayError::RateLimited { .. })
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RelayError>;
