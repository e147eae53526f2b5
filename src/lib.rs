//! voxrelay - Live voice translation relay
//!
//! Captures each speaker's utterances, transcribes and translates them
//! through remote speech services, and speaks the translations back over a
//! single serialized playback output.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod capture;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod control;
pub mod defaults;
pub mod error;
pub mod ipc;
#[cfg(test)]
mod log_capture;
pub mod pipeline;
pub mod playback;
pub mod relay;
pub mod router;
pub mod services;
pub mod settings;

// Composition root - needs the CLI types and the OpenAI client
#[cfg(feature = "cli")]
pub mod app;

// Core traits (capture → services → playback)
pub use playback::output::AudioOutput;
pub use services::{Synthesizer, Transcriber, Translator};

// Relay
pub use relay::{Relay, RelayOptions, RelayStatus, SpeakerFeed};

// Error handling
pub use error::{RelayError, Result};

// Config and runtime settings
pub use config::Config;
pub use settings::{RuntimeSettings, SettingKey, SettingsStore};

// Pipeline
pub use pipeline::error::{ErrorReporter, StageError};
pub use pipeline::orchestrator::{UtteranceOutcome, UtterancePipeline};
pub use pipeline::types::{CapturedUtterance, PcmFormat, PlaybackItem, SpeakerId, StreamEncoding};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
