//! Error types and reporting for utterance pipeline stages.

use crate::error::RelayError;
use crate::pipeline::types::SpeakerId;
use std::fmt;

/// Pipeline stages that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encode,
    Transcribe,
    Translate,
    Synthesize,
    Enqueue,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Encode => "encode",
            Stage::Transcribe => "transcribe",
            Stage::Translate => "translate",
            Stage::Synthesize => "synthesize",
            Stage::Enqueue => "enqueue",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure that abandoned one utterance.
#[derive(Debug)]
pub struct StageError {
    pub stage: Stage,
    pub source: RelayError,
}

impl StageError {
    pub fn new(stage: Stage, source: RelayError) -> Self {
        Self { stage, source }
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.source)
    }
}

impl std::error::Error for StageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Trait for reporting abandoned utterances.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, speaker: &SpeakerId, error: &StageError);
}

/// Reporter that logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, speaker: &SpeakerId, error: &StageError) {
        tracing::warn!(
            speaker = %speaker,
            stage = error.stage.as_str(),
            error = %error.source,
            "utterance abandoned"
        );
    }
}
