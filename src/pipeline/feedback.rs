//! Text disclosure of spoken translations.
//!
//! Feedback is informational only. A sink failure is logged by the caller
//! and never affects playback.

use crate::defaults::MAX_FEEDBACK_CHARS;
use crate::error::Result;
use crate::pipeline::types::SpeakerId;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Builds the `[src->dst] text` message, bounded to the feedback limit.
pub fn feedback_message(detected: &str, target: &str, text: &str) -> String {
    let message = format!("[{detected}->{target}] {text}");
    truncate_chars(&message, MAX_FEEDBACK_CHARS).to_string()
}

/// Returns at most `max` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub trait FeedbackSink: Send + Sync {
    fn send(&self, speaker: &SpeakerId, message: &str) -> Result<()>;

    fn name(&self) -> &'static str {
        "feedback"
    }
}

/// Logs feedback at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFeedback;

impl FeedbackSink for LogFeedback {
    fn send(&self, speaker: &SpeakerId, message: &str) -> Result<()> {
        tracing::info!(speaker = %speaker, "{message}");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Appends one line per message to a file.
#[derive(Debug)]
pub struct FileFeedback {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileFeedback {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

impl FeedbackSink for FileFeedback {
    fn send(&self, speaker: &SpeakerId, message: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{speaker}\t{}", message.replace('\n', " "))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Keeps messages in memory.
#[derive(Debug, Default)]
pub struct CollectorFeedback {
    messages: Mutex<Vec<(SpeakerId, String)>>,
}

impl CollectorFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(SpeakerId, String)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FeedbackSink for CollectorFeedback {
    fn send(&self, speaker: &SpeakerId, message: &str) -> Result<()> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((speaker.clone(), message.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}
