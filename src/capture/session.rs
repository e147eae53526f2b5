//! Per-speaker accumulation state and the size guard applied at finalization.

use crate::pipeline::types::{CapturedUtterance, PcmFormat, SpeakerId};
use crate::settings::RuntimeSettings;
use std::time::Instant;

/// Minimum and maximum accepted capture sizes, in PCM bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeGuard {
    pub min_bytes: usize,
    pub max_bytes: usize,
}

impl SizeGuard {
    pub fn new(min_bytes: usize, max_bytes: usize) -> Self {
        Self {
            min_bytes,
            max_bytes,
        }
    }

    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.voice_min_pcm_bytes, settings.voice_max_pcm_bytes)
    }

    pub fn exceeds_max(&self, bytes: usize) -> bool {
        bytes > self.max_bytes
    }

    /// Decides what happens to a finished capture.
    ///
    /// Truncation wins over the minimum check: a truncated capture is never
    /// forwarded, whatever its size.
    pub fn verdict(&self, bytes: usize, truncated: bool) -> Verdict {
        if truncated {
            Verdict::Truncated
        } else if bytes < self.min_bytes {
            Verdict::TooShort
        } else {
            Verdict::Accept
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    /// Below the minimum; treated as noise.
    TooShort,
    /// Exceeded the maximum at some point during capture.
    Truncated,
}

/// What happened to a pushed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Appended,
    /// This chunk pushed the session over the maximum. The caller must stop
    /// the upstream stream.
    Overflowed,
    /// The session was already truncated; the chunk was dropped.
    Ignored,
}

/// Why a capture produced no utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discard {
    TooShort { bytes: usize },
    Truncated { bytes: usize },
}

/// Result of finalizing a session.
#[derive(Debug)]
pub enum Finalized {
    Utterance(CapturedUtterance),
    Discarded(Discard),
}

/// Accumulation state for one speaker's utterance.
#[derive(Debug)]
pub struct SpeakerSession {
    speaker: SpeakerId,
    format: PcmFormat,
    guard: SizeGuard,
    chunks: Vec<Vec<u8>>,
    byte_count: usize,
    truncated: bool,
    started_at: Instant,
}

impl SpeakerSession {
    pub fn new(speaker: SpeakerId, format: PcmFormat, guard: SizeGuard) -> Self {
        Self {
            speaker,
            format,
            guard,
            chunks: Vec::new(),
            byte_count: 0,
            truncated: false,
            started_at: Instant::now(),
        }
    }

    pub fn speaker(&self) -> &SpeakerId {
        &self.speaker
    }

    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Appends a chunk in arrival order.
    pub fn push(&mut self, chunk: Vec<u8>) -> ChunkOutcome {
        if self.truncated {
            return ChunkOutcome::Ignored;
        }

        self.byte_count += chunk.len();
        self.chunks.push(chunk);

        if self.guard.exceeds_max(self.byte_count) {
            self.truncated = true;
            // The audio is never used once truncated.
            self.chunks = Vec::new();
            return ChunkOutcome::Overflowed;
        }
        ChunkOutcome::Appended
    }

    /// Consumes the session and applies the size guard.
    pub fn finalize(self) -> Finalized {
        match self.guard.verdict(self.byte_count, self.truncated) {
            Verdict::Truncated => Finalized::Discarded(Discard::Truncated {
                bytes: self.byte_count,
            }),
            Verdict::TooShort => Finalized::Discarded(Discard::TooShort {
                bytes: self.byte_count,
            }),
            Verdict::Accept => Finalized::Utterance(CapturedUtterance {
                speaker: self.speaker,
                audio: self.chunks.concat(),
                format: self.format,
                truncated: false,
                started_at: self.started_at,
            }),
        }
    }
}
