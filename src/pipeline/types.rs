//! Data types flowing through the relay: capture → pipeline → playback.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Opaque, stable identity of a speaker on the voice transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeakerId(Arc<str>);

impl SpeakerId {
    /// Wraps an identifier without validation (transport-provided IDs).
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Parses a user-supplied identifier.
    ///
    /// Accepts 1–64 characters from `[A-Za-z0-9_.@-]`.
    pub fn parse(value: &str) -> Result<Self, String> {
        let value = value.trim();
        let valid = !value.is_empty()
            && value.len() <= 64
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '-'));
        if valid {
            Ok(Self::new(value))
        } else {
            Err(format!("invalid speaker id: {value:?}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeakerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Layout of headerless PCM delivered by the voice transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// Bytes per second of audio in this format.
    pub fn byte_rate(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Bytes per interleaved sample frame (all channels).
    pub fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Duration represented by `bytes` of audio.
    pub fn duration_of(&self, bytes: usize) -> Duration {
        let rate = self.byte_rate();
        if rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(bytes as f64 / rate as f64)
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: crate::defaults::SAMPLE_RATE,
            channels: crate::defaults::CHANNELS,
            bits_per_sample: crate::defaults::BITS_PER_SAMPLE,
        }
    }
}

/// Immutable snapshot of one finished speaking episode.
#[derive(Debug, Clone)]
pub struct CapturedUtterance {
    pub speaker: SpeakerId,
    /// Exact concatenation of the chunks received between start and end.
    pub audio: Vec<u8>,
    pub format: PcmFormat,
    /// Always false for utterances that reach the pipeline.
    pub truncated: bool,
    /// When the session started.
    pub started_at: Instant,
}

impl CapturedUtterance {
    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.audio.len())
    }
}

/// Declared encoding of a synthesized audio stream handed to the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEncoding {
    /// Ogg-contained Opus, playable without transcoding.
    OggOpus,
    /// Anything else; the output must detect the container and transcode.
    Arbitrary { format: String },
}

impl StreamEncoding {
    /// Maps a synthesis output format name to the declared stream encoding.
    pub fn from_tts_format(format: &str) -> Self {
        if format.eq_ignore_ascii_case("opus") {
            StreamEncoding::OggOpus
        } else {
            StreamEncoding::Arbitrary {
                format: format.to_ascii_lowercase(),
            }
        }
    }

    /// File extension used when persisting audio in this encoding.
    pub fn extension(&self) -> &str {
        match self {
            StreamEncoding::OggOpus => "ogg",
            StreamEncoding::Arbitrary { format } => format,
        }
    }
}

/// Per-stage durations of one processed utterance.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtteranceTiming {
    pub transcribe: Duration,
    pub translate: Duration,
    pub synthesize: Duration,
}

impl UtteranceTiming {
    pub fn total(&self) -> Duration {
        self.transcribe + self.translate + self.synthesize
    }
}

/// Synthesized speech waiting for its turn on the output.
#[derive(Debug, Clone)]
pub struct PlaybackItem {
    pub audio: Vec<u8>,
    pub encoding: StreamEncoding,
    pub speaker: SpeakerId,
    pub detected_language: String,
    pub target_language: String,
    pub text: String,
}
