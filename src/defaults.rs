//! Default configuration constants for voxrelay.
//!
//! Shared between the TOML config, the runtime settings store and the
//! service clients so every layer agrees on the same baseline.

/// Base URL of the OpenAI-compatible API.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Chat model used for language detection and translation.
pub const TRANSLATE_MODEL: &str = "gpt-4.1-mini";

/// Model used for speech-to-text.
pub const TRANSCRIBE_MODEL: &str = "whisper-1";

/// Model used for text-to-speech.
pub const TTS_MODEL: &str = "gpt-4o-mini-tts";

/// Default synthesis voice.
pub const TTS_VOICE: &str = "alloy";

/// Default synthesis output format. Opus plays without transcoding on
/// Ogg/Opus voice transports.
pub const TTS_FORMAT: &str = "opus";

/// Output formats accepted by the speech endpoint.
pub const SUPPORTED_TTS_FORMATS: &[&str] = &["opus", "mp3", "wav", "aac", "flac", "pcm"];

/// Default language routing table.
pub const LANGUAGE_PAIRS: &str = "en:ro,ro:en";

/// Silence after the last voiced frame before an utterance is considered ended.
pub const SILENCE_MS: u64 = 1200;

/// Captures below this many PCM bytes are treated as noise.
///
/// 96000 bytes is 0.5 s of 48 kHz stereo 16-bit audio.
pub const MIN_PCM_BYTES: usize = 96_000;

/// Captures above this many PCM bytes are truncated and dropped.
///
/// 9600000 bytes is 50 s of 48 kHz stereo 16-bit audio.
pub const MAX_PCM_BYTES: usize = 9_600_000;

/// Decoded voice frames arrive as 48 kHz stereo signed 16-bit little endian.
pub const SAMPLE_RATE: u32 = 48_000;
pub const CHANNELS: u16 = 2;
pub const BITS_PER_SAMPLE: u16 = 16;

/// Maximum number of characters the speech endpoint accepts per request.
pub const MAX_SPEECH_INPUT_CHARS: usize = 3900;

/// Maximum length of a text feedback message.
pub const MAX_FEEDBACK_CHARS: usize = 1900;

/// Detected-language token used when detection failed.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// Per-request timeout for service calls.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Retries after a rate-limited service call.
pub const MAX_RETRIES: u32 = 2;

/// Backoff used when the service gives no wait hint.
pub const RETRY_BASE_MS: u64 = 1000;

/// Upper bound on any single wait before a retry, hinted or not.
pub const RETRY_MAX_WAIT_SECS: u64 = 60;

/// RMS level above which a file-fed frame counts as voiced.
pub const VOICE_GATE_THRESHOLD: f32 = 0.01;

/// Duration of one ingress frame in milliseconds.
pub const FRAME_MS: u32 = 20;

/// Player used when neither a player nor an output directory is given.
/// Reads one encoded item from stdin and exits when it finishes.
pub const PLAYER_COMMAND: &str = "ffplay -nodisp -autoexit -loglevel error -";
