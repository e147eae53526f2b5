//! PCM helpers: WAV framing, format conversion, voice gating and file replay.

pub mod feed;
pub mod gate;
pub mod wav;

pub use feed::{FeedEvent, TimedEvent, WavFeed};
pub use gate::{GateDecision, VoiceGate, calculate_rms};
pub use wav::{pcm_to_wav, read_wav};
