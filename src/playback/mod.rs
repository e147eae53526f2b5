//! Serialized playback of synthesized speech onto one output.

pub mod output;
pub mod queue;

pub use output::{AudioOutput, CommandOutput, DirectoryOutput, PlaybackEvent, RecordingOutput};
pub use queue::{PlaybackHandle, PlaybackQueue, PlaybackStats};
