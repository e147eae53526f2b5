//! Replays a WAV file as a speaker's voice-transport event stream.

use crate::audio::gate::{GateDecision, VoiceGate};
use crate::audio::wav::{read_wav, samples_to_le_bytes};
use crate::error::{RelayError, Result};
use crate::pipeline::types::{PcmFormat, SpeakerId};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::Duration;

/// One ingress event for a speaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Start,
    Chunk(Vec<u8>),
    End,
}

/// A [`FeedEvent`] stamped with its offset in audio time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub at: Duration,
    pub event: FeedEvent,
}

/// A speaker's audio, converted to the capture format and split into frames.
#[derive(Debug, Clone)]
pub struct WavFeed {
    speaker: SpeakerId,
    frames: Vec<Vec<i16>>,
    frame_duration: Duration,
}

impl WavFeed {
    pub fn open(speaker: SpeakerId, path: &Path, format: PcmFormat) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            RelayError::Other(format!("cannot open {}: {e}", path.display()))
        })?;
        Self::from_reader(speaker, BufReader::new(file), format)
    }

    pub fn from_reader(speaker: SpeakerId, reader: impl Read, format: PcmFormat) -> Result<Self> {
        let samples = read_wav(reader)?.convert(format);
        let frame_ms = crate::defaults::FRAME_MS;
        let per_frame = (format.sample_rate as usize * frame_ms as usize / 1000)
            * usize::from(format.channels.max(1));

        let frames = samples
            .chunks(per_frame.max(1))
            .map(<[i16]>::to_vec)
            .collect();

        Ok(Self {
            speaker,
            frames,
            frame_duration: Duration::from_millis(u64::from(frame_ms)),
        })
    }

    pub fn speaker(&self) -> &SpeakerId {
        &self.speaker
    }

    pub fn duration(&self) -> Duration {
        self.frame_duration * self.frames.len() as u32
    }

    /// Gates the frames into a timed event script.
    ///
    /// An episode still open at end of file is closed at the end.
    pub fn events(&self, threshold: f32, silence: Duration) -> Vec<TimedEvent> {
        let mut gate = VoiceGate::new(threshold, silence);
        let mut events = Vec::new();
        let mut at = Duration::ZERO;

        for frame in &self.frames {
            match gate.process(frame, self.frame_duration) {
                GateDecision::Open => {
                    events.push(TimedEvent {
                        at,
                        event: FeedEvent::Start,
                    });
                    events.push(TimedEvent {
                        at,
                        event: FeedEvent::Chunk(samples_to_le_bytes(frame)),
                    });
                }
                GateDecision::Pass => events.push(TimedEvent {
                    at,
                    event: FeedEvent::Chunk(samples_to_le_bytes(frame)),
                }),
                GateDecision::Close => events.push(TimedEvent {
                    at: at + self.frame_duration,
                    event: FeedEvent::End,
                }),
                GateDecision::Hold | GateDecision::Quiet => {}
            }
            at += self.frame_duration;
        }

        if gate.is_open() {
            events.push(TimedEvent {
                at,
                event: FeedEvent::End,
            });
        }
        events
    }
}
