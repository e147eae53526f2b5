//! Drives one [`SpeakerSession`] from a per-speaker event stream.

use crate::capture::session::{ChunkOutcome, Finalized, SizeGuard, SpeakerSession};
use crate::pipeline::types::{PcmFormat, SpeakerId};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Events delivered to a capture after `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(Vec<u8>),
    End,
    Error(String),
}

/// Why the capture stopped reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Explicit `end` from upstream.
    Ended,
    /// Upstream reported an error; finalized like a clean end.
    Failed(String),
    /// Every sender was dropped, or the stream was closed after overflow.
    Closed,
    /// No event arrived within the silence window.
    SilenceTimeout,
}

/// Capture parameters fixed at session start.
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions {
    pub guard: SizeGuard,
    pub format: PcmFormat,
    pub silence: Duration,
}

/// Reads events until end-of-stream, then finalizes the session exactly once.
///
/// On overflow the receiver is closed so upstream sends fail fast; events
/// already buffered are drained but their audio is dropped.
pub async fn run_capture(
    speaker: SpeakerId,
    mut events: mpsc::UnboundedReceiver<StreamEvent>,
    options: CaptureOptions,
) -> (Finalized, EndReason) {
    let mut session = SpeakerSession::new(speaker, options.format, options.guard);

    let reason = loop {
        let event = match timeout(options.silence, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => break EndReason::Closed,
            Err(_) => break EndReason::SilenceTimeout,
        };

        match event {
            StreamEvent::Chunk(bytes) => {
                if session.push(bytes) == ChunkOutcome::Overflowed {
                    tracing::warn!(
                        speaker = %session.speaker(),
                        bytes = session.byte_count(),
                        max = options.guard.max_bytes,
                        "capture exceeded maximum size, closing stream"
                    );
                    events.close();
                }
            }
            StreamEvent::End => break EndReason::Ended,
            StreamEvent::Error(message) => break EndReason::Failed(message),
        }
    };

    (session.finalize(), reason)
}
