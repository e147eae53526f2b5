//! The relay: per-speaker capture tasks feeding the shared pipeline and queue.

use crate::audio::feed::{FeedEvent, WavFeed};
use crate::capture::{
    CaptureOptions, CaptureState, Discard, EndReason, Finalized, SessionRegistry, SizeGuard,
    StreamEvent, run_capture,
};
use crate::pipeline::{
    ErrorReporter, FeedbackSink, PcmFormat, SpeakerId, UtteranceOutcome, UtterancePipeline,
};
use crate::playback::{PlaybackHandle, PlaybackStats};
use crate::services::Services;
use crate::settings::SettingsStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};

/// Startup options that are not runtime settings.
#[derive(Clone, Default)]
pub struct RelayOptions {
    pub format: PcmFormat,
    /// Whether translation starts enabled; otherwise a `start` command is needed.
    pub translation_enabled: bool,
    /// The relay's own speaker ID, never captured.
    pub self_speaker: Option<SpeakerId>,
    pub feedback: Option<Arc<dyn FeedbackSink>>,
    pub reporter: Option<Arc<dyn ErrorReporter>>,
}

/// Snapshot of the relay for the control surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayStatus {
    pub translation_enabled: bool,
    pub playback: PlaybackStats,
    pub sessions: Vec<(SpeakerId, CaptureState)>,
    pub in_flight: usize,
    pub settings: Vec<(String, String)>,
}

impl RelayStatus {
    /// Renders `key=value | key=value` for one-line display.
    pub fn render(&self) -> String {
        let mut fields = vec![
            format!(
                "translation={}",
                if self.translation_enabled { "on" } else { "off" }
            ),
            format!("queue={}", self.playback.pending),
            format!("playing={}", self.playback.playing),
            format!("active={}", self.sessions.len()),
            format!("in_flight={}", self.in_flight),
        ];
        fields.extend(self.settings.iter().map(|(k, v)| format!("{k}={v}")));
        fields.join(" | ")
    }
}

struct RelayInner {
    settings: Arc<SettingsStore>,
    registry: SessionRegistry,
    pipeline: UtterancePipeline,
    playback: PlaybackHandle,
    format: PcmFormat,
    self_speaker: Option<SpeakerId>,
    translation_enabled: AtomicBool,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Cheaply cloneable handle to the running relay.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl Relay {
    pub fn new(
        services: Services,
        settings: Arc<SettingsStore>,
        playback: PlaybackHandle,
        options: RelayOptions,
    ) -> Self {
        let mut pipeline = UtterancePipeline::new(services, settings.clone(), playback.clone());
        if let Some(feedback) = options.feedback {
            pipeline = pipeline.with_feedback(feedback);
        }
        if let Some(reporter) = options.reporter {
            pipeline = pipeline.with_reporter(reporter);
        }

        Self {
            inner: Arc::new(RelayInner {
                settings,
                registry: SessionRegistry::new(),
                pipeline,
                playback,
                format: options.format,
                self_speaker: options.self_speaker,
                translation_enabled: AtomicBool::new(options.translation_enabled),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.inner.settings
    }

    pub fn playback(&self) -> &PlaybackHandle {
        &self.inner.playback
    }

    pub fn is_translation_enabled(&self) -> bool {
        self.inner.translation_enabled.load(Ordering::SeqCst)
    }

    /// Turns translation on or off. Returns the previous state.
    ///
    /// Sessions already capturing are not affected.
    pub fn set_translation_enabled(&self, enabled: bool) -> bool {
        let previous = self
            .inner
            .translation_enabled
            .swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            tracing::info!(enabled, "translation toggled");
        }
        previous
    }

    pub fn is_capturing(&self, speaker: &SpeakerId) -> bool {
        self.inner.registry.is_active(speaker)
    }

    /// Handles "speaker started talking".
    ///
    /// Returns the feed for this episode, or `None` when the start is
    /// ignored: translation disabled, speaker filtered out, or a session
    /// already active for the speaker.
    pub fn speaking_started(&self, speaker: &SpeakerId) -> Option<SpeakerFeed> {
        if !self.is_translation_enabled() {
            tracing::trace!(speaker = %speaker, "translation disabled, ignoring start");
            return None;
        }
        if self.inner.self_speaker.as_ref() == Some(speaker) {
            return None;
        }

        let settings = self.inner.settings.snapshot();
        if !settings.allows(speaker) {
            tracing::trace!(speaker = %speaker, "speaker not allowed, ignoring start");
            return None;
        }

        let Some(claim) = self.inner.registry.try_claim(speaker) else {
            tracing::debug!(speaker = %speaker, "session already active, ignoring start");
            return None;
        };

        let options = CaptureOptions {
            guard: SizeGuard::from_settings(&settings),
            format: self.inner.format,
            silence: Duration::from_millis(settings.silence_ms),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let flight = InFlight::enter(self.inner.clone());
        let pipeline = self.inner.pipeline.clone();
        let task_speaker = speaker.clone();

        tracing::debug!(speaker = %speaker, "capture started");
        tokio::spawn(async move {
            let _flight = flight;
            let (finalized, reason) = run_capture(task_speaker.clone(), rx, options).await;
            claim.set_state(CaptureState::Finalizing);
            // The speaker may start a new session while this one is processed.
            drop(claim);

            match finalized {
                Finalized::Utterance(utterance) => {
                    tracing::debug!(
                        speaker = %task_speaker,
                        bytes = utterance.audio.len(),
                        end = ?reason,
                        "utterance captured"
                    );
                    if let Some(UtteranceOutcome::Enqueued { result, .. }) =
                        pipeline.run(utterance).await
                    {
                        tracing::info!(
                            speaker = %task_speaker,
                            from = %result.detected_language,
                            to = %result.target_language,
                            "translated: {}",
                            result.translated_text
                        );
                    }
                }
                Finalized::Discarded(Discard::TooShort { bytes }) => {
                    tracing::debug!(speaker = %task_speaker, bytes, "short capture ignored");
                }
                Finalized::Discarded(Discard::Truncated { bytes }) => {
                    tracing::warn!(
                        speaker = %task_speaker,
                        bytes,
                        "ignored overlong capture"
                    );
                }
            }

            if let EndReason::Failed(message) = reason {
                tracing::debug!(speaker = %task_speaker, error = %message, "stream ended with error");
            }
        });

        Some(SpeakerFeed {
            speaker: speaker.clone(),
            tx,
        })
    }

    /// Capture sessions and pipelines currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Waits until no capture or pipeline task is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            translation_enabled: self.is_translation_enabled(),
            playback: self.inner.playback.stats(),
            sessions: self.inner.registry.active(),
            in_flight: self.in_flight(),
            settings: self.inner.settings.entries(),
        }
    }

    pub fn render_status(&self) -> String {
        self.status().render()
    }

    /// Replays a file feed as voice-transport events.
    ///
    /// With `realtime`, events are paced to their audio-time offsets.
    pub async fn play_feed(&self, feed: &WavFeed, realtime: bool) {
        let settings = self.inner.settings.snapshot();
        let events = feed.events(
            crate::defaults::VOICE_GATE_THRESHOLD,
            Duration::from_millis(settings.silence_ms),
        );
        let origin = tokio::time::Instant::now();
        let mut current: Option<SpeakerFeed> = None;

        for timed in events {
            if realtime {
                tokio::time::sleep_until(origin + timed.at).await;
            }
            match timed.event {
                FeedEvent::Start => current = self.speaking_started(feed.speaker()),
                FeedEvent::Chunk(bytes) => {
                    if let Some(speaker_feed) = &current {
                        speaker_feed.chunk(bytes);
                    }
                }
                FeedEvent::End => {
                    if let Some(speaker_feed) = current.take() {
                        speaker_feed.end();
                        // Unpaced replay can reach the next start before the
                        // capture task has released the speaker.
                        if !realtime {
                            while self.is_capturing(speaker_feed.speaker()) {
                                tokio::task::yield_now().await;
                            }
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("translation_enabled", &self.is_translation_enabled())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

/// Counts a running speaker task; wakes `wait_idle` when the last one ends.
struct InFlight {
    inner: Arc<RelayInner>,
}

impl InFlight {
    fn enter(inner: Arc<RelayInner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Producer side of one speaking episode.
///
/// Dropping the feed ends the episode like an explicit `end`.
#[derive(Debug)]
pub struct SpeakerFeed {
    speaker: SpeakerId,
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl SpeakerFeed {
    pub fn speaker(&self) -> &SpeakerId {
        &self.speaker
    }

    /// Delivers a chunk. Returns false once the stream has been closed.
    pub fn chunk(&self, bytes: Vec<u8>) -> bool {
        self.tx.send(StreamEvent::Chunk(bytes)).is_ok()
    }

    pub fn end(&self) {
        if self.tx.send(StreamEvent::End).is_err() {
            tracing::trace!(speaker = %self.speaker, "end after stream closed");
        }
    }

    /// Upstream failure; finalized like a clean end.
    pub fn error(&self, message: impl Into<String>) {
        if self.tx.send(StreamEvent::Error(message.into())).is_err() {
            tracing::trace!(speaker = %self.speaker, "error after stream closed");
        }
    }

    /// True once the capture stopped reading, e.g. after overflow.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
