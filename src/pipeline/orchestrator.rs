//! Drives one captured utterance through transcribe → translate → synthesize → enqueue.

use crate::audio::wav::pcm_to_wav;
use crate::defaults::MAX_SPEECH_INPUT_CHARS;
use crate::pipeline::error::{ErrorReporter, LogReporter, Stage, StageError};
use crate::pipeline::feedback::{FeedbackSink, feedback_message, truncate_chars};
use crate::pipeline::types::{CapturedUtterance, PlaybackItem, StreamEncoding, UtteranceTiming};
use crate::playback::PlaybackHandle;
use crate::router::{TranslationResult, TranslationRoute, finalize_translation};
use crate::services::{Services, SpeechRequest, TranscriptionRequest, TranslationRequest};
use crate::settings::SettingsStore;
use std::sync::Arc;
use std::time::Instant;

/// How a processed utterance ended, when no stage failed.
#[derive(Debug, Clone)]
pub enum UtteranceOutcome {
    /// Synthesized and queued for playback.
    Enqueued {
        result: TranslationResult,
        timing: UtteranceTiming,
        /// Queue depth right after the enqueue.
        depth: usize,
    },
    /// The transcription was blank.
    EmptyTranscript,
    /// The translation was not worth speaking.
    NotEligible(TranslationResult),
}

/// Shared per-process pipeline; each utterance runs as its own task.
#[derive(Clone)]
pub struct UtterancePipeline {
    services: Services,
    settings: Arc<SettingsStore>,
    playback: PlaybackHandle,
    feedback: Option<Arc<dyn FeedbackSink>>,
    reporter: Arc<dyn ErrorReporter>,
}

impl UtterancePipeline {
    pub fn new(services: Services, settings: Arc<SettingsStore>, playback: PlaybackHandle) -> Self {
        Self {
            services,
            settings,
            playback,
            feedback: None,
            reporter: Arc::new(LogReporter),
        }
    }

    pub fn with_feedback(mut self, feedback: Arc<dyn FeedbackSink>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Processes the utterance and reports any stage failure.
    ///
    /// Returns `None` when the utterance was abandoned.
    pub async fn run(&self, utterance: CapturedUtterance) -> Option<UtteranceOutcome> {
        let speaker = utterance.speaker.clone();
        match self.process(utterance).await {
            Ok(outcome) => Some(outcome),
            Err(error) => {
                self.reporter.report(&speaker, &error);
                None
            }
        }
    }

    /// Processes the utterance end to end.
    pub async fn process(
        &self,
        utterance: CapturedUtterance,
    ) -> Result<UtteranceOutcome, StageError> {
        let settings = self.settings.snapshot();
        let speaker = utterance.speaker.clone();
        let mut timing = UtteranceTiming::default();

        let wav = pcm_to_wav(&utterance.audio, utterance.format)
            .map_err(|e| StageError::new(Stage::Encode, e))?;

        let started = Instant::now();
        let transcript = self
            .services
            .transcriber
            .transcribe(&TranscriptionRequest {
                audio: wav,
                model: settings.transcribe_model.clone(),
            })
            .await
            .map_err(|e| StageError::new(Stage::Transcribe, e))?;
        timing.transcribe = started.elapsed();

        let transcript = transcript.trim();
        if transcript.is_empty() {
            tracing::debug!(speaker = %speaker, "empty transcript, skipping");
            return Ok(UtteranceOutcome::EmptyTranscript);
        }

        let route = TranslationRoute::from_settings(&settings);
        let routing = route.context_for(&speaker);

        let started = Instant::now();
        let raw = self
            .services
            .translator
            .translate(&TranslationRequest {
                text: transcript.to_string(),
                routing: routing.clone(),
                model: settings.model.clone(),
            })
            .await
            .map_err(|e| StageError::new(Stage::Translate, e))?;
        timing.translate = started.elapsed();

        let result = finalize_translation(&raw, &routing);
        if !result.is_eligible() {
            tracing::debug!(
                speaker = %speaker,
                detected = %result.detected_language,
                target = %result.target_language,
                "translation not eligible, skipping"
            );
            return Ok(UtteranceOutcome::NotEligible(result));
        }

        let started = Instant::now();
        let audio = self
            .services
            .synthesizer
            .synthesize(&SpeechRequest {
                text: truncate_chars(&result.translated_text, MAX_SPEECH_INPUT_CHARS).to_string(),
                voice: settings.tts_voice.clone(),
                model: settings.tts_model.clone(),
                format: settings.tts_format.clone(),
            })
            .await
            .map_err(|e| StageError::new(Stage::Synthesize, e))?;
        timing.synthesize = started.elapsed();

        let depth = self
            .playback
            .enqueue(PlaybackItem {
                audio,
                encoding: StreamEncoding::from_tts_format(&settings.tts_format),
                speaker: speaker.clone(),
                detected_language: result.detected_language.clone(),
                target_language: result.target_language.clone(),
                text: result.translated_text.clone(),
            })
            .map_err(|e| StageError::new(Stage::Enqueue, e))?;

        tracing::debug!(
            speaker = %speaker,
            audio_ms = utterance.duration().as_millis() as u64,
            transcribe_ms = timing.transcribe.as_millis() as u64,
            translate_ms = timing.translate.as_millis() as u64,
            synthesize_ms = timing.synthesize.as_millis() as u64,
            total_ms = timing.total().as_millis() as u64,
            queue = depth,
            "translation enqueued"
        );

        if settings.text_feedback
            && let Some(feedback) = &self.feedback
        {
            let message = feedback_message(
                &result.detected_language,
                &result.target_language,
                &result.translated_text,
            );
            if let Err(e) = feedback.send(&speaker, &message) {
                tracing::warn!(sink = feedback.name(), error = %e, "text feedback failed");
            }
        }

        Ok(UtteranceOutcome::Enqueued {
            result,
            timing,
            depth,
        })
    }
}

impl std::fmt::Debug for UtterancePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UtterancePipeline")
            .field("has_feedback", &self.feedback.is_some())
            .finish_non_exhaustive()
    }
}
