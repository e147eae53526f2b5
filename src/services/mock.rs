//! Scriptable service doubles for tests and offline runs.

use crate::error::{RelayError, Result};
use crate::services::{
    SpeechRequest, Synthesizer, Transcriber, TranscriptionRequest, TranslationRequest, Translator,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Failure and latency behavior shared by every mock.
#[derive(Debug, Default)]
struct Behavior {
    fail: bool,
    rate_limits_left: AtomicU32,
    retry_hint: Option<Duration>,
    delay: Duration,
    calls: AtomicUsize,
}

impl Behavior {
    async fn enter(&self, service: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let limited = self
            .rate_limits_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if limited {
            return Err(RelayError::RateLimited {
                service: service.to_string(),
                retry_after: self.retry_hint,
            });
        }

        if self.fail {
            return Err(match service {
                "transcription" => RelayError::Transcription {
                    message: "mock transcription failure".to_string(),
                },
                "translation" => RelayError::Translation {
                    message: "mock translation failure".to_string(),
                },
                _ => RelayError::Synthesis {
                    message: "mock synthesis failure".to_string(),
                },
            });
        }
        Ok(())
    }
}

macro_rules! behavior_builders {
    () => {
        /// Configure the mock to fail every call.
        pub fn with_failure(mut self) -> Self {
            self.behavior.fail = true;
            self
        }

        /// The first `times` calls return `RateLimited` with `hint`.
        pub fn with_rate_limits(mut self, times: u32, hint: Option<Duration>) -> Self {
            self.behavior.rate_limits_left = AtomicU32::new(times);
            self.behavior.retry_hint = hint;
            self
        }

        /// Every call takes `delay` before answering.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.behavior.delay = delay;
            self
        }

        /// Number of calls made so far, including failed ones.
        pub fn calls(&self) -> usize {
            self.behavior.calls.load(Ordering::SeqCst)
        }
    };
}

type Responder = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// Mock transcriber returning a fixed or computed text.
pub struct MockTranscriber {
    response: String,
    responder: Option<Responder>,
    behavior: Behavior,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self {
            response: "mock transcription".to_string(),
            responder: None,
            behavior: Behavior::default(),
        }
    }

    /// Configure the mock to return a specific response
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Compute the text from the submitted WAV bytes.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&[u8]) -> String + Send + Sync + 'static,
    ) -> Self {
        self.responder = Some(Arc::new(responder));
        self
    }

    behavior_builders!();
}

impl Default for MockTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String> {
        self.behavior.enter("transcription").await?;
        Ok(match &self.responder {
            Some(responder) => responder(&request.audio),
            None => self.response.clone(),
        })
    }
}

/// Mock translator that "translates" by echoing the input text.
///
/// The reply is a JSON payload like the real service's, so the routing
/// and eligibility logic runs unchanged.
pub struct MockTranslator {
    detected_language: String,
    should_reply: bool,
    prefix: String,
    raw_response: Option<String>,
    requests: Mutex<Vec<TranslationRequest>>,
    behavior: Behavior,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self {
            detected_language: "en".to_string(),
            should_reply: true,
            prefix: String::new(),
            raw_response: None,
            requests: Mutex::new(Vec::new()),
            behavior: Behavior::default(),
        }
    }

    pub fn with_detected_language(mut self, language: &str) -> Self {
        self.detected_language = language.to_string();
        self
    }

    pub fn with_should_reply(mut self, should_reply: bool) -> Self {
        self.should_reply = should_reply;
        self
    }

    /// Prepended to the echoed text, e.g. `"[ro] "`.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    /// Return this exact reply instead of a generated payload.
    pub fn with_raw_response(mut self, raw: &str) -> Self {
        self.raw_response = Some(raw.to_string());
        self
    }

    behavior_builders!();

    /// Requests received so far.
    pub fn requests(&self) -> Vec<TranslationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for MockTranslator {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.behavior.enter("translation").await?;

        if let Some(raw) = &self.raw_response {
            return Ok(raw.clone());
        }
        Ok(serde_json::json!({
            "detected_language": self.detected_language,
            "target_language": request.routing.forced_target_language,
            "translated_text": format!("{}{}", self.prefix, request.text),
            "should_reply": self.should_reply,
        })
        .to_string())
    }
}

/// Mock synthesizer returning the input text's bytes as "audio".
pub struct MockSynthesizer {
    audio: Option<Vec<u8>>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<SpeechRequest>>,
    behavior: Behavior,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self {
            audio: None,
            delays: HashMap::new(),
            requests: Mutex::new(Vec::new()),
            behavior: Behavior::default(),
        }
    }

    /// Return these bytes for every request.
    pub fn with_audio(mut self, audio: Vec<u8>) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Extra latency for requests whose text equals `text`.
    pub fn with_delay_for(mut self, text: &str, delay: Duration) -> Self {
        self.delays.insert(text.to_string(), delay);
        self
    }

    behavior_builders!();

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MockSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Synthesizer for MockSynthesizer {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.behavior.enter("speech").await?;

        if let Some(delay) = self.delays.get(&request.text) {
            tokio::time::sleep(*delay).await;
        }
        Ok(self
            .audio
            .clone()
            .unwrap_or_else(|| request.text.as_bytes().to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RoutingContext;

    fn translation(text: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            routing: RoutingContext::default(),
            model: "m".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mock_transcriber_returns_response() {
        let transcriber = MockTranscriber::new().with_response("Hello, this is a test");
        let request = TranscriptionRequest {
            audio: vec![],
            model: "whisper-1".to_string(),
        };
        assert_eq!(
            transcriber.transcribe(&request).await.unwrap(),
            "Hello, this is a test"
        );
        assert_eq!(transcriber.calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_transcriber_responder() {
        let transcriber =
            MockTranscriber::new().with_responder(|audio| format!("{} bytes", audio.len()));
        let request = TranscriptionRequest {
            audio: vec![0; 7],
            model: "whisper-1".to_string(),
        };
        assert_eq!(transcriber.transcribe(&request).await.unwrap(), "7 bytes");
    }

    #[tokio::test]
    async fn test_mock_transcriber_failure() {
        let transcriber = MockTranscriber::new().with_failure();
        let request = TranscriptionRequest {
            audio: vec![],
            model: "whisper-1".to_string(),
        };
        match transcriber.transcribe(&request).await {
            Err(RelayError::Transcription { message }) => {
                assert_eq!(message, "mock transcription failure")
            }
            other => panic!("expected transcription error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mock_translator_echoes_payload() {
        let translator = MockTranslator::new()
            .with_detected_language("ro")
            .with_prefix("[en] ");
        let raw = translator.translate(&translation("salut")).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["detected_language"], "ro");
        assert_eq!(value["translated_text"], "[en] salut");
        assert_eq!(value["should_reply"], true);
        assert_eq!(translator.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_rate_limits_then_succeeds() {
        let translator = MockTranslator::new().with_rate_limits(1, None);
        assert!(translator
            .translate(&translation("a"))
            .await
            .unwrap_err()
            .is_rate_limited());
        assert!(translator.translate(&translation("a")).await.is_ok());
        assert_eq!(translator.calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_synthesizer_returns_text_bytes() {
        let synthesizer = MockSynthesizer::new();
        let request = SpeechRequest {
            text: "abc".to_string(),
            voice: "alloy".to_string(),
            model: "tts".to_string(),
            format: "opus".to_string(),
        };
        assert_eq!(synthesizer.synthesize(&request).await.unwrap(), b"abc");
        assert_eq!(synthesizer.requests(), vec![request]);
    }
}
