//! Contracts for the external speech and language services.
//!
//! The pipeline only sees these traits. [`OpenAiClient`] is the production
//! implementation, [`Retrying`] adds bounded rate-limit retries around any
//! of them, and [`mock`] provides scriptable test doubles.

pub mod mock;
#[cfg(feature = "openai")]
pub mod openai;
pub mod retry;

#[cfg(feature = "openai")]
pub use openai::OpenAiClient;
pub use retry::{RetryPolicy, Retrying};

use crate::error::Result;
use crate::router::RoutingContext;
use async_trait::async_trait;
use std::sync::Arc;

/// Speech-to-text request. `audio` is a complete WAV file.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub audio: Vec<u8>,
    pub model: String,
}

/// Detect-and-translate request.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub text: String,
    pub routing: RoutingContext,
    pub model: String,
}

/// Text-to-speech request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub model: String,
    /// Output format name, e.g. `opus` or `mp3`.
    pub format: String,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Returns the recognized text, possibly empty.
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String>;
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Returns the service's raw reply. Parsing and validation happen in
    /// [`crate::router::finalize_translation`].
    async fn translate(&self, request: &TranslationRequest) -> Result<String>;
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Returns encoded audio in the requested format.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>>;
}

#[async_trait]
impl<T: Transcriber + ?Sized> Transcriber for Arc<T> {
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String> {
        (**self).transcribe(request).await
    }
}

#[async_trait]
impl<T: Translator + ?Sized> Translator for Arc<T> {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        (**self).translate(request).await
    }
}

#[async_trait]
impl<T: Synthesizer + ?Sized> Synthesizer for Arc<T> {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        (**self).synthesize(request).await
    }
}

/// The three services the pipeline calls, shared across speaker tasks.
#[derive(Clone)]
pub struct Services {
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl Services {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            transcriber,
            translator,
            synthesizer,
        }
    }

    /// Uses one client for all three services.
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: Transcriber + Translator + Synthesizer + 'static,
    {
        Self {
            transcriber: client.clone(),
            translator: client.clone(),
            synthesizer: client,
        }
    }

    /// Wraps every service in a [`Retrying`] decorator.
    pub fn with_retries(self, policy: RetryPolicy) -> Self {
        Self {
            transcriber: Arc::new(Retrying::new(self.transcriber, policy)),
            translator: Arc::new(Retrying::new(self.translator, policy)),
            synthesizer: Arc::new(Retrying::new(self.synthesizer, policy)),
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
