//! Bounded retry decorator for rate-limited service calls.

use crate::error::{RelayError, Result};
use crate::services::{
    SpeechRequest, Synthesizer, Transcriber, TranscriptionRequest, TranslationRequest, Translator,
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff when the service gives no wait hint; doubles per retry.
    pub base_delay: Duration,
    /// Cap on every wait, including server hints.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: crate::defaults::MAX_RETRIES,
            base_delay: Duration::from_millis(crate::defaults::RETRY_BASE_MS),
            max_delay: Duration::from_secs(crate::defaults::RETRY_MAX_WAIT_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Wait before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        hint.unwrap_or_else(|| self.base_delay.saturating_mul(1 << attempt.min(16)))
            .min(self.max_delay)
    }
}

/// Retries the wrapped service on [`RelayError::RateLimited`] only.
#[derive(Debug, Clone)]
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(RelayError::RateLimited {
                    service,
                    retry_after,
                }) if attempt < self.policy.max_retries => {
                    let wait = self.policy.delay_for(attempt, retry_after);
                    tracing::warn!(
                        operation,
                        service = %service,
                        attempt = attempt + 1,
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<S: Transcriber> Transcriber for Retrying<S> {
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String> {
        self.run("transcribe", || self.inner.transcribe(request)).await
    }
}

#[async_trait]
impl<S: Translator> Translator for Retrying<S> {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        self.run("translate", || self.inner.translate(request)).await
    }
}

#[async_trait]
impl<S: Synthesizer> Synthesizer for Retrying<S> {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        self.run("synthesize", || self.inner.synthesize(request)).await
    }
}
