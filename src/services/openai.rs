//! HTTP client for OpenAI-compatible speech, chat and synthesis endpoints.

use crate::defaults;
use crate::error::{RelayError, Result};
use crate::services::{
    SpeechRequest, Synthesizer, Transcriber, TranscriptionRequest, TranslationRequest, Translator,
};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, Response, StatusCode, multipart};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SYSTEM_PROMPT: &str = concat!(
    "You route and translate short spoken utterances. ",
    "Reply with a single JSON object and nothing else, using exactly these keys: ",
    r#"{"detected_language":"string","target_language":"string","translated_text":"string","should_reply":true|false}. "#,
    "detected_language is a short lowercase language token such as en, ro, fr, de or pt-br. ",
    "The user message is JSON with routing_config and text. ",
    "Use routing_config.forced_target_language as the target when it is not empty, ",
    "otherwise routing_config.language_pairs[detected_language]. ",
    r#"When no target applies, or the target equals the detected language, set should_reply=false and translated_text="". "#,
    "Otherwise translate the text naturally into the target language, ",
    "keeping names and numbers unchanged.",
);

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_base: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_base: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|_| RelayError::MissingCredential {
                    name: "OPENAI_API_KEY".to_string(),
                })?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("voxrelay/", env!("CARGO_PKG_VERSION"))),
        );
        Ok(headers)
    }

    /// Returns the successful response, or maps the failure for `service`.
    async fn check(
        response: Response,
        service: &str,
        make_error: fn(String) -> RelayError,
    ) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_hint = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RelayError::RateLimited {
                service: service.to_string(),
                retry_after: header_hint.or_else(|| retry_after_from_body(&body)),
            });
        }
        Err(make_error(format!("status {}: {}", status.as_u16(), body.trim())))
    }
}

fn transcription_error(message: String) -> RelayError {
    RelayError::Transcription { message }
}

fn translation_error(message: String) -> RelayError {
    RelayError::Translation { message }
}

fn synthesis_error(message: String) -> RelayError {
    RelayError::Synthesis { message }
}

/// Parses a `Retry-After` value given in (possibly fractional) seconds.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    wait_hint(seconds)
}

/// Reads a `retry_after` seconds field from a JSON error body.
pub(crate) fn retry_after_from_body(body: &str) -> Option<Duration> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let seconds = value
        .get("retry_after")
        .or_else(|| value.get("error").and_then(|e| e.get("retry_after")))?
        .as_f64()?;
    wait_hint(seconds)
}

/// Converts a server wait hint, capped at [`defaults::RETRY_MAX_WAIT_SECS`].
fn wait_hint(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    let max = Duration::from_secs(defaults::RETRY_MAX_WAIT_SECS);
    Some(Duration::try_from_secs_f64(seconds).map_or(max, |wait| wait.min(max)))
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatUserContent<'a> {
    routing_config: &'a crate::router::RoutingContext,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct SpeechBody<'a> {
    model: &'a str,
    voice: &'a str,
    response_format: &'a str,
    input: &'a str,
}

/// Builds the chat completion body for a translation request.
fn chat_request(request: &TranslationRequest) -> Result<ChatRequest<'_>> {
    let content = serde_json::to_string(&ChatUserContent {
        routing_config: &request.routing,
        text: &request.text,
    })?;

    Ok(ChatRequest {
        model: &request.model,
        temperature: 0.0,
        response_format: ResponseFormat {
            kind: "json_object",
        },
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content,
            },
        ],
    })
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<String> {
        let part = multipart::Part::bytes(request.audio.clone())
            .file_name("utterance.wav")
            .mime_str("audio/wav")
            .map_err(|e| transcription_error(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", request.model.clone());

        let response = self
            .client
            .post(self.url("/audio/transcriptions"))
            .headers(self.headers()?)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transcription_error(e.to_string()))?;
        let response = Self::check(response, "transcription", transcription_error).await?;

        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| transcription_error(format!("invalid response: {e}")))?;
        Ok(body.text)
    }
}

#[async_trait]
impl Translator for OpenAiClient {
    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        let body = chat_request(request)?;

        let response = self
            .client
            .post(self.url("/chat/completions"))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| translation_error(e.to_string()))?;
        let response = Self::check(response, "translation", translation_error).await?;

        // A reply that is not the expected shape is an empty payload, not an error.
        let text = response
            .text()
            .await
            .map_err(|e| translation_error(e.to_string()))?;
        let content = serde_json::from_str::<ChatResponse>(&text)
            .ok()
            .and_then(|r| r.choices.into_iter().next())
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }
}

#[async_trait]
impl Synthesizer for OpenAiClient {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        let body = SpeechBody {
            model: &request.model,
            voice: &request.voice,
            response_format: &request.format,
            input: &request.text,
        };

        let response = self
            .client
            .post(self.url("/audio/speech"))
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| synthesis_error(e.to_string()))?;
        let response = Self::check(response, "speech", synthesis_error).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| synthesis_error(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
