use crate::defaults;
use crate::error::{RelayError, Result};
use crate::pipeline::types::PcmFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub capture: CaptureConfig,
    pub routing: RoutingConfig,
    pub control: ControlConfig,
}

/// Speech service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_base: String,
    /// Chat model used for translation.
    pub model: String,
    pub transcribe_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub tts_format: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
}

/// Utterance capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    pub silence_ms: u64,
    pub min_pcm_bytes: usize,
    pub max_pcm_bytes: usize,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Translation routing configuration, in the same text formats as runtime `set`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    pub language_pairs: String,
    pub default_target: String,
    pub user_targets: String,
}

/// Control surface configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ControlConfig {
    pub text_feedback: bool,
    pub require_start_command: bool,
    pub allowed_speakers: String,
    /// Speaker ID of the relay itself; its audio is never captured.
    pub self_speaker: Option<String>,
    pub feedback_path: Option<PathBuf>,
    pub socket: Option<PathBuf>,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::OPENAI_API_BASE.to_string(),
            model: defaults::TRANSLATE_MODEL.to_string(),
            transcribe_model: defaults::TRANSCRIBE_MODEL.to_string(),
            tts_model: defaults::TTS_MODEL.to_string(),
            tts_voice: defaults::TTS_VOICE.to_string(),
            tts_format: defaults::TTS_FORMAT.to_string(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            silence_ms: defaults::SILENCE_MS,
            min_pcm_bytes: defaults::MIN_PCM_BYTES,
            max_pcm_bytes: defaults::MAX_PCM_BYTES,
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            bits_per_sample: defaults::BITS_PER_SAMPLE,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            language_pairs: defaults::LANGUAGE_PAIRS.to_string(),
            default_target: String::new(),
            user_targets: String::new(),
        }
    }
}

impl CaptureConfig {
    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bits_per_sample: self.bits_per_sample,
        }
    }
}

impl ControlConfig {
    /// Control socket path: an explicit override, then `[control] socket`,
    /// then the per-user runtime default.
    pub fn socket_path(&self, override_path: Option<PathBuf>) -> PathBuf {
        override_path
            .or_else(|| self.socket.clone())
            .unwrap_or_else(crate::ipc::server::IpcServer::default_socket_path)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RelayError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                RelayError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(RelayError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Empty values are ignored. Numeric and boolean values must parse.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        let text_overrides: [(&str, &mut String); 9] = [
            ("OPENAI_MODEL", &mut self.openai.model),
            ("OPENAI_TRANSCRIBE_MODEL", &mut self.openai.transcribe_model),
            ("OPENAI_TTS_MODEL", &mut self.openai.tts_model),
            ("OPENAI_TTS_VOICE", &mut self.openai.tts_voice),
            ("OPENAI_TTS_FORMAT", &mut self.openai.tts_format),
            ("LANGUAGE_PAIRS", &mut self.routing.language_pairs),
            ("DEFAULT_TARGET_LANGUAGE", &mut self.routing.default_target),
            ("USER_TARGET_LANGUAGES", &mut self.routing.user_targets),
            ("VOICE_ALLOWED_SPEAKERS", &mut self.control.allowed_speakers),
        ];
        for (name, field) in text_overrides {
            if let Some(value) = env_value(name) {
                *field = value;
            }
        }

        if let Some(value) = env_value("SPEECH_SILENCE_MS") {
            self.capture.silence_ms = env_number("SPEECH_SILENCE_MS", &value)?;
        }
        if let Some(value) = env_value("VOICE_MIN_PCM_BYTES") {
            self.capture.min_pcm_bytes = env_number("VOICE_MIN_PCM_BYTES", &value)?;
        }
        if let Some(value) = env_value("VOICE_MAX_PCM_BYTES") {
            self.capture.max_pcm_bytes = env_number("VOICE_MAX_PCM_BYTES", &value)?;
        }
        if let Some(value) = env_value("VOICE_TEXT_FEEDBACK") {
            self.control.text_feedback = env_bool("VOICE_TEXT_FEEDBACK", &value)?;
        }
        if let Some(value) = env_value("REQUIRE_START_COMMAND") {
            self.control.require_start_command = env_bool("REQUIRE_START_COMMAND", &value)?;
        }
        if let Some(value) = env_value("VOICE_SELF_SPEAKER") {
            self.control.self_speaker = Some(value);
        }

        Ok(self)
    }

    /// Checks the startup-only values that runtime settings do not cover.
    pub fn validate(&self) -> Result<()> {
        let invalid = |key: &str, message: &str| RelayError::ConfigInvalidValue {
            key: key.to_string(),
            message: message.to_string(),
        };

        if self.capture.sample_rate == 0 {
            return Err(invalid("capture.sample_rate", "must be positive"));
        }
        if !(1..=2).contains(&self.capture.channels) {
            return Err(invalid("capture.channels", "must be 1 or 2"));
        }
        if self.capture.bits_per_sample != 16 {
            return Err(invalid("capture.bits_per_sample", "only 16-bit PCM is supported"));
        }
        if self.openai.request_timeout_secs == 0 {
            return Err(invalid("openai.request_timeout_secs", "must be positive"));
        }
        if let Some(speaker) = &self.control.self_speaker {
            crate::pipeline::types::SpeakerId::parse(speaker)
                .map_err(|m| invalid("control.self_speaker", &m))?;
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxrelay/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxrelay")
            .join("config.toml")
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| RelayError::ConfigInvalidValue {
        key: name.to_string(),
        message: format!("'{value}' is not a number"),
    })
}

fn env_bool(name: &str, value: &str) -> Result<bool> {
    crate::settings::parse_bool(value).ok_or_else(|| RelayError::ConfigInvalidValue {
        key: name.to_string(),
        message: format!("'{value}' is not a boolean"),
    })
}

/// Reads the service API key from the environment.
pub fn api_key_from_env() -> Result<String> {
    env_value("OPENAI_API_KEY").ok_or_else(|| RelayError::MissingCredential {
        name: "OPENAI_API_KEY".to_string(),
    })
}
