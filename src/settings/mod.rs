//! Live-tunable runtime settings.
//!
//! Readers take cheap [`Arc`] snapshots; writers go through
//! [`SettingsStore::apply`], which validates the value and swaps in a new
//! snapshot with exactly one field changed. A reader never sees a
//! half-applied value.

pub mod key;

pub use key::SettingKey;

use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::pipeline::types::SpeakerId;
use crate::router::language::{
    LanguagePairs, SpeakerTargets, language_pairs_to_csv, parse_language_pairs,
    parse_optional_language, parse_speaker_list, parse_speaker_targets, speaker_targets_to_csv,
};
use std::sync::{Arc, PoisonError, RwLock};

/// One consistent view of every tunable parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    /// Chat model used for translation.
    pub model: String,
    pub transcribe_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    /// Fixed at startup.
    pub tts_format: String,
    pub silence_ms: u64,
    pub voice_min_pcm_bytes: usize,
    pub voice_max_pcm_bytes: usize,
    pub language_pairs: LanguagePairs,
    pub default_target_language: Option<String>,
    pub user_target_languages: SpeakerTargets,
    pub text_feedback: bool,
    /// Empty means everyone.
    pub allowed_speakers: Vec<SpeakerId>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        use crate::defaults;
        Self {
            model: defaults::TRANSLATE_MODEL.to_string(),
            transcribe_model: defaults::TRANSCRIBE_MODEL.to_string(),
            tts_model: defaults::TTS_MODEL.to_string(),
            tts_voice: defaults::TTS_VOICE.to_string(),
            tts_format: defaults::TTS_FORMAT.to_string(),
            silence_ms: defaults::SILENCE_MS,
            voice_min_pcm_bytes: defaults::MIN_PCM_BYTES,
            voice_max_pcm_bytes: defaults::MAX_PCM_BYTES,
            language_pairs: parse_language_pairs(defaults::LANGUAGE_PAIRS).unwrap_or_default(),
            default_target_language: None,
            user_target_languages: SpeakerTargets::new(),
            text_feedback: false,
            allowed_speakers: Vec::new(),
        }
    }
}

impl RuntimeSettings {
    /// Builds the initial settings from startup configuration, strictly.
    pub fn from_config(config: &Config) -> Result<Self> {
        let invalid = |key: &str, message: String| RelayError::ConfigInvalidValue {
            key: key.to_string(),
            message,
        };

        let settings = Self {
            model: config.openai.model.trim().to_string(),
            transcribe_model: config.openai.transcribe_model.trim().to_string(),
            tts_model: config.openai.tts_model.trim().to_string(),
            tts_voice: config.openai.tts_voice.trim().to_string(),
            tts_format: config.openai.tts_format.trim().to_lowercase(),
            silence_ms: config.capture.silence_ms,
            voice_min_pcm_bytes: config.capture.min_pcm_bytes,
            voice_max_pcm_bytes: config.capture.max_pcm_bytes,
            language_pairs: parse_language_pairs(&config.routing.language_pairs)
                .map_err(|m| invalid("routing.language_pairs", m))?,
            default_target_language: parse_optional_language(&config.routing.default_target)
                .map_err(|m| invalid("routing.default_target", m))?,
            user_target_languages: parse_speaker_targets(&config.routing.user_targets)
                .map_err(|m| invalid("routing.user_targets", m))?,
            text_feedback: config.control.text_feedback,
            allowed_speakers: parse_speaker_list(&config.control.allowed_speakers)
                .map_err(|m| invalid("control.allowed_speakers", m))?,
        };

        for (key, value) in [
            ("openai.model", &settings.model),
            ("openai.transcribe_model", &settings.transcribe_model),
            ("openai.tts_model", &settings.tts_model),
            ("openai.tts_voice", &settings.tts_voice),
        ] {
            if value.is_empty() {
                return Err(invalid(key, "must not be empty".to_string()));
            }
        }

        if !crate::defaults::SUPPORTED_TTS_FORMATS.contains(&settings.tts_format.as_str()) {
            return Err(invalid(
                "openai.tts_format",
                format!(
                    "{} is not supported. Supported: {}",
                    settings.tts_format,
                    crate::defaults::SUPPORTED_TTS_FORMATS.join(",")
                ),
            ));
        }

        if settings.silence_ms == 0 {
            return Err(invalid("capture.silence_ms", "must be positive".to_string()));
        }
        if settings.voice_min_pcm_bytes == 0 {
            return Err(invalid("capture.min_pcm_bytes", "must be positive".to_string()));
        }
        if settings.voice_max_pcm_bytes < settings.voice_min_pcm_bytes {
            return Err(invalid(
                "capture.max_pcm_bytes",
                "must not be smaller than capture.min_pcm_bytes".to_string(),
            ));
        }

        Ok(settings)
    }

    /// Renders the current value of `key`; `-` stands for empty.
    pub fn get(&self, key: SettingKey) -> String {
        let value = match key {
            SettingKey::LanguagePairs => language_pairs_to_csv(&self.language_pairs),
            SettingKey::DefaultTargetLanguage => {
                self.default_target_language.clone().unwrap_or_default()
            }
            SettingKey::UserTargetLanguages => speaker_targets_to_csv(&self.user_target_languages),
            SettingKey::AllowedSpeakers => self
                .allowed_speakers
                .iter()
                .map(SpeakerId::as_str)
                .collect::<Vec<_>>()
                .join(","),
            SettingKey::TtsVoice => self.tts_voice.clone(),
            SettingKey::TtsModel => self.tts_model.clone(),
            SettingKey::TranscribeModel => self.transcribe_model.clone(),
            SettingKey::Model => self.model.clone(),
            SettingKey::SilenceMs => self.silence_ms.to_string(),
            SettingKey::VoiceMinPcmBytes => self.voice_min_pcm_bytes.to_string(),
            SettingKey::VoiceMaxPcmBytes => self.voice_max_pcm_bytes.to_string(),
            SettingKey::TextFeedback => self.text_feedback.to_string(),
        };
        if value.is_empty() { "-".to_string() } else { value }
    }

    /// Whether `speaker` may be captured under the allow-list.
    pub fn allows(&self, speaker: &SpeakerId) -> bool {
        self.allowed_speakers.is_empty() || self.allowed_speakers.contains(speaker)
    }

    /// Parses `value` for `key` and writes it into `self`.
    fn assign(&mut self, key: SettingKey, value: &str) -> std::result::Result<(), String> {
        match key {
            SettingKey::LanguagePairs => self.language_pairs = parse_language_pairs(value)?,
            SettingKey::DefaultTargetLanguage => {
                self.default_target_language = parse_optional_language(value)?
            }
            SettingKey::UserTargetLanguages => {
                self.user_target_languages = parse_speaker_targets(value)?
            }
            SettingKey::AllowedSpeakers => self.allowed_speakers = parse_speaker_list(value)?,
            SettingKey::TtsVoice => self.tts_voice = parse_text(value)?,
            SettingKey::TtsModel => self.tts_model = parse_text(value)?,
            SettingKey::TranscribeModel => self.transcribe_model = parse_text(value)?,
            SettingKey::Model => self.model = parse_text(value)?,
            SettingKey::SilenceMs => self.silence_ms = parse_positive_int(value)?,
            SettingKey::VoiceMinPcmBytes => {
                let min = parse_positive_int(value)? as usize;
                if min > self.voice_max_pcm_bytes {
                    return Err(format!(
                        "value must not exceed voice_max_pcm_bytes ({})",
                        self.voice_max_pcm_bytes
                    ));
                }
                self.voice_min_pcm_bytes = min;
            }
            SettingKey::VoiceMaxPcmBytes => {
                let max = parse_positive_int(value)? as usize;
                if max < self.voice_min_pcm_bytes {
                    return Err(format!(
                        "value must not be below voice_min_pcm_bytes ({})",
                        self.voice_min_pcm_bytes
                    ));
                }
                self.voice_max_pcm_bytes = max;
            }
            SettingKey::TextFeedback => {
                self.text_feedback = parse_bool(value)
                    .ok_or_else(|| "value must be a boolean (on/off, true/false)".to_string())?
            }
        }
        Ok(())
    }
}

/// Parses a strictly positive integer.
pub fn parse_positive_int(value: &str) -> std::result::Result<u64, String> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err("value must be a positive integer".to_string()),
    }
}

/// Parses the usual boolean spellings.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn parse_text(value: &str) -> std::result::Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        Err("value must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

/// Shared, concurrently readable settings with validated per-key replacement.
#[derive(Debug)]
pub struct SettingsStore {
    current: RwLock<Arc<RuntimeSettings>>,
}

impl SettingsStore {
    pub fn new(settings: RuntimeSettings) -> Self {
        Self {
            current: RwLock::new(Arc::new(settings)),
        }
    }

    /// Current consistent snapshot.
    pub fn snapshot(&self) -> Arc<RuntimeSettings> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Renders the current value of a named setting.
    pub fn get(&self, key: &str) -> Result<String> {
        let key: SettingKey = key.parse()?;
        Ok(self.snapshot().get(key))
    }

    /// Every setting as `(key, rendered value)`, in declaration order.
    pub fn entries(&self) -> Vec<(String, String)> {
        let snapshot = self.snapshot();
        SettingKey::ALL
            .iter()
            .map(|key| (key.as_str().to_string(), snapshot.get(*key)))
            .collect()
    }

    /// Validates `value` for `key` and atomically replaces that one field.
    ///
    /// Returns the rendered new value. On error nothing changes.
    pub fn apply(&self, key: &str, value: &str) -> Result<String> {
        let key: SettingKey = key.parse()?;
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);

        let mut next = RuntimeSettings::clone(&guard);
        next.assign(key, value)
            .map_err(|message| RelayError::InvalidSetting {
                key: key.as_str().to_string(),
                message,
            })?;

        let rendered = next.get(key);
        *guard = Arc::new(next);
        tracing::info!(key = key.as_str(), value = %rendered, "setting updated");
        Ok(rendered)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(RuntimeSettings::default())
    }
}
