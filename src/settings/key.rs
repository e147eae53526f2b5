use crate::error::RelayError;
use std::fmt;
use std::str::FromStr;

/// Names of the settings that can be changed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    LanguagePairs,
    DefaultTargetLanguage,
    UserTargetLanguages,
    AllowedSpeakers,
    TtsVoice,
    TtsModel,
    TranscribeModel,
    Model,
    SilenceMs,
    VoiceMinPcmBytes,
    VoiceMaxPcmBytes,
    TextFeedback,
}

impl SettingKey {
    pub const ALL: [SettingKey; 12] = [
        SettingKey::LanguagePairs,
        SettingKey::DefaultTargetLanguage,
        SettingKey::UserTargetLanguages,
        SettingKey::AllowedSpeakers,
        SettingKey::TtsVoice,
        SettingKey::TtsModel,
        SettingKey::TranscribeModel,
        SettingKey::Model,
        SettingKey::SilenceMs,
        SettingKey::VoiceMinPcmBytes,
        SettingKey::VoiceMaxPcmBytes,
        SettingKey::TextFeedback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::LanguagePairs => "language_pairs",
            SettingKey::DefaultTargetLanguage => "default_target_language",
            SettingKey::UserTargetLanguages => "user_target_languages",
            SettingKey::AllowedSpeakers => "allowed_speakers",
            SettingKey::TtsVoice => "tts_voice",
            SettingKey::TtsModel => "tts_model",
            SettingKey::TranscribeModel => "transcribe_model",
            SettingKey::Model => "model",
            SettingKey::SilenceMs => "silence_ms",
            SettingKey::VoiceMinPcmBytes => "voice_min_pcm_bytes",
            SettingKey::VoiceMaxPcmBytes => "voice_max_pcm_bytes",
            SettingKey::TextFeedback => "text_feedback",
        }
    }

    /// Comma-separated list of every key, for error messages and help.
    pub fn valid_keys() -> String {
        Self::ALL
            .iter()
            .map(|key| key.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| RelayError::UnknownSetting {
                key: s.trim().to_string(),
                valid: Self::valid_keys(),
            })
    }
}
