//! Target-language resolution for a speaker and a detected source language.

use crate::pipeline::types::SpeakerId;
use crate::router::language::{LanguagePairs, SpeakerTargets};
use crate::settings::RuntimeSettings;
use serde::Serialize;

/// Routing inputs derived from the runtime settings. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationRoute {
    pub speaker_targets: SpeakerTargets,
    pub default_target: Option<String>,
    pub language_pairs: LanguagePairs,
}

impl TranslationRoute {
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self {
            speaker_targets: settings.user_target_languages.clone(),
            default_target: settings.default_target_language.clone(),
            language_pairs: settings.language_pairs.clone(),
        }
    }

    /// The target that applies regardless of the detected language:
    /// the speaker's own target first, then the global default.
    pub fn forced_target(&self, speaker: &SpeakerId) -> Option<&str> {
        self.speaker_targets
            .get(speaker)
            .or(self.default_target.as_ref())
            .map(String::as_str)
    }

    /// Resolves the target for `speaker` once the source language is known.
    ///
    /// Priority: speaker target > default target > pair table lookup.
    /// Returns `None` when nothing resolves or detection failed.
    pub fn resolve(&self, speaker: &SpeakerId, detected: &str) -> Option<String> {
        resolve_target(detected, self.forced_target(speaker), &self.language_pairs)
    }

    /// Routing context sent along with the text to the translation service.
    pub fn context_for(&self, speaker: &SpeakerId) -> RoutingContext {
        RoutingContext {
            forced_target_language: self.forced_target(speaker).unwrap_or_default().to_string(),
            language_pairs: self.language_pairs.clone(),
        }
    }
}

/// Resolves a target from an optional forced target and the pair table.
pub fn resolve_target(
    detected: &str,
    forced: Option<&str>,
    pairs: &LanguagePairs,
) -> Option<String> {
    if let Some(forced) = forced.filter(|f| !f.is_empty()) {
        return Some(forced.to_string());
    }
    if detected == crate::defaults::UNKNOWN_LANGUAGE {
        return None;
    }
    pairs.get(detected).cloned()
}

/// The routing half of a translation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoutingContext {
    /// Empty when no forced target applies.
    pub forced_target_language: String,
    pub language_pairs: LanguagePairs,
}

impl RoutingContext {
    pub fn forced_target(&self) -> Option<&str> {
        Some(self.forced_target_language.as_str()).filter(|f| !f.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::language::{parse_language_pairs, parse_speaker_targets};

    fn route(pairs: &str, default: Option<&str>, targets: &str) -> TranslationRoute {
        TranslationRoute {
            speaker_targets: parse_speaker_targets(targets).unwrap(),
            default_target: default.map(str::to_string),
            language_pairs: parse_language_pairs(pairs).unwrap(),
        }
    }

    #[test]
    fn test_pair_table_lookup_without_forced_target() {
        let route = route("en:ro,ro:en", None, "");
        let x = SpeakerId::new("x");
        assert_eq!(route.resolve(&x, "en"), Some("ro".to_string()));
        assert_eq!(route.resolve(&x, "ro"), Some("en".to_string()));
        assert_eq!(route.resolve(&x, "fr"), None);
        assert_eq!(route.resolve(&x, "unknown"), None);
    }

    #[test]
    fn test_speaker_target_wins_over_pair_table() {
        let route = route("en:ro", Some("de"), "y:fr");
        let y = SpeakerId::new("y");
        assert_eq!(route.resolve(&y, "en"), Some("fr".to_string()));
    }

    #[test]
    fn test_default_target_wins_over_pair_table() {
        let route = route("en:ro", Some("de"), "y:fr");
        let z = SpeakerId::new("z");
        assert_eq!(route.resolve(&z, "en"), Some("de".to_string()));
        assert_eq!(route.forced_target(&z), Some("de"));
    }

    #[test]
    fn test_forced_target_applies_even_when_detection_failed() {
        let route = route("", None, "y:fr");
        assert_eq!(
            route.resolve(&SpeakerId::new("y"), "unknown"),
            Some("fr".to_string())
        );
    }

    #[test]
    fn test_context_for_speaker() {
        let route = route("en:ro", None, "y:fr");
        let context = route.context_for(&SpeakerId::new("y"));
        assert_eq!(context.forced_target(), Some("fr"));

        let context = route.context_for(&SpeakerId::new("x"));
        assert_eq!(context.forced_target(), None);
        assert_eq!(context.forced_target_language, "");
        assert_eq!(context.language_pairs.len(), 1);
    }
}
