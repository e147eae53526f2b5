//! Translation routing: which target applies, and whether a result may be spoken.

pub mod language;
pub mod payload;
pub mod route;

pub use language::{LanguagePairs, SpeakerTargets};
pub use payload::{RawTranslation, parse_translation_payload};
pub use route::{RoutingContext, TranslationRoute, resolve_target};

use crate::defaults::UNKNOWN_LANGUAGE;
use crate::router::language::normalize_detected_language;

/// Validated output of the translation step.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationResult {
    pub detected_language: String,
    /// Empty when no target resolved.
    pub target_language: String,
    pub translated_text: String,
    eligible: bool,
}

impl TranslationResult {
    /// Builds a result, computing eligibility from its fields.
    ///
    /// `service_should_reply` lets the service veto a reply; it can never
    /// make an otherwise ineligible result eligible.
    pub fn new(
        detected_language: impl Into<String>,
        target_language: impl Into<String>,
        translated_text: impl Into<String>,
        service_should_reply: bool,
    ) -> Self {
        let detected_language = detected_language.into();
        let target_language = target_language.into();
        let translated_text = translated_text.into();
        let eligible = service_should_reply
            && is_speakable(&detected_language, &target_language, &translated_text);
        Self {
            detected_language,
            target_language,
            translated_text,
            eligible,
        }
    }

    /// The "nothing to say" result.
    pub fn none() -> Self {
        Self::new(UNKNOWN_LANGUAGE, "", "", false)
    }

    pub fn is_eligible(&self) -> bool {
        self.eligible
    }
}

/// The four field-level conditions for speaking a translation.
pub fn is_speakable(detected: &str, target: &str, text: &str) -> bool {
    !text.is_empty() && !target.is_empty() && detected != UNKNOWN_LANGUAGE && detected != target
}

/// Turns a free-text translation reply into a validated [`TranslationResult`].
///
/// The target is recomputed from `context`; the service's own
/// `target_language` field is ignored.
pub fn finalize_translation(raw_reply: &str, context: &RoutingContext) -> TranslationResult {
    let raw = parse_translation_payload(raw_reply);
    let detected = normalize_detected_language(raw.detected_language.as_deref());
    let target = resolve_target(&detected, context.forced_target(), &context.language_pairs)
        .unwrap_or_default();
    let text = raw
        .translated_text
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();

    TranslationResult::new(detected, target, text, raw.should_reply)
}
