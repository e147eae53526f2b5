//! Language tokens and routing-table text formats.
//!
//! Tokens are lowercase, `_` folds to `-`, and must match
//! `[a-z][a-z0-9-]{1,31}` (e.g. `en`, `ro`, `pt-br`).

use crate::defaults::UNKNOWN_LANGUAGE;
use crate::pipeline::types::SpeakerId;
use std::collections::BTreeMap;

/// Source language → target language.
pub type LanguagePairs = BTreeMap<String, String>;

/// Speaker → forced target language.
pub type SpeakerTargets = BTreeMap<SpeakerId, String>;

/// Normalizes a language token, returning `None` when it is not a valid token.
pub fn normalize_language_token(value: &str) -> Option<String> {
    let normalized = value.trim().to_lowercase().replace('_', "-");
    let mut chars = normalized.chars();
    let first = chars.next()?;
    if !first.is_ascii_lowercase() {
        return None;
    }
    let rest = normalized.len() - 1;
    if !(1..=31).contains(&rest) {
        return None;
    }
    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return None;
    }
    Some(normalized)
}

/// Normalizes a detected-language value; anything invalid becomes `"unknown"`.
pub fn normalize_detected_language(value: Option<&str>) -> String {
    value
        .and_then(normalize_language_token)
        .unwrap_or_else(|| UNKNOWN_LANGUAGE.to_string())
}

/// True for values that clear a list or optional setting.
pub fn is_clear_value(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "" | "-" | "none" | "clear"
    )
}

/// Strictly parses one language token.
pub fn parse_language_token(value: &str) -> Result<String, String> {
    normalize_language_token(value).ok_or_else(|| {
        "language must use letters/numbers/hyphen, example: en, ro, ru, pt-br".to_string()
    })
}

/// Parses an optional language token; clear values yield `None`.
pub fn parse_optional_language(value: &str) -> Result<Option<String>, String> {
    if is_clear_value(value) {
        return Ok(None);
    }
    parse_language_token(value).map(Some)
}

fn split_items(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

/// Parses `src:dst,src:dst`. Clear values yield an empty table.
pub fn parse_language_pairs(value: &str) -> Result<LanguagePairs, String> {
    if is_clear_value(value) {
        return Ok(LanguagePairs::new());
    }

    let items = split_items(value);
    if items.is_empty() {
        return Err("value must contain at least one pair: source:target".to_string());
    }

    let mut pairs = LanguagePairs::new();
    for item in items {
        let Some((source, target)) = item.split_once(':') else {
            return Err("pair format must be source:target,source:target".to_string());
        };
        if target.contains(':') {
            return Err("pair format must be source:target,source:target".to_string());
        }
        let source = parse_language_token(source)?;
        let target = parse_language_token(target)?;
        if source == target {
            return Err("source and target language must be different".to_string());
        }
        pairs.insert(source, target);
    }
    Ok(pairs)
}

/// Parses `speaker:lang,speaker:lang`. Clear values yield an empty table.
pub fn parse_speaker_targets(value: &str) -> Result<SpeakerTargets, String> {
    if is_clear_value(value) {
        return Ok(SpeakerTargets::new());
    }

    let items = split_items(value);
    if items.is_empty() {
        return Err("value must contain one or more entries: speakerId:language".to_string());
    }

    let mut targets = SpeakerTargets::new();
    for item in items {
        let Some((speaker, language)) = item.split_once(':') else {
            return Err("value format must be speakerId:language,speakerId:language".to_string());
        };
        let language = parse_language_token(language)?;
        let speaker = SpeakerId::parse(speaker)?;
        targets.insert(speaker, language);
    }
    Ok(targets)
}

/// Parses a comma-separated speaker list. Clear values yield an empty list.
pub fn parse_speaker_list(value: &str) -> Result<Vec<SpeakerId>, String> {
    if is_clear_value(value) {
        return Ok(Vec::new());
    }
    split_items(value)
        .into_iter()
        .map(SpeakerId::parse)
        .collect()
}

pub fn language_pairs_to_csv(pairs: &LanguagePairs) -> String {
    pairs
        .iter()
        .map(|(source, target)| format!("{source}:{target}"))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn speaker_targets_to_csv(targets: &SpeakerTargets) -> String {
    targets
        .iter()
        .map(|(speaker, language)| format!("{speaker}:{language}"))
        .collect::<Vec<_>>()
        .join(",")
}
