//! Language codes and per-backend vocabularies
//!
//! The application speaks ISO 639-1 codes (`en`, `es`, `zh`). The on-device
//! model uses ISO 639-3 (`eng`, `spa`, `cmn`), Google wants region-qualified
//! Chinese (`zh-CN`), and Whisper reports full English names. Codes outside
//! the table pass through untouched.

use serde::Serialize;

use super::BackendKind;
use crate::{Error, Result};

/// Source language tag that requests detection
pub const AUTO: &str = "auto";

/// A language the on-device model supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    /// Application code (ISO 639-1)
    pub code: &'static str,
    /// On-device model code (ISO 639-3)
    pub model_code: &'static str,
    /// English name
    pub name: &'static str,
}

const fn lang(code: &'static str, model_code: &'static str, name: &'static str) -> Language {
    Language {
        code,
        model_code,
        name,
    }
}

static LANGUAGES: [Language; 32] = [
    lang("en", "eng", "English"),
    lang("es", "spa", "Spanish"),
    lang("fr", "fra", "French"),
    lang("de", "deu", "German"),
    lang("it", "ita", "Italian"),
    lang("pt", "por", "Portuguese"),
    lang("ru", "rus", "Russian"),
    lang("zh", "cmn", "Chinese"),
    lang("ja", "jpn", "Japanese"),
    lang("ko", "kor", "Korean"),
    lang("ar", "arb", "Arabic"),
    lang("hi", "hin", "Hindi"),
    lang("tr", "tur", "Turkish"),
    lang("pl", "pol", "Polish"),
    lang("nl", "nld", "Dutch"),
    lang("sv", "swe", "Swedish"),
    lang("da", "dan", "Danish"),
    lang("no", "nor", "Norwegian"),
    lang("fi", "fin", "Finnish"),
    lang("cs", "ces", "Czech"),
    lang("hu", "hun", "Hungarian"),
    lang("ro", "ron", "Romanian"),
    lang("bg", "bul", "Bulgarian"),
    lang("hr", "hrv", "Croatian"),
    lang("sk", "slk", "Slovak"),
    lang("sl", "slv", "Slovenian"),
    lang("et", "est", "Estonian"),
    lang("lv", "lav", "Latvian"),
    lang("lt", "lit", "Lithuanian"),
    lang("mt", "mlt", "Maltese"),
    lang("ga", "gle", "Irish"),
    lang("cy", "cym", "Welsh"),
];

/// Languages the on-device model can translate between
#[must_use]
pub fn supported_languages() -> &'static [Language] {
    &LANGUAGES
}

/// Look up a language by application code
#[must_use]
pub fn find(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Translate an application code into a backend's vocabulary
#[must_use]
pub fn to_backend(code: &str, backend: BackendKind) -> String {
    match backend {
        BackendKind::OnDevice => find(code).map_or_else(|| code.to_string(), |l| l.model_code.to_string()),
        BackendKind::Google if code.eq_ignore_ascii_case("zh") => "zh-CN".to_string(),
        BackendKind::LibreTranslate | BackendKind::Google => code.to_string(),
    }
}

/// Translate a backend code back into an application code
#[must_use]
pub fn from_backend(code: &str, backend: BackendKind) -> String {
    match backend {
        BackendKind::OnDevice => LANGUAGES
            .iter()
            .find(|l| l.model_code.eq_ignore_ascii_case(code))
            .map_or_else(|| code.to_string(), |l| l.code.to_string()),
        BackendKind::Google if code.to_ascii_lowercase().starts_with("zh") => "zh".to_string(),
        BackendKind::LibreTranslate | BackendKind::Google => code.to_string(),
    }
}

/// Normalize whatever a speech-to-text service reports as a language
///
/// Accepts full English names (`"spanish"`), application codes, and
/// model codes.
#[must_use]
pub fn normalize_reported(reported: &str) -> String {
    let reported = reported.trim();
    LANGUAGES
        .iter()
        .find(|l| {
            l.name.eq_ignore_ascii_case(reported)
                || l.code.eq_ignore_ascii_case(reported)
                || l.model_code.eq_ignore_ascii_case(reported)
        })
        .map_or_else(|| reported.to_ascii_lowercase(), |l| l.code.to_string())
}

/// Language assumed when detection fails and no policy is configured
pub const DEFAULT_FALLBACK_LANGUAGE: &str = "en";

/// Setting value that turns detection failures into errors
pub const STRICT_DETECTION: &str = "strict";

/// What to do when source-language detection fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionFallback {
    language: Option<String>,
}

impl Default for DetectionFallback {
    fn default() -> Self {
        Self::assume(DEFAULT_FALLBACK_LANGUAGE)
    }
}

impl DetectionFallback {
    /// Policy from a configured value: `strict`, or the language to assume
    #[must_use]
    pub fn from_setting(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case(STRICT_DETECTION) {
            Self::strict()
        } else if value.is_empty() {
            Self::default()
        } else {
            Self::assume(value.to_ascii_lowercase())
        }
    }

    /// Fail the translation when detection fails
    #[must_use]
    pub const fn strict() -> Self {
        Self { language: None }
    }

    /// Assume `language` when detection fails
    #[must_use]
    pub fn assume(language: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
        }
    }

    /// Apply the policy to a detection outcome
    ///
    /// # Errors
    ///
    /// Returns `LanguageDetection` if detection failed and the policy is strict
    pub fn resolve(&self, detected: Result<String>) -> Result<String> {
        match (detected, &self.language) {
            (Ok(code), _) if !code.is_empty() => Ok(code),
            (Ok(_), Some(fallback)) => Ok(fallback.clone()),
            (Ok(_), None) => Err(Error::LanguageDetection("no language reported".to_string())),
            (Err(e), Some(fallback)) => {
                tracing::warn!(error = %e, fallback = %fallback, "language detection failed, assuming fallback");
                Ok(fallback.clone())
            }
            (Err(e), None) => Err(Error::LanguageDetection(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_device_uses_three_letter_codes() {
        assert_eq!(to_backend("en", BackendKind::OnDevice), "eng");
        assert_eq!(to_backend("zh", BackendKind::OnDevice), "cmn");
        assert_eq!(from_backend("spa", BackendKind::OnDevice), "es");
    }

    #[test]
    fn unknown_codes_pass_through() {
        assert_eq!(to_backend("tlh", BackendKind::OnDevice), "tlh");
        assert_eq!(from_backend("xx", BackendKind::OnDevice), "xx");
        assert_eq!(to_backend("tlh", BackendKind::Google), "tlh");
    }

    #[test]
    fn google_qualifies_chinese() {
        assert_eq!(to_backend("zh", BackendKind::Google), "zh-CN");
        assert_eq!(from_backend("zh-CN", BackendKind::Google), "zh");
        assert_eq!(to_backend("zh", BackendKind::LibreTranslate), "zh");
    }

    #[test]
    fn whisper_names_normalize() {
        assert_eq!(normalize_reported("spanish"), "es");
        assert_eq!(normalize_reported("English"), "en");
        assert_eq!(normalize_reported("de"), "de");
    }

    #[test]
    fn table_covers_model_languages() {
        assert_eq!(supported_languages().len(), 32);
        assert!(find("cy").is_some());
    }

    #[test]
    fn detection_policy() {
        let strict = DetectionFallback::strict();
        assert!(matches!(
            strict.resolve(Err(Error::Stt("nope".into()))),
            Err(Error::LanguageDetection(_))
        ));

        let lenient = DetectionFallback::assume("en");
        assert_eq!(lenient.resolve(Err(Error::Stt("nope".into()))).unwrap(), "en");
        assert_eq!(lenient.resolve(Ok("fr".into())).unwrap(), "fr");
    }

    #[test]
    fn default_policy_assumes_english() {
        let policy = DetectionFallback::default();
        assert_eq!(policy, DetectionFallback::assume("en"));
        assert_eq!(policy.resolve(Ok(String::new())).unwrap(), "en");
    }

    #[test]
    fn settings_parse_into_policy() {
        assert_eq!(DetectionFallback::from_setting("strict"), DetectionFallback::strict());
        assert_eq!(DetectionFallback::from_setting("STRICT"), DetectionFallback::strict());
        assert_eq!(DetectionFallback::from_setting(" de "), DetectionFallback::assume("de"));
        assert_eq!(DetectionFallback::from_setting(""), DetectionFallback::default());
    }
}
