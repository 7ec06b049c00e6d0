//! crates/chatbot_core/src/language.rs
//!
//! Turns raw detector output into one of the two supported languages.

use crate::domain::Language;
use crate::ports::LanguageDetectionService;
use tracing::warn;

const SWAHILI_CODES: [&str; 3] = ["sw", "sw-tz", "sw-ke"];

/// Classifies `text` as Swahili or English.
///
/// Never fails: anything that is not a Swahili locale, and any detector
/// error, is treated as English.
pub fn detect_language(detector: &dyn LanguageDetectionService, text: &str) -> Language {
    match detector.detect_code(text) {
        Ok(code) => language_from_code(&code),
        Err(e) => {
            warn!("Language detection error: {}", e);
            Language::English
        }
    }
}

/// Maps an ISO code (optionally with a region suffix) to a supported language.
pub fn language_from_code(code: &str) -> Language {
    let code = code.trim().to_ascii_lowercase().replace('_', "-");
    if SWAHILI_CODES.contains(&code.as_str()) {
        Language::Swahili
    } else {
        Language::English
    }
}

/// The form the intent model was trained on.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};

    struct FixedDetector(Option<&'static str>);

    impl LanguageDetectionService for FixedDetector {
        fn detect_code(&self, _text: &str) -> PortResult<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| PortError::Unexpected("No features in text".to_string()))
        }
    }

    #[test]
    fn swahili_locales_map_to_swahili() {
        for code in ["sw", "SW", "sw-TZ", "sw_KE"] {
            assert_eq!(language_from_code(code), Language::Swahili, "{code}");
        }
    }

    #[test]
    fn other_languages_map_to_english() {
        for code in ["en", "fr", "swa", ""] {
            assert_eq!(language_from_code(code), Language::English, "{code}");
        }
    }

    #[test]
    fn detector_failure_defaults_to_english() {
        assert_eq!(detect_language(&FixedDetector(None), ""), Language::English);
        assert_eq!(detect_language(&FixedDetector(Some("sw")), "habari"), Language::Swahili);
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Hello THERE \n"), "hello there");
    }
}
