//! services/web/src/adapters/language.rs
//!
//! This module contains the language identification adapter.
//! It implements the `LanguageDetectionService` port with `lingua`, limited to
//! the two languages the bot can answer in.

use chatbot_core::ports::{LanguageDetectionService, PortError, PortResult};
use lingua::{Language as LinguaLanguage, LanguageDetector, LanguageDetectorBuilder};
use tracing::info;

pub struct LinguaDetectorAdapter {
    detector: LanguageDetector,
}

impl LinguaDetectorAdapter {
    /// Builds a detector over English and Swahili with models loaded up front.
    pub fn new() -> Self {
        let detector =
            LanguageDetectorBuilder::from_languages(&[LinguaLanguage::English, LinguaLanguage::Swahili])
                .with_preloaded_language_models()
                .build();
        info!("Language detector ready (en, sw)");
        Self { detector }
    }
}

impl Default for LinguaDetectorAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageDetectionService for LinguaDetectorAdapter {
    fn detect_code(&self, text: &str) -> PortResult<String> {
        self.detector
            .detect_language_of(text)
            .map(|language| language.iso_code_639_1().to_string().to_lowercase())
            .ok_or_else(|| {
                PortError::Unexpected("No reliable language found in text".to_string())
            })
    }
}
