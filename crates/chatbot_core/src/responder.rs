//! crates/chatbot_core/src/responder.rs
//!
//! Picks the bot's reply for a classified intent, in the user's language.

use crate::catalog::IntentCatalog;
use crate::domain::Language;
use crate::language::detect_language;
use crate::ports::{LanguageDetectionService, PortError, PortResult, TranslationService};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const FALLBACK_ENGLISH: &str = "Sorry, I don't understand that.";
pub const FALLBACK_SWAHILI: &str = "Samahani, siwezi kuelewa hiyo.";

/// The fixed reply for intents that have no catalog entry.
pub fn fallback_reply(language: Language) -> &'static str {
    match language {
        Language::English => FALLBACK_ENGLISH,
        Language::Swahili => FALLBACK_SWAHILI,
    }
}

pub struct ResponseSelector {
    catalog: Arc<IntentCatalog>,
    detector: Arc<dyn LanguageDetectionService>,
    translator: Arc<dyn TranslationService>,
    rng: Mutex<StdRng>,
}

impl ResponseSelector {
    /// Creates a selector whose choices are seeded from the OS.
    pub fn new(
        catalog: Arc<IntentCatalog>,
        detector: Arc<dyn LanguageDetectionService>,
        translator: Arc<dyn TranslationService>,
    ) -> Self {
        Self::with_rng(catalog, detector, translator, StdRng::from_os_rng())
    }

    /// Creates a selector whose sequence of choices is reproducible.
    pub fn with_seed(
        catalog: Arc<IntentCatalog>,
        detector: Arc<dyn LanguageDetectionService>,
        translator: Arc<dyn TranslationService>,
        seed: u64,
    ) -> Self {
        Self::with_rng(catalog, detector, translator, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(
        catalog: Arc<IntentCatalog>,
        detector: Arc<dyn LanguageDetectionService>,
        translator: Arc<dyn TranslationService>,
        rng: StdRng,
    ) -> Self {
        Self {
            catalog,
            detector,
            translator,
            rng: Mutex::new(rng),
        }
    }

    /// Builds the reply for `intent_tag` in `user_language`.
    pub async fn respond(&self, intent_tag: &str, user_language: Language) -> PortResult<String> {
        let Some(candidates) = self.catalog.responses_for(intent_tag) else {
            debug!(intent = intent_tag, "No catalog entry; using fallback reply");
            return Ok(fallback_reply(user_language).to_string());
        };

        let response = self.choose(candidates)?;
        let response_language = detect_language(self.detector.as_ref(), &response);
        if response_language == user_language {
            return Ok(response);
        }

        debug!(
            intent = intent_tag,
            from = %response_language,
            to = %user_language,
            "Translating reply"
        );
        self.translator
            .translate(&response, response_language, user_language)
            .await
    }

    fn choose(&self, candidates: &[String]) -> PortResult<String> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|e| PortError::Unexpected(format!("Reply RNG lock poisoned: {}", e)))?;
        candidates
            .choose(&mut *rng)
            .cloned()
            .ok_or_else(|| PortError::Unexpected("Intent has no responses".to_string()))
    }
}
