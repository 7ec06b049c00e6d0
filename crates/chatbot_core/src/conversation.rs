//! crates/chatbot_core/src/conversation.rs
//!
//! The per-message pipeline: detect the user's language, classify the intent
//! on English text, and answer in the language the user wrote in.

use crate::catalog::IntentCatalog;
use crate::domain::{Language, Reply};
use crate::language::{detect_language, normalize};
use crate::ports::{IntentModelService, LanguageDetectionService, PortResult, TranslationService};
use crate::responder::ResponseSelector;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub struct ConversationPipeline {
    catalog: Arc<IntentCatalog>,
    detector: Arc<dyn LanguageDetectionService>,
    intent_model: Arc<dyn IntentModelService>,
    translator: Arc<dyn TranslationService>,
    responder: ResponseSelector,
}

impl ConversationPipeline {
    pub fn new(
        catalog: Arc<IntentCatalog>,
        detector: Arc<dyn LanguageDetectionService>,
        intent_model: Arc<dyn IntentModelService>,
        translator: Arc<dyn TranslationService>,
        responder: ResponseSelector,
    ) -> Self {
        Self {
            catalog,
            detector,
            intent_model,
            translator,
            responder,
        }
    }

    /// Wires a pipeline and its response selector from the same collaborators.
    pub fn from_parts(
        catalog: Arc<IntentCatalog>,
        detector: Arc<dyn LanguageDetectionService>,
        intent_model: Arc<dyn IntentModelService>,
        translator: Arc<dyn TranslationService>,
        seed: Option<u64>,
    ) -> Self {
        let responder = match seed {
            Some(seed) => ResponseSelector::with_seed(
                catalog.clone(),
                detector.clone(),
                translator.clone(),
                seed,
            ),
            None => ResponseSelector::new(catalog.clone(), detector.clone(), translator.clone()),
        };
        Self::new(catalog, detector, intent_model, translator, responder)
    }

    /// Maps normalized English text to an intent tag.
    pub async fn classify(&self, text: &str) -> PortResult<String> {
        let class_id = self.intent_model.predict_class(text).await?;
        Ok(self.catalog.tag_for_class(class_id).to_string())
    }

    /// Produces the bot's reply to one user message.
    pub async fn reply_to(&self, message: &str) -> PortResult<Reply> {
        let start_time = Instant::now();
        let message = message.trim();
        let user_language = detect_language(self.detector.as_ref(), message);

        let english_text = match user_language {
            Language::Swahili => {
                self.translator
                    .translate(message, Language::Swahili, Language::English)
                    .await?
            }
            Language::English => message.to_string(),
        };

        let intent = self.classify(&normalize(&english_text)).await?;
        let text = self.responder.respond(&intent, user_language).await?;

        info!(
            language = %user_language,
            intent = %intent,
            elapsed = ?start_time.elapsed(),
            "Reply generated"
        );

        Ok(Reply {
            text,
            language: user_language,
            intent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::{FALLBACK_ENGLISH, FALLBACK_SWAHILI};
    use crate::testing::{KeywordDetector, KeywordIntentModel, RecordingTranslator};

    const INTENTS: &str = r#"{"intents": [
        {"tag": "greeting", "responses": ["Hello! How can I help you?", "Hi there!"]},
        {"tag": "goodbye", "responses": ["Goodbye!"]}
    ]}"#;
    const MAPPING: &str = r#"{"0": "greeting", "1": "goodbye"}"#;

    struct Fixture {
        pipeline: ConversationPipeline,
        model: Arc<KeywordIntentModel>,
        translator: Arc<RecordingTranslator>,
    }

    fn fixture(model: KeywordIntentModel) -> Fixture {
        let catalog = Arc::new(IntentCatalog::from_json(INTENTS, MAPPING).unwrap());
        let model = Arc::new(model);
        let translator = Arc::new(RecordingTranslator::with_entries(&[("Hujambo", "Hello")]));
        let pipeline = ConversationPipeline::from_parts(
            catalog,
            Arc::new(KeywordDetector),
            model.clone(),
            translator.clone(),
            Some(11),
        );
        Fixture {
            pipeline,
            model,
            translator,
        }
    }

    fn greeting_model() -> KeywordIntentModel {
        KeywordIntentModel::new(&[("hello", 0), ("bye", 1)], 0)
    }

    #[tokio::test]
    async fn english_message_is_classified_as_is() {
        let f = fixture(greeting_model());

        let reply = f.pipeline.reply_to("  Bye for now ").await.unwrap();

        assert_eq!(reply.language, Language::English);
        assert_eq!(reply.intent, "goodbye");
        assert_eq!(reply.text, "Goodbye!");
        assert_eq!(f.model.inputs(), vec!["bye for now".to_string()]);
        assert_eq!(f.translator.calls(), 0);
    }

    #[tokio::test]
    async fn swahili_message_is_translated_for_classification_and_answered_in_swahili() {
        let f = fixture(greeting_model());

        let reply = f.pipeline.reply_to("Hujambo").await.unwrap();

        assert_eq!(reply.language, Language::Swahili);
        assert_eq!(reply.intent, "greeting");
        assert_eq!(f.model.inputs(), vec!["hello".to_string()]);
        // One call into English, one call back into Swahili for the reply.
        assert_eq!(f.translator.calls(), 2);
        let candidates = ["Hello! How can I help you?", "Hi there!"];
        assert!(candidates
            .iter()
            .any(|c| reply.text == format!("[en->sw] {c}")));
    }

    #[tokio::test]
    async fn unmapped_class_id_yields_fallback_in_user_language() {
        let f = fixture(KeywordIntentModel::new(&[], 99));

        let en = f.pipeline.reply_to("what is the weather").await.unwrap();
        assert_eq!(en.intent, "unknown");
        assert_eq!(en.text, FALLBACK_ENGLISH);

        let sw = f.pipeline.reply_to("Hujambo").await.unwrap();
        assert_eq!(sw.text, FALLBACK_SWAHILI);
    }

    #[tokio::test]
    async fn empty_message_is_treated_as_english() {
        let f = fixture(greeting_model());

        let reply = f.pipeline.reply_to("   ").await.unwrap();

        assert_eq!(reply.language, Language::English);
        assert_eq!(f.translator.calls(), 0);
    }
}
