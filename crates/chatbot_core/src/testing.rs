//! crates/chatbot_core/src/testing.rs
//!
//! Deterministic stand-ins for the model ports, shared by the unit tests here
//! and the web service's integration tests.

use crate::domain::Language;
use crate::ports::{
    IntentModelService, LanguageDetectionService, PortError, PortResult, TranslationService,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

const SWAHILI_WORDS: [&str; 10] = [
    "hujambo", "habari", "jambo", "asante", "karibu", "samahani", "yako", "siwezi", "kwaheri",
    "[en->sw]",
];

/// Says "sw" when the text contains a known Swahili word, fails on blank text.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordDetector;

impl LanguageDetectionService for KeywordDetector {
    fn detect_code(&self, text: &str) -> PortResult<String> {
        if text.trim().is_empty() {
            return Err(PortError::Unexpected("No features in text".to_string()));
        }
        let lower = text.to_lowercase();
        let code = if SWAHILI_WORDS.iter().any(|w| lower.contains(w)) {
            "sw"
        } else {
            "en"
        };
        Ok(code.to_string())
    }
}

/// Returns the class of the first keyword found in the text, else a default.
#[derive(Debug, Default)]
pub struct KeywordIntentModel {
    keywords: Vec<(String, usize)>,
    default_class: usize,
    inputs: Mutex<Vec<String>>,
}

impl KeywordIntentModel {
    pub fn new(keywords: &[(&str, usize)], default_class: usize) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|(k, c)| (k.to_string(), *c))
                .collect(),
            default_class,
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Every text the model was asked to classify, in order.
    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl IntentModelService for KeywordIntentModel {
    async fn predict_class(&self, text: &str) -> PortResult<usize> {
        if let Ok(mut inputs) = self.inputs.lock() {
            inputs.push(text.to_string());
        }
        Ok(self
            .keywords
            .iter()
            .find(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(_, class)| *class)
            .unwrap_or(self.default_class))
    }
}

/// Looks text up in a fixed table, otherwise tags it with the direction.
#[derive(Debug, Default)]
pub struct RecordingTranslator {
    entries: HashMap<String, String>,
    calls: AtomicUsize,
    fail: bool,
}

impl RecordingTranslator {
    pub fn with_entries(entries: &[(&str, &str)]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    /// A translator whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationService for RecordingTranslator {
    async fn translate(&self, text: &str, source: Language, target: Language) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PortError::Unexpected("Translation model unavailable".to_string()));
        }
        Ok(self
            .entries
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("[{}->{}] {}", source, target, text)))
    }
}
