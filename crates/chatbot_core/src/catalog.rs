//! crates/chatbot_core/src/catalog.rs
//!
//! The static intent catalog: candidate replies per intent tag, and the table
//! that turns a classifier class id into a tag. Both are parsed and validated
//! once at startup and never change afterwards.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Tag returned when the classifier emits a class id with no mapping.
pub const UNKNOWN_INTENT: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed JSON in {0}: {1}")]
    Json(String, serde_json::Error),
    #[error("Intent at position {0} has an empty tag")]
    EmptyTag(usize),
    #[error("Intent '{0}' has no responses")]
    NoResponses(String),
    #[error("Intent mapping key '{0}' is not a class id")]
    InvalidClassId(String),
}

//=========================================================================================
// On-disk shapes
//=========================================================================================

#[derive(Deserialize)]
struct IntentEntry {
    tag: String,
    #[serde(default)]
    responses: Vec<String>,
}

/// `intents.json` is either wrapped in an object or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum IntentsFile {
    Wrapped { intents: Vec<IntentEntry> },
    Bare(Vec<IntentEntry>),
}

impl IntentsFile {
    fn into_entries(self) -> Vec<IntentEntry> {
        match self {
            IntentsFile::Wrapped { intents } => intents,
            IntentsFile::Bare(intents) => intents,
        }
    }
}

//=========================================================================================
// IntentCatalog
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct IntentCatalog {
    responses: HashMap<String, Vec<String>>,
    tags_by_class: HashMap<usize, String>,
}

impl IntentCatalog {
    /// Loads `intents.json` and `intent_mapping.json` from disk.
    pub fn load(intents_path: &Path, mapping_path: &Path) -> Result<Self, CatalogError> {
        let intents = read_file(intents_path)?;
        let mapping = read_file(mapping_path)?;
        let intents_label = intents_path.display().to_string();
        let mapping_label = mapping_path.display().to_string();
        Self::parse(
            (intents.as_str(), intents_label.as_str()),
            (mapping.as_str(), mapping_label.as_str()),
        )
    }

    /// Parses and validates both documents.
    pub fn from_json(intents_json: &str, mapping_json: &str) -> Result<Self, CatalogError> {
        Self::parse((intents_json, "intents"), (mapping_json, "intent mapping"))
    }

    fn parse(intents: (&str, &str), mapping: (&str, &str)) -> Result<Self, CatalogError> {
        let file: IntentsFile = serde_json::from_str(intents.0)
            .map_err(|e| CatalogError::Json(intents.1.to_string(), e))?;
        let raw_mapping: HashMap<String, String> = serde_json::from_str(mapping.0)
            .map_err(|e| CatalogError::Json(mapping.1.to_string(), e))?;

        let mut responses = HashMap::new();
        for (position, entry) in file.into_entries().into_iter().enumerate() {
            if entry.tag.trim().is_empty() {
                return Err(CatalogError::EmptyTag(position));
            }
            if entry.responses.is_empty() {
                return Err(CatalogError::NoResponses(entry.tag));
            }
            if responses.contains_key(&entry.tag) {
                warn!(tag = %entry.tag, "Duplicate intent tag ignored; keeping the first entry");
                continue;
            }
            responses.insert(entry.tag, entry.responses);
        }

        let mut tags_by_class = HashMap::with_capacity(raw_mapping.len());
        for (key, tag) in raw_mapping {
            let class_id = key
                .trim()
                .parse::<usize>()
                .map_err(|_| CatalogError::InvalidClassId(key.clone()))?;
            tags_by_class.insert(class_id, tag);
        }

        Ok(Self {
            responses,
            tags_by_class,
        })
    }

    /// Maps a classifier output to its tag, or [`UNKNOWN_INTENT`].
    pub fn tag_for_class(&self, class_id: usize) -> &str {
        self.tags_by_class
            .get(&class_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_INTENT)
    }

    /// Candidate replies for `tag`; never an empty slice.
    pub fn responses_for(&self, tag: &str) -> Option<&[String]> {
        self.responses.get(tag).map(Vec::as_slice)
    }

    pub fn intent_count(&self) -> usize {
        self.responses.len()
    }

    pub fn class_count(&self) -> usize {
        self.tags_by_class.len()
    }
}

fn read_file(path: &Path) -> Result<String, CatalogError> {
    std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })
}
